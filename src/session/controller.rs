//! Chat session controller
//!
//! Owns the transcript for one conversation. A send runs as one cycle:
//! append the user message and a loading placeholder, call the chat backend
//! once, then stream the reply (or an error explanation) into a new assistant
//! message. Only one cycle runs at a time.

use crate::api::{ChatBackend, ClientError, HttpChatClient};
use crate::messages::{ChatTurn, DeliveryStatus, Message, MemoryStorage, TranscriptStore};
use crate::session::config::SessionConfig;
use crate::session::prompts::{self, PromptCard};
use crate::session::state::{EventHub, SessionEvent, SessionPhase, SessionState};
use crate::session::streamer::{
    DelayPolicy, RandomDelay, ResponseStreamer, StreamOutcome, StreamSink,
};
use crate::Result;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Why a send was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Input was empty after trimming
    EmptyInput,
    /// Another cycle is still in flight
    Busy,
    /// The session was shut down
    Closed,
}

/// Result of a send cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply was streamed into `message_id`
    Replied { message_id: String },
    /// The backend failed; `message_id` holds the error explanation
    Failed {
        message_id: String,
        error: ClientError,
    },
    /// Nothing was changed
    Ignored(IgnoreReason),
    /// The cycle was abandoned by a reset or shutdown
    Interrupted,
}

impl SendOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, SendOutcome::Ignored(_))
    }
}

struct SessionInner {
    config: SessionConfig,
    state: RwLock<SessionState>,
    store: TranscriptStore,
    backend: Arc<dyn ChatBackend>,
    streamer: ResponseStreamer,
    events: EventHub,
    closed: AtomicBool,
}

impl SessionInner {
    /// Apply a change, persist it, then notify subscribers.
    ///
    /// The change is skipped once the session is closed or when `generation`
    /// no longer matches (the transcript was reset since the cycle began).
    fn mutate<R>(
        &self,
        generation: Option<u64>,
        change: impl FnOnce(&mut SessionState) -> R,
    ) -> Option<R> {
        self.mutate_if(generation, |state| Some(change(state)))
    }

    /// Like [`SessionInner::mutate`], but a change returning `None` left the
    /// state untouched and is neither persisted nor announced.
    fn mutate_if<R>(
        &self,
        generation: Option<u64>,
        change: impl FnOnce(&mut SessionState) -> Option<R>,
    ) -> Option<R> {
        let result = {
            let mut state = self.state.write();
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            if generation.is_some_and(|g| g != state.generation) {
                return None;
            }

            let result = change(&mut state)?;
            if let Err(e) = self.store.save(&state.messages) {
                warn!("Failed to save messages: {}", e);
            }
            result
        };

        self.events.emit(SessionEvent::TranscriptChanged);
        Some(result)
    }
}

/// Settles a cycle whose `send_message` future was dropped before the end
struct CycleGuard<'a> {
    inner: &'a SessionInner,
    generation: u64,
    user_id: String,
    /// Streaming reply id and whether it explains a failure
    reply: Option<(String, bool)>,
    armed: bool,
}

impl CycleGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let inner = self.inner;
        let user_id = &self.user_id;
        let settled = inner.mutate_if(Some(self.generation), |state| {
            if state.phase.is_idle() {
                return None;
            }
            inner.streamer.cancel();
            state.abandon_cycle(user_id);
            Some(())
        });
        if settled.is_none() {
            return;
        }

        info!("Send abandoned before the reply settled");
        if let Some((message_id, is_error)) = self.reply.take() {
            inner
                .events
                .emit(SessionEvent::StreamFinished { message_id, is_error });
        }
    }
}

/// Writes streamed text into one assistant message
struct MessageSink {
    inner: Weak<SessionInner>,
    message_id: String,
    generation: u64,
}

impl StreamSink for MessageSink {
    fn write(&self, text: &str) {
        if let Some(inner) = self.inner.upgrade() {
            inner.mutate(Some(self.generation), |state| {
                state.set_streaming_text(&self.message_id, text)
            });
        }
    }
}

/// Handle to a chat session; clones share the same conversation
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    pub fn builder() -> ChatSessionBuilder {
        ChatSessionBuilder::new()
    }

    /// Send a user message and wait for the whole cycle to settle
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }

        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return SendOutcome::Ignored(IgnoreReason::Closed);
        }

        let user = Message::user(text);
        let user_id = user.id.clone();

        // Busy check and append happen under one lock; a busy send touches nothing
        let started = inner.mutate_if(None, |state| {
            if state.phase.is_busy() {
                return None;
            }

            let mut turns: Vec<ChatTurn> = state
                .messages
                .iter()
                .filter(|m| !m.is_loading)
                .map(ChatTurn::from)
                .collect();
            turns.push(ChatTurn::from(&user));

            state.messages.push(user);
            state.messages.push(Message::loading());
            state.phase = SessionPhase::AwaitingReply;
            Some((turns, state.generation))
        });

        let Some((turns, generation)) = started else {
            if inner.closed.load(Ordering::SeqCst) {
                return SendOutcome::Ignored(IgnoreReason::Closed);
            }
            debug!("Send ignored: a reply is still in flight");
            return SendOutcome::Ignored(IgnoreReason::Busy);
        };

        let mut guard = CycleGuard {
            inner,
            generation,
            user_id: user_id.clone(),
            reply: None,
            armed: true,
        };

        debug!("Sending {} turns to chat backend", turns.len());
        let timeout = inner.config.request_timeout;
        let result = match tokio::time::timeout(timeout, inner.backend.send(&turns)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(timeout)),
        };

        let (reply_text, reply_id, timestamp, failure) = match result {
            Ok(reply) => {
                let timestamp = reply
                    .timestamp
                    .as_deref()
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                    .map(|t| t.with_timezone(&Utc))
                    .unwrap_or_else(Utc::now);
                (reply.content, reply.id, timestamp, None)
            }
            Err(error) => {
                warn!("Chat request failed: {}", error);
                (error_reply(&error.to_string()), None, Utc::now(), Some(error))
            }
        };
        let is_error = failure.is_some();

        let message_id = inner.mutate(Some(generation), |state| {
            let id = reply_id
                .filter(|id| !id.is_empty() && !state.contains(id))
                .unwrap_or_else(|| Uuid::new_v4().to_string());

            state.remove_loading();
            let status = if is_error {
                DeliveryStatus::Error
            } else {
                DeliveryStatus::Delivered
            };
            state.set_status(&user_id, status);
            state.messages.push(Message::streaming(id.clone(), timestamp));
            state.phase = SessionPhase::Streaming;
            id
        });

        let Some(message_id) = message_id else {
            info!("Dropping chat reply: session was reset or closed");
            return SendOutcome::Interrupted;
        };

        guard.reply = Some((message_id.clone(), is_error));
        inner.events.emit(SessionEvent::StreamStarted {
            message_id: message_id.clone(),
        });

        let sink = MessageSink {
            inner: Arc::downgrade(inner),
            message_id: message_id.clone(),
            generation,
        };
        let outcome = inner.streamer.stream(reply_text, Arc::new(sink)).finished().await;

        let StreamOutcome::Completed(final_text) = outcome else {
            debug!("Stream for {} was cancelled", message_id);
            return SendOutcome::Interrupted;
        };

        let finished = inner.mutate(Some(generation), |state| {
            state.finish_stream(&message_id, final_text, is_error);
            state.phase = SessionPhase::Idle;
        });
        // Idle now; a later cycle may start before the guard drops
        guard.disarm();
        if finished.is_none() {
            return SendOutcome::Interrupted;
        }

        inner.events.emit(SessionEvent::StreamFinished {
            message_id: message_id.clone(),
            is_error,
        });

        match failure {
            None => SendOutcome::Replied { message_id },
            Some(error) => SendOutcome::Failed { message_id, error },
        }
    }

    /// Send the text of a suggestion card
    pub async fn send_prompt(&self, card: &PromptCard) -> SendOutcome {
        self.send_message(card.description).await
    }

    /// Clear history and start over from the greeting
    pub fn new_chat(&self) {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            return;
        }

        inner.streamer.cancel();
        let seed = inner.store.reset();
        if inner.mutate(None, |state| state.reset(seed)).is_some() {
            info!("Started a new chat");
            inner.events.emit(SessionEvent::Reset);
        }
    }

    /// Tear the session down; replies still in flight are dropped
    pub fn shutdown(&self) {
        let inner = &self.inner;
        if inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        inner.streamer.cancel();
        info!("Chat session closed");
        inner.events.emit(SessionEvent::Closed);
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Snapshot of the transcript
    pub fn messages(&self) -> Vec<Message> {
        self.inner.state.read().messages.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.read().phase
    }

    pub fn is_busy(&self) -> bool {
        self.phase().is_busy()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn shows_prompt_cards(&self) -> bool {
        prompts::shows_prompt_cards(self.inner.state.read().messages.len())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }
}

fn error_reply(detail: &str) -> String {
    match rand::thread_rng().gen_range(0..3) {
        0 => format!("I'm having trouble connecting to the AI service. ({detail})"),
        1 => format!("Sorry, I encountered an error: {detail}"),
        _ => format!("I'm unable to process your request: {detail}"),
    }
}

/// Builder for chat sessions
pub struct ChatSessionBuilder {
    config: SessionConfig,
    store: Option<TranscriptStore>,
    backend: Option<Arc<dyn ChatBackend>>,
    delay: Option<Arc<dyn DelayPolicy>>,
}

impl ChatSessionBuilder {
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
            store: None,
            backend: None,
            delay: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Persist through this store instead of fresh in-memory storage
    pub fn with_store(mut self, store: TranscriptStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this backend instead of the HTTP client for `chat_endpoint`
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Override the configured stream pacing
    pub fn with_delay_policy(mut self, delay: Arc<dyn DelayPolicy>) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Validate the configuration and load the saved transcript
    pub fn build(self) -> Result<ChatSession> {
        self.config.validate()?;

        let config = self.config;
        let store = self.store.unwrap_or_else(|| {
            TranscriptStore::with_key(Arc::new(MemoryStorage::new()), config.storage_key.clone())
        });
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(HttpChatClient::new(config.chat_endpoint.clone())));
        let delay = self.delay.unwrap_or_else(|| {
            Arc::new(RandomDelay::new(config.stream_delay_min, config.stream_delay_max))
        });

        let messages = store.load();
        info!("Chat session ready with {} messages", messages.len());

        let inner = SessionInner {
            events: EventHub::new(config.event_buffer),
            config,
            state: RwLock::new(SessionState::new(messages)),
            store,
            backend,
            streamer: ResponseStreamer::new(delay),
            closed: AtomicBool::new(false),
        };

        Ok(ChatSession {
            inner: Arc::new(inner),
        })
    }
}

impl Default for ChatSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
