//! Session state owned by the chat controller
//!
//! The transcript plus the phase of the current send/receive cycle. Readers
//! get snapshots; change notifications go out as [`SessionEvent`]s.

use crate::messages::{DeliveryStatus, Message};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// Phase of the send/receive cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SessionPhase {
    /// Ready for a new message
    #[default]
    Idle,
    /// Waiting for the chat backend
    AwaitingReply,
    /// Revealing the reply
    Streaming,
}

impl SessionPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionPhase::Idle)
    }

    pub fn is_busy(&self) -> bool {
        !self.is_idle()
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, SessionPhase::Streaming)
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "Idle"),
            SessionPhase::AwaitingReply => write!(f, "AwaitingReply"),
            SessionPhase::Streaming => write!(f, "Streaming"),
        }
    }
}

/// Notifications for the presentation layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Any change to the transcript (re-read via `messages()`)
    TranscriptChanged,
    /// A reply started streaming into the message with this id
    StreamStarted { message_id: String },
    /// The reply finished; `is_error` marks a failure explanation
    StreamFinished { message_id: String, is_error: bool },
    /// The transcript was reset to the greeting
    Reset,
    /// The session was torn down
    Closed,
}

#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub messages: Vec<Message>,
    pub phase: SessionPhase,
    /// Bumped on reset so replies from an older cycle are dropped
    pub generation: u64,
}

impl SessionState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn remove_loading(&mut self) {
        self.messages.retain(|m| !m.is_loading);
    }

    pub fn set_status(&mut self, id: &str, status: DeliveryStatus) {
        if let Some(message) = self.find_mut(id) {
            message.status = Some(status);
        }
    }

    /// Replace the text of a streaming message; other messages are frozen
    pub fn set_streaming_text(&mut self, id: &str, text: &str) -> bool {
        match self.find_mut(id) {
            Some(message) if message.is_streaming => {
                message.text.clear();
                message.text.push_str(text);
                true
            }
            _ => false,
        }
    }

    pub fn finish_stream(&mut self, id: &str, text: String, is_error: bool) {
        if let Some(message) = self.find_mut(id) {
            message.text = text;
            message.is_streaming = false;
            message.is_error = is_error;
        }
    }

    pub fn loading_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_loading).count()
    }

    pub fn streaming_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_streaming).count()
    }

    /// Settle a cycle whose caller went away before it finished.
    ///
    /// Drops the placeholder, freezes any partially streamed text and marks a
    /// user message that never got an answer as failed.
    pub fn abandon_cycle(&mut self, user_id: &str) {
        self.remove_loading();
        for message in self.messages.iter_mut().filter(|m| m.is_streaming) {
            message.is_streaming = false;
        }
        if let Some(message) = self.find_mut(user_id) {
            if message.status == Some(DeliveryStatus::Sending) {
                message.status = Some(DeliveryStatus::Error);
            }
        }
        self.phase = SessionPhase::Idle;
    }

    pub fn reset(&mut self, seed: Vec<Message>) {
        self.messages = seed;
        self.phase = SessionPhase::Idle;
        self.generation += 1;
    }
}

/// Fan-out of session events to bounded subscriber channels
pub struct EventHub {
    capacity: usize,
    subscribers: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = bounded(self.capacity);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver to every live subscriber; a full channel only misses this event
    pub fn emit(&self, event: SessionEvent) {
        self.subscribers
            .lock()
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
