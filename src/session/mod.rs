//! Client-side chat session
//!
//! The controller drives one send/receive cycle at a time and reports every
//! transcript change to subscribers; the streamer reveals replies token by
//! token.

pub mod config;
pub mod controller;
pub mod prompts;
pub mod state;
pub mod streamer;

pub use config::SessionConfig;
pub use controller::{ChatSession, ChatSessionBuilder, IgnoreReason, SendOutcome};
pub use prompts::{exceeds_input_limit, PromptCard, MAX_INPUT_CHARS, PROMPT_CARDS};
pub use state::{EventHub, SessionEvent, SessionPhase, SessionState};
pub use streamer::{
    tokenize, DelayPolicy, FixedDelay, RandomDelay, ResponseStreamer, StreamOutcome, StreamSink,
    StreamTask,
};
