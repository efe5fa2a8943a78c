//! HTTP clients for the two backend proxies
//!
//! The session controller and voice input depend on the traits, so tests and
//! embedders can swap in their own transport.

pub mod chat;
pub mod transcribe;

pub use chat::{interpret_chat_response, ChatBackend, ChatReply, ClientError, HttpChatClient};
pub use transcribe::{
    interpret_transcript_response, AudioUpload, HttpTranscriptionClient, TranscriptionBackend,
};
