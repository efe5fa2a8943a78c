//! Canned answers used when no provider credential is configured

use crate::api::ChatReply;
use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;

pub const MOCK_REPLIES: [&str; 3] = [
    "I'm a mock response. Please set up your OpenAI API key for real responses.",
    "This is a simulated response. Add your OpenAI API key to get real AI responses.",
    "Mock response: I'm here to help! To enable real AI responses, please configure your OpenAI API key.",
];

pub const MOCK_TRANSCRIPT: &str = "This is a mock transcription. In production, this would be the actual transcribed text from the audio.";

/// A chat reply with a `mock-<millis>` id
pub fn mock_reply() -> ChatReply {
    let now = Utc::now();
    let content = MOCK_REPLIES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(MOCK_REPLIES[0]);

    ChatReply {
        id: Some(format!("mock-{}", now.timestamp_millis())),
        content: content.to_string(),
        role: Some("assistant".to_string()),
        timestamp: Some(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_reply_shape() {
        let reply = mock_reply();
        assert!(reply.id.as_deref().is_some_and(|id| id.starts_with("mock-")));
        assert!(MOCK_REPLIES.contains(&reply.content.as_str()));
        assert_eq!(reply.role.as_deref(), Some("assistant"));
        assert!(reply.timestamp.as_deref().is_some_and(|t| t.ends_with('Z')));
    }
}
