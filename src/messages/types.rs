use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Text of the seed message shown in a fresh transcript.
pub const GREETING_TEXT: &str = "Hi there! I'm your AI assistant. How can I help you today?";

/// Text of the placeholder shown while a reply is pending.
pub const LOADING_TEXT: &str = "Thinking...";

/// Id reserved for the greeting seed.
pub const GREETING_ID: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    /// Older transcripts stored the assistant as `ai`.
    #[serde(alias = "ai")]
    Assistant,
}

impl Sender {
    /// Role name used on the chat wire format
    pub fn role(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }
}

/// Delivery state of a user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Delivered,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_streaming: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

// Older transcripts stored millisecond timestamps as numeric ids.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            status: None,
            is_loading: false,
            is_streaming: false,
            is_error: false,
        }
    }

    /// A user message awaiting the backend
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            status: Some(DeliveryStatus::Sending),
            ..Self::new(Sender::User, text)
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }

    /// The transient "thinking" placeholder
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::new(Sender::Assistant, LOADING_TEXT)
        }
    }

    /// An empty assistant message whose text is revealed incrementally
    pub fn streaming(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
            is_streaming: true,
            ..Self::new(Sender::Assistant, String::new())
        }
    }

    pub fn greeting() -> Self {
        Self {
            id: GREETING_ID.to_string(),
            ..Self::new(Sender::Assistant, GREETING_TEXT)
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// Whether the message is transient and must not reach storage
    pub fn is_transient(&self) -> bool {
        self.is_loading
    }
}

/// One `{role, content}` turn sent to the chat backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self::new(message.sender.role(), message.text.clone())
    }
}
