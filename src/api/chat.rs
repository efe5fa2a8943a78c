//! Client for the backend chat proxy

use crate::messages::ChatTurn;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Transport-level failures seen by the session.
///
/// The display text is embedded verbatim in the user-facing error reply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The request never produced a response
    #[error("{0}")]
    Network(String),

    /// The server answered with a non-2xx status
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The body could not be understood
    #[error("{0}")]
    InvalidResponse(String),

    /// No answer within the configured bound
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: &'a [ChatTurn],
}

/// Successful chat proxy answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub role: Option<String>,
    /// RFC 3339 creation time as reported by the proxy
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ChatReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            role: Some("assistant".to_string()),
            timestamp: None,
        }
    }
}

/// The chat endpoint as seen by the session controller
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn send(&self, turns: &[ChatTurn]) -> Result<ChatReply, ClientError>;
}

/// Chat backend speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn send(&self, turns: &[ChatTurn]) -> Result<ChatReply, ClientError> {
        debug!("Sending {} turns to {}", turns.len(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { messages: turns })
            .send()
            .await
            .map_err(|e| {
                error!("Fetch error: {}", e);
                ClientError::Network(network_message(&e))
            })?;

        let status = response.status();
        debug!("API response status: {}", status);

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(network_message(&e)))?;

        interpret_chat_response(status, &body)
    }
}

fn network_message(e: &reqwest::Error) -> String {
    let message = e.to_string();
    if message.is_empty() {
        "Failed to connect to the server".to_string()
    } else {
        message
    }
}

/// Turn a raw proxy response into a reply or a classified error
pub fn interpret_chat_response(status: StatusCode, body: &str) -> Result<ChatReply, ClientError> {
    let value = parse_body(status, body)?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            message: error_message(status, &value),
        });
    }

    serde_json::from_value(value).map_err(|e| {
        ClientError::InvalidResponse(format!("Invalid response from server: {}", e))
    })
}

/// Parse a JSON body; an empty body counts as `{}`
pub(crate) fn parse_body(status: StatusCode, body: &str) -> Result<serde_json::Value, ClientError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Object(Default::default()));
    }

    serde_json::from_str(body).map_err(|_| {
        ClientError::InvalidResponse(format!(
            "Invalid response from server: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        ))
    })
}

/// Pick the most specific message from an error body
pub(crate) fn error_message(status: StatusCode, value: &serde_json::Value) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .find(|text| !text.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}
