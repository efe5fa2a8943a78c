//! Upstream language-model and speech providers
//!
//! The routes depend on the [`ChatProvider`] and [`SpeechProvider`] traits;
//! [`OpenAiClient`] implements both against an OpenAI-compatible API.

use crate::api::AudioUpload;
use crate::messages::ChatTurn;
use crate::server::config::ServerConfig;
use crate::{PalaverError, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a response
    #[error("{0}")]
    Transport(String),

    /// The provider answered with a non-2xx status
    #[error("{}", .message.as_deref().unwrap_or("Provider request failed"))]
    Api {
        status: u16,
        code: Option<String>,
        message: Option<String>,
    },

    /// The success body did not have the expected shape
    #[error("{0}")]
    InvalidResponse(String),

    /// No provider is configured
    #[error("{0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Quota or billing failures get their own status and message
    pub fn is_quota(&self) -> bool {
        match self {
            ProviderError::Api { code, message, .. } => {
                code.as_deref() == Some("insufficient_quota")
                    || message
                        .as_deref()
                        .is_some_and(|m| m.contains("quota") || m.contains("billing"))
            }
            _ => false,
        }
    }

    /// The provider's own message, if it sent one
    pub fn provider_message(&self) -> Option<&str> {
        match self {
            ProviderError::Api { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// A finished completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub id: String,
    pub content: String,
    pub role: String,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatTurn]) -> std::result::Result<Completion, ProviderError>;
}

#[async_trait]
pub trait SpeechProvider: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> std::result::Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    id: String,
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default = "assistant_role")]
    role: String,
    #[serde(default)]
    content: Option<String>,
}

fn assistant_role() -> String {
    "assistant".to_string()
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI-compatible client for chat completions and transcriptions
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    temperature: f32,
    max_tokens: u32,
    transcribe_model: String,
}

impl OpenAiClient {
    /// Build from server configuration; requires an API key
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| PalaverError::ConfigError("OPENAI_API_KEY is not set".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e| {
                PalaverError::ConfigError(format!("Invalid authorization header value: {}", e))
            })?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.upstream_timeout)
            .build()
            .map_err(|e| PalaverError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            transcribe_model: config.transcribe_model.clone(),
        })
    }

    async fn read_json(
        response: reqwest::Response,
    ) -> std::result::Result<serde_json::Value, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                ProviderError::InvalidResponse(format!("Failed to parse provider response: {}", e))
            } else {
                ProviderError::Api {
                    status: status.as_u16(),
                    code: None,
                    message: None,
                }
            }
        })?;

        if !status.is_success() {
            error!("Provider API error ({}): {}", status, value);
            return Err(api_error(status.as_u16(), &value));
        }
        Ok(value)
    }
}

/// Extract `{ error: { code, message } }` from a provider error body
pub fn api_error(status: u16, body: &serde_json::Value) -> ProviderError {
    let error = body.get("error");
    let field = |name: &str| {
        error
            .and_then(|e| e.get(name))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    ProviderError::Api {
        status,
        code: field("code"),
        message: field("message"),
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(&self, messages: &[ChatTurn]) -> std::result::Result<Completion, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Sending {} messages to {}", messages.len(), url);

        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let value = Self::read_json(response).await?;
        let parsed: ChatCompletionResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("Unexpected completion shape: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("Completion has no choices".to_string()))?;

        Ok(Completion {
            id: parsed.id,
            content: choice.message.content.unwrap_or_default(),
            role: choice.message.role,
        })
    }
}

#[async_trait]
impl SpeechProvider for OpenAiClient {
    async fn transcribe(&self, audio: AudioUpload) -> std::result::Result<String, ProviderError> {
        let url = format!("{}/audio/transcriptions", self.base_url);
        debug!("Uploading {} bytes to {}", audio.bytes.len(), url);

        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(|e| ProviderError::Transport(format!("Invalid audio type: {}", e)))?;
        let form = Form::new()
            .text("model", self.transcribe_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let value = Self::read_json(response).await?;
        serde_json::from_value::<TranscriptionResponse>(value)
            .map(|r| r.text)
            .map_err(|e| ProviderError::InvalidResponse(format!("Unexpected transcription shape: {}", e)))
    }
}
