//! Client for the backend transcription proxy

use super::chat::{error_message, parse_body, ClientError};
use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Encoded audio ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioUpload {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptResponse {
    text: String,
}

/// The transcription endpoint as seen by voice input
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, ClientError>;
}

/// Uploads audio as multipart form data with an `audio` field
#[derive(Debug, Clone)]
pub struct HttpTranscriptionClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriptionClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for HttpTranscriptionClient {
    async fn transcribe(&self, audio: AudioUpload) -> Result<String, ClientError> {
        debug!(
            "Uploading {} bytes ({}) to {}",
            audio.bytes.len(),
            audio.mime_type,
            self.endpoint
        );

        let part = multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime_type)
            .map_err(|e| ClientError::InvalidResponse(format!("Invalid audio type: {}", e)))?;
        let form = multipart::Form::new().part("audio", part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        interpret_transcript_response(status, &body)
    }
}

pub fn interpret_transcript_response(status: StatusCode, body: &str) -> Result<String, ClientError> {
    let value = parse_body(status, body)?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            message: error_message(status, &value),
        });
    }

    serde_json::from_value::<TranscriptResponse>(value)
        .map(|r| r.text)
        .map_err(|e| ClientError::InvalidResponse(format!("Invalid response from server: {}", e)))
}
