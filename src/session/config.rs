//! Configuration for a chat session

use crate::messages::DEFAULT_STORAGE_KEY;
use crate::{PalaverError, Result};
use std::time::Duration;

/// Configuration for the client-side chat session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// URL of the backend chat proxy
    pub chat_endpoint: String,

    /// URL of the backend transcription proxy
    pub transcribe_endpoint: String,

    /// Local storage key holding the transcript
    pub storage_key: String,

    /// Upper bound on a single chat request
    pub request_timeout: Duration,

    /// Shortest pause between two revealed tokens
    pub stream_delay_min: Duration,

    /// Longest pause between two revealed tokens
    pub stream_delay_max: Duration,

    /// Buffered events per subscriber
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chat_endpoint: "http://localhost:3000/api/chat".to_string(),
            transcribe_endpoint: "http://localhost:3000/api/transcribe".to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            request_timeout: Duration::from_secs(60),
            stream_delay_min: Duration::from_millis(30),
            stream_delay_max: Duration::from_millis(80),
            event_buffer: 256,
        }
    }
}

impl SessionConfig {
    /// Point both endpoints at a server root, e.g. `http://localhost:3000`
    pub fn with_server(mut self, base_url: impl AsRef<str>) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        self.chat_endpoint = format!("{base}/api/chat");
        self.transcribe_endpoint = format!("{base}/api/transcribe");
        self
    }

    pub fn with_chat_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.chat_endpoint = endpoint.into();
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_stream_delay(mut self, min: Duration, max: Duration) -> Self {
        self.stream_delay_min = min;
        self.stream_delay_max = max;
        self
    }

    pub fn with_event_buffer(mut self, size: usize) -> Self {
        self.event_buffer = size;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for endpoint in [&self.chat_endpoint, &self.transcribe_endpoint] {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(PalaverError::ConfigError(format!(
                    "Endpoint must be an http(s) URL: {}",
                    endpoint
                )));
            }
        }

        if self.storage_key.trim().is_empty() {
            return Err(PalaverError::ConfigError("Storage key is required".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(PalaverError::ConfigError(
                "Request timeout must be positive".to_string(),
            ));
        }

        if self.stream_delay_min > self.stream_delay_max {
            return Err(PalaverError::ConfigError(format!(
                "Stream delay range is inverted: {:?} > {:?}",
                self.stream_delay_min, self.stream_delay_max
            )));
        }

        Ok(())
    }
}
