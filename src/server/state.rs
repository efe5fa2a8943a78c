//! Shared application state injected into every handler.

use crate::server::config::ServerConfig;
use crate::server::provider::{ChatProvider, OpenAiClient, SpeechProvider};
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// `None` when no credential is configured
    pub chat: Option<Arc<dyn ChatProvider>>,
    pub speech: Option<Arc<dyn SpeechProvider>>,
}

impl AppState {
    /// Wire the OpenAI client when a key is present, otherwise run in mock mode
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let (chat, speech): (Option<Arc<dyn ChatProvider>>, Option<Arc<dyn SpeechProvider>>) =
            if config.has_api_key() {
                let client = Arc::new(OpenAiClient::from_config(&config)?);
                let chat: Arc<dyn ChatProvider> = client.clone();
                let speech: Arc<dyn SpeechProvider> = client;
                (Some(chat), Some(speech))
            } else {
                info!("OPENAI_API_KEY not set; chat replies are mocked");
                (None, None)
            };

        Ok(Self {
            config: Arc::new(config),
            chat,
            speech,
        })
    }

    /// State with explicit providers, for embedding and tests
    pub fn with_providers(
        config: ServerConfig,
        chat: Option<Arc<dyn ChatProvider>>,
        speech: Option<Arc<dyn SpeechProvider>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            chat,
            speech,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("environment", &self.config.environment)
            .field("chat", &self.chat.is_some())
            .field("speech", &self.speech.is_some())
            .finish()
    }
}
