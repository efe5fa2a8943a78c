//! Backend proxy server
//!
//! Two stateless routes forward chat and transcription requests to an
//! upstream provider and normalize its answers and errors.

pub mod config;
pub mod error;
pub mod mock;
pub mod provider;
pub mod routes;
pub mod state;

pub use config::{Environment, ServerConfig};
pub use error::ServerError;
pub use provider::{ChatProvider, Completion, OpenAiClient, ProviderError, SpeechProvider};
pub use state::AppState;

use crate::{PalaverError, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Bind `config.bind_address` and serve until `shutdown` resolves
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        PalaverError::ConfigError(format!("Invalid bind address '{}': {}", config.bind_address, e))
    })?;

    let state = Arc::new(AppState::from_config(config)?);
    let app = routes::build(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("palaver server stopped");
    Ok(())
}
