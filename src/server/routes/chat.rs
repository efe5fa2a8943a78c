//! Chat proxy route (`POST /api/chat`).

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::api::ChatReply;
use crate::messages::ChatTurn;
use crate::server::error::ServerError;
use crate::server::mock::mock_reply;
use crate::server::provider::ProviderError;
use crate::server::state::AppState;

const QUOTA_PREFIX: &str = "API quota exceeded. Please check your OpenAI account billing status.";
const FALLBACK_ERROR: &str = "Failed to get response from OpenAI";

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Deserialize)]
struct IncomingTurn {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingTurn>,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Forward the conversation to the provider, or answer with a mock reply
/// when no credential is configured.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<ChatReply>, ServerError> {
    let request: ChatRequest =
        serde_json::from_slice(&body).map_err(|e| ServerError::InvalidBody {
            details: e.to_string(),
        })?;
    info!(messages = request.messages.len(), "chat request");

    let Some(provider) = state.chat.as_ref() else {
        debug!("no provider configured; returning mock reply");
        return Ok(Json(mock_reply()));
    };

    let turns: Vec<ChatTurn> = request
        .messages
        .into_iter()
        .map(|m| ChatTurn::new(m.role.as_str(), m.content))
        .collect();

    let completion = provider
        .complete(&turns)
        .await
        .map_err(|e| upstream_failure(&e, state.config.is_development()))?;

    Ok(Json(ChatReply {
        id: Some(completion.id).filter(|id| !id.is_empty()),
        content: completion.content,
        role: Some(completion.role),
        timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    }))
}

/// Map a provider failure onto the response the client sees
pub fn upstream_failure(err: &ProviderError, include_details: bool) -> ServerError {
    let details = include_details.then(|| format!("{:?}", err));

    if err.is_quota() {
        let reason = err.provider_message().unwrap_or("Insufficient quota");
        return ServerError::QuotaExceeded {
            message: format!("{} \"{}\"", QUOTA_PREFIX, reason),
            details,
        };
    }

    let message = match err {
        ProviderError::Api { message: None, .. } => FALLBACK_ERROR.to_string(),
        other => {
            let text = other.to_string();
            if text.is_empty() {
                FALLBACK_ERROR.to_string()
            } else {
                text
            }
        }
    };
    ServerError::Upstream { message, details }
}
