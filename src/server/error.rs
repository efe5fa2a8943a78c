//! Error type returned by the proxy handlers.
//!
//! Every handler returns `Result<T, ServerError>`; the error renders as a
//! JSON body `{ "error": ..., "details"?: ... }` with a matching status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum ServerError {
    /// The chat body was not `{ messages: [...] }`
    #[error("Invalid request body")]
    InvalidBody { details: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    /// The provider rejected the request for quota or billing reasons
    #[error("{message}")]
    QuotaExceeded {
        message: String,
        details: Option<String>,
    },

    /// Any other provider failure
    #[error("{message}")]
    Upstream {
        message: String,
        details: Option<String>,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidBody { .. } | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ServerError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ServerError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Option<&str> {
        match self {
            ServerError::InvalidBody { details } => Some(details),
            ServerError::QuotaExceeded { details, .. } | ServerError::Upstream { details, .. } => {
                details.as_deref()
            }
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
