//! Transcription proxy route (`POST /api/transcribe`).
//!
//! Accepts multipart/form-data with an `audio` field and forwards it to the
//! speech provider.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::api::AudioUpload;
use crate::server::error::ServerError;
use crate::server::mock::MOCK_TRANSCRIPT;
use crate::server::provider::ProviderError;
use crate::server::state::AppState;

const NO_AUDIO: &str = "No audio file provided";
const TRANSCRIBE_FAILED: &str = "Failed to transcribe audio";
const DEFAULT_FILE_NAME: &str = "recording.webm";
const DEFAULT_MIME_TYPE: &str = "audio/webm";

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub text: String,
}

pub fn router(max_audio_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route("/transcribe", post(transcribe))
        .layer(DefaultBodyLimit::max(max_audio_bytes))
}

pub async fn transcribe(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptResponse>, ServerError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "request is not multipart");
        ServerError::BadRequest(NO_AUDIO.to_string())
    })?;

    let audio = read_audio_field(&mut multipart)
        .await?
        .ok_or_else(|| ServerError::BadRequest(NO_AUDIO.to_string()))?;
    debug!(
        file_name = %audio.file_name,
        content_type = %audio.mime_type,
        size_bytes = audio.bytes.len(),
        "received audio upload"
    );

    let result = match state.speech.as_ref() {
        Some(provider) => provider.transcribe(audio).await,
        None => Err(ProviderError::NotConfigured(
            "OPENAI_API_KEY is not set".to_string(),
        )),
    };

    match result {
        Ok(text) => Ok(Json(TranscriptResponse { text })),
        Err(e) => {
            error!(error = %e, "transcription error");
            if state.config.is_development() && !state.config.has_api_key() {
                warn!("using mock transcription response");
                return Ok(Json(TranscriptResponse {
                    text: MOCK_TRANSCRIPT.to_string(),
                }));
            }
            Err(ServerError::Upstream {
                message: TRANSCRIBE_FAILED.to_string(),
                details: None,
            })
        }
    }
}

/// The first non-empty `audio` field; other fields are skipped
async fn read_audio_field(multipart: &mut Multipart) -> Result<Option<AudioUpload>, ServerError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("audio") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let mime_type = field
            .content_type()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(AudioUpload::new(bytes.to_vec(), file_name, mime_type)));
    }
    Ok(None)
}

fn multipart_error(e: MultipartError) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServerError::PayloadTooLarge(e.body_text())
    } else {
        debug!(error = %e, "failed to read multipart body");
        ServerError::BadRequest(NO_AUDIO.to_string())
    }
}

/// Keep only the final path component and drop unusual characters
fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect()
}
