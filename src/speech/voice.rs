//! Voice input: turns a finished recording into message text
//!
//! Capture itself belongs to the platform; this type tracks the recording
//! state and ships the finished clip to the transcription proxy.

use crate::api::{HttpTranscriptionClient, TranscriptionBackend};
use crate::speech::audio::AudioClip;
use crate::{PalaverError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Recording state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordingState {
    /// Not recording
    #[default]
    Idle,
    /// Currently recording audio
    Recording,
    /// Waiting for the transcript
    Transcribing,
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingState::Idle => write!(f, "Idle"),
            RecordingState::Recording => write!(f, "Recording"),
            RecordingState::Transcribing => write!(f, "Transcribing"),
        }
    }
}

pub struct VoiceInput {
    backend: Arc<dyn TranscriptionBackend>,
    state: Arc<RwLock<RecordingState>>,
}

/// Returns the state to Idle when a transcription ends, however it ends
struct IdleOnDrop(Arc<RwLock<RecordingState>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        *self.0.write() = RecordingState::Idle;
    }
}

impl VoiceInput {
    /// Voice input backed by the HTTP transcription proxy at `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_backend(Arc::new(HttpTranscriptionClient::new(endpoint)))
    }

    pub fn with_backend(backend: Arc<dyn TranscriptionBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(RecordingState::Idle)),
        }
    }

    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    pub fn start_recording(&self) -> Result<()> {
        let mut state = self.state.write();
        match *state {
            RecordingState::Idle => {
                *state = RecordingState::Recording;
                info!("Recording started");
                Ok(())
            }
            other => Err(PalaverError::RecordingError(format!(
                "Cannot start recording while {}",
                other
            ))),
        }
    }

    /// Discard the current recording; returns whether one was active
    pub fn cancel_recording(&self) -> bool {
        let mut state = self.state.write();
        if *state == RecordingState::Recording {
            *state = RecordingState::Idle;
            info!("Recording cancelled");
            true
        } else {
            false
        }
    }

    /// Stop recording and transcribe `clip`; returns the trimmed transcript
    pub async fn finish(&self, clip: AudioClip) -> Result<String> {
        {
            let mut state = self.state.write();
            if *state != RecordingState::Recording {
                return Err(PalaverError::RecordingError(format!(
                    "Not recording (state: {})",
                    *state
                )));
            }
            *state = RecordingState::Transcribing;
        }
        let _idle = IdleOnDrop(Arc::clone(&self.state));

        if clip.is_empty() {
            return Err(PalaverError::RecordingError("No audio captured".to_string()));
        }

        let upload = clip.into_upload()?;
        debug!(
            "Transcribing {} bytes of {}",
            upload.bytes.len(),
            upload.mime_type
        );

        let text = self.backend.transcribe(upload).await.map_err(|e| {
            warn!("Transcription failed: {}", e);
            PalaverError::TranscriptionError(e.to_string())
        })?;

        let text = text.trim().to_string();
        info!("Transcribed {} characters", text.len());
        Ok(text)
    }
}
