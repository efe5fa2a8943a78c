pub mod api;
pub mod messages;
pub mod server;
pub mod session;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PalaverError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Transcription error: {0}")]
    TranscriptionError(String),

    #[error("Recording error: {0}")]
    RecordingError(String),

    #[error("Audio encoding error: {0}")]
    AudioEncodingError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for PalaverError {
    fn from(e: std::io::Error) -> Self {
        PalaverError::IOError(e.to_string())
    }
}

impl From<serde_json::Error> for PalaverError {
    fn from(e: serde_json::Error) -> Self {
        PalaverError::SerializationError(e.to_string())
    }
}

impl PalaverError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Storage can be retried on the next mutation
            PalaverError::StorageError(_) => true,
            PalaverError::SerializationError(_) => false,
            // These are typically transient errors
            PalaverError::TranscriptionError(_) => true,
            PalaverError::RecordingError(_) => true,
            PalaverError::AudioEncodingError(_) => false,
            PalaverError::IOError(_) => false,
            PalaverError::ConfigError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            PalaverError::StorageError(_) => {
                "Chat history could not be saved.".to_string()
            }
            PalaverError::SerializationError(_) => {
                "Chat history is unreadable.".to_string()
            }
            PalaverError::TranscriptionError(_) => {
                "Speech recognition failed. Please try again.".to_string()
            }
            PalaverError::RecordingError(_) => {
                "Recording is not available right now.".to_string()
            }
            PalaverError::AudioEncodingError(_) => {
                "The recording could not be encoded.".to_string()
            }
            PalaverError::IOError(_) => "File system error occurred.".to_string(),
            PalaverError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PalaverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(PalaverError::TranscriptionError("offline".into()).is_recoverable());
        assert!(!PalaverError::ConfigError("bad url".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_conversion() {
        let err: PalaverError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, PalaverError::IOError(ref m) if m.contains("gone")));
    }
}
