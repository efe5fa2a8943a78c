pub mod audio;
pub mod voice;

pub use audio::{AudioClip, AudioData};
pub use voice::{RecordingState, VoiceInput};
