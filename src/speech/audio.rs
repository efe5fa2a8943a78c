//! Recorded audio and its encoding for upload

use crate::api::AudioUpload;
use crate::{PalaverError, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;
use tracing::debug;

/// Raw PCM captured by the microphone
#[derive(Debug, Clone, PartialEq)]
pub struct AudioData {
    /// Interleaved samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }

    /// Encode as 16-bit integer WAV
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(PalaverError::AudioEncodingError(format!(
                "Invalid audio format: {} Hz, {} channels",
                self.sample_rate, self.channels
            )));
        }

        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buffer, spec).map_err(|e| {
                PalaverError::AudioEncodingError(format!("Failed to create WAV writer: {}", e))
            })?;

            for &sample in &self.samples {
                let sample_i16 = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(sample_i16).map_err(|e| {
                    PalaverError::AudioEncodingError(format!("Failed to write sample: {}", e))
                })?;
            }

            writer.finalize().map_err(|e| {
                PalaverError::AudioEncodingError(format!("Failed to finalize WAV: {}", e))
            })?;
        }

        let bytes = buffer.into_inner();
        debug!(
            "Encoded {} samples ({:.2}s) as {} bytes of WAV",
            self.samples.len(),
            self.duration_secs(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Decode 16-bit integer WAV produced by [`AudioData::to_wav`]
    pub fn from_wav(bytes: &[u8]) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| {
            PalaverError::AudioEncodingError(format!("Failed to open WAV data: {}", e))
        })?;

        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(PalaverError::AudioEncodingError(format!(
                "Unsupported WAV format: {:?} {} bits",
                spec.sample_format, spec.bits_per_sample
            )));
        }

        let samples = reader
            .into_samples::<i16>()
            .map(|s| {
                s.map(|sample| sample as f32 / i16::MAX as f32).map_err(|e| {
                    PalaverError::AudioEncodingError(format!("Failed to read sample: {}", e))
                })
            })
            .collect::<Result<Vec<f32>>>()?;

        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }
}

/// A finished recording as handed over by the capture layer
#[derive(Debug, Clone, PartialEq)]
pub enum AudioClip {
    /// Already encoded by the recorder, e.g. `audio/webm`
    Encoded { bytes: Vec<u8>, mime_type: String },
    /// Raw samples, encoded to WAV before upload
    Pcm(AudioData),
}

impl AudioClip {
    pub fn encoded(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        AudioClip::Encoded {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            AudioClip::Encoded { bytes, .. } => bytes.is_empty(),
            AudioClip::Pcm(audio) => audio.is_empty(),
        }
    }

    /// Build the multipart payload for the transcription proxy
    pub fn into_upload(self) -> Result<AudioUpload> {
        match self {
            AudioClip::Encoded { bytes, mime_type } => {
                let file_name = format!("recording.{}", extension_for(&mime_type));
                Ok(AudioUpload::new(bytes, file_name, mime_type))
            }
            AudioClip::Pcm(audio) => Ok(AudioUpload::new(
                audio.to_wav()?,
                "recording.wav",
                "audio/wav",
            )),
        }
    }
}

fn extension_for(mime_type: &str) -> &str {
    // Drop parameters such as `;codecs=opus`
    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    match essence {
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        _ => "webm",
    }
}
