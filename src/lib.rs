//! # read-aloud
//!
//! A Rust library that reads selected text aloud: it sends the text to a
//! cloud speech API and plays the synthesized audio through a seekable,
//! rate- and volume-controllable playback engine.
//!
//! ## Features
//!
//! - **Seekable playback**: one decoded buffer with play/pause, seek, skip,
//!   speed, volume and mute over a clock-driven timeline
//! - **Streamed playback**: independently synthesized chunks played back to
//!   back in order, where one bad chunk never stalls the rest
//! - **Chunking**: long selections split on word boundaries
//! - **Export**: offline render of the loaded audio to a WAV file
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! read-aloud = { version = "2026.2", features = ["openai", "playback"] }
//! ```
//!
//! ```rust,no_run
//! # #[cfg(feature = "openai")]
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use read_aloud::background::ReadAloud;
//! use read_aloud::config::{JsonFileStore, SettingsStore};
//! use read_aloud::engines::openai::OpenAiGateway;
//! use read_aloud::host::ContentHost;
//! use read_aloud::ui::LogView;
//!
//! let host = ContentHost::builder(LogView, || "Text to read".to_string()).build();
//! let store: Arc<dyn SettingsStore> = Arc::new(JsonFileStore::new("settings.json"));
//! let reader = ReadAloud::new(host.clone(), OpenAiGateway::new(Default::default())?, store);
//! reader.read_selection().await?;
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod chunking;
pub mod config;
pub mod decode;
pub mod engines;
pub mod error;
pub mod export;
pub mod host;
pub mod messages;
pub mod playback;
pub mod ui;

use std::path::Path;

use async_trait::async_trait;

pub use error::{
    ConfigError, DecodeError, ExportError, PlaybackError, ReaderError, Result, SynthesisError,
};

/// Decoded PCM audio.
///
/// Samples are interleaved f32 values in `[-1.0, 1.0]`. Once decoded the
/// buffer is never mutated; playback and export share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved audio samples
    pub samples: Vec<f32>,
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample rate of the audio in Hz
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        Self {
            samples,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Interleaved samples starting at the frame nearest to `seconds`.
    pub fn samples_from(&self, seconds: f64) -> &[f32] {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        let start = frame.min(self.frames()) * self.channels as usize;
        &self.samples[start..]
    }

    /// Samples of a single channel, de-interleaved.
    pub fn channel(&self, index: u16) -> impl Iterator<Item = f32> + '_ {
        self.samples
            .iter()
            .skip(index as usize)
            .step_by(self.channels.max(1) as usize)
            .copied()
    }

    /// Render the audio offline and write it to a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<(), ExportError> {
        let bytes = export::export_wav(self)?;
        std::fs::write(path, bytes).map_err(|e| ExportError::Wav(hound::Error::IoError(e)))
    }
}

/// A single speech synthesis request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Text to speak
    pub text: String,
    /// Voice name (e.g. `"alloy"`)
    pub voice: String,
    /// Synthesis model (e.g. `"tts-1"`)
    pub model: String,
    /// API key sent as a bearer token
    pub api_key: String,
}

/// Common interface for speech synthesis services.
///
/// Implementations return the encoded audio exactly as the service sent it;
/// decoding is the player's job. No retry happens at this layer.
#[async_trait]
pub trait SynthesisGateway: Send + Sync {
    /// Synthesize speech for the request and return the encoded audio bytes.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError>;
}

#[async_trait]
impl<G: SynthesisGateway + ?Sized> SynthesisGateway for std::sync::Arc<G> {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        (**self).synthesize(request).await
    }
}
