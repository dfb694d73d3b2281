//! OpenAI text-to-speech over HTTP.
//!
//! Sends one `POST {base_url}/v1/audio/speech` per request with a bearer
//! token and a JSON body of `model`, `input` and `voice`. The response body
//! is the encoded audio (MP3 by default).
//!
//! Any server speaking the same protocol works; point
//! [`OpenAiConfig::base_url`] at it.
//!
//! # Voices
//!
//! `alloy`, `echo`, `fable`, `onyx`, `nova`, `shimmer`.
//!
//! # Example
//!
//! ```rust,no_run
//! use read_aloud::{SpeechRequest, SynthesisGateway};
//! use read_aloud::engines::openai::{OpenAiConfig, OpenAiGateway};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = OpenAiGateway::new(OpenAiConfig::default())?;
//! let audio = gateway
//!     .synthesize(&SpeechRequest {
//!         text: "Hello, world!".into(),
//!         voice: "alloy".into(),
//!         model: "tts-1".into(),
//!         api_key: std::env::var("OPENAI_API_KEY")?,
//!     })
//!     .await?;
//! println!("Received {} bytes", audio.len());
//! # Ok(())
//! # }
//! ```

pub mod gateway;

pub use gateway::{OpenAiConfig, OpenAiGateway, VOICES};
