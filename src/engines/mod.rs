//! Speech synthesis backends.
//!
//! Each backend implements [`SynthesisGateway`](crate::SynthesisGateway) and
//! returns encoded audio exactly as the service produced it.
//!
//! # Available Backends
//!
//! Enable backends via Cargo features:
//! - `openai` - OpenAI-compatible `/v1/audio/speech` endpoint over HTTPS

#[cfg(feature = "openai")]
pub mod openai;
