//! Error types for every stage of the read-aloud pipeline.

/// Failure of a speech synthesis request.
///
/// HTTP failures keep the status code and the response body verbatim so the
/// message shown to the user is the one the service sent.
#[derive(thiserror::Error, Debug)]
pub enum SynthesisError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error! status: {status}, message: {body}")]
    Auth { status: u16, body: String },
    #[error("HTTP error! status: {status}, message: {body}")]
    Service { status: u16, body: String },
}

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("No audio data received")]
    Empty,
    #[error("Unsupported or malformed audio: {0}")]
    Malformed(String),
    #[error("Invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
    #[error("Invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(thiserror::Error, Debug)]
pub enum PlaybackError {
    #[error("Audio output unavailable: {0}")]
    OutputUnavailable(String),
    #[error("Audio output failed: {0}")]
    Output(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("No audio loaded")]
    NothingLoaded,
    #[error("Export was interrupted: {0}")]
    Interrupted(String),
    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("API key not found. Please configure it in the settings.")]
    MissingApiKey,
    #[error("Please enter an API key")]
    EmptyApiKey,
    #[error("Invalid chunk bounds: max {max} must be >= min {min} >= 1")]
    ChunkBounds { max: usize, min: usize },
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("Settings store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Settings store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level error returned across the message boundary.
#[derive(thiserror::Error, Debug)]
pub enum ReaderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("Unknown action: {0}")]
    UnknownCommand(String),
    #[error("Invalid message payload: {0}")]
    InvalidPayload(String),
    #[error("No text selected")]
    NoSelection,
    #[error("No audio loaded")]
    NoAudio,
    #[error("Audio was replaced or closed while decoding")]
    Superseded,
    #[error("Page rejected the request: {0}")]
    Rejected(String),
}

pub type Result<T, E = ReaderError> = std::result::Result<T, E>;
