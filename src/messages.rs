//! Message envelope exchanged with the page.
//!
//! Messages arrive as JSON objects tagged by `action`. The action is checked
//! against the closed set of known commands before the payload is parsed,
//! so an unknown action is reported as such rather than as a bad payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ReaderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    GetSelectedText,
    /// Whole synthesized payload for the seekable player.
    #[serde(rename_all = "camelCase")]
    PlayAudioData { audio_data: Vec<u8> },
    /// One base64 clip for the queued player.
    #[serde(rename_all = "camelCase")]
    PlayAudio {
        audio_data: String,
        #[serde(default)]
        is_last_chunk: bool,
    },
    TogglePlayPause,
    RestorePlayer,
    ShowLoading,
    HideLoading,
    ShowError { error: String },
}

impl Command {
    pub const ACTIONS: &'static [&'static str] = &[
        "getSelectedText",
        "playAudioData",
        "playAudio",
        "togglePlayPause",
        "restorePlayer",
        "showLoading",
        "hideLoading",
        "showError",
    ];

    pub fn action(&self) -> &'static str {
        match self {
            Command::GetSelectedText => "getSelectedText",
            Command::PlayAudioData { .. } => "playAudioData",
            Command::PlayAudio { .. } => "playAudio",
            Command::TogglePlayPause => "togglePlayPause",
            Command::RestorePlayer => "restorePlayer",
            Command::ShowLoading => "showLoading",
            Command::HideLoading => "hideLoading",
            Command::ShowError { .. } => "showError",
        }
    }

    /// Validate and parse a message envelope.
    pub fn from_json(value: Value) -> Result<Self, ReaderError> {
        let action = value
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ReaderError::InvalidPayload("missing 'action' field".into()))?;

        if !Self::ACTIONS.iter().any(|known| *known == action) {
            return Err(ReaderError::UnknownCommand(action.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ReaderError::InvalidPayload(e.to_string()))
    }

    pub fn parse(text: &str) -> Result<Self, ReaderError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ReaderError::InvalidPayload(e.to_string()))?;
        Self::from_json(value)
    }
}

/// Reply to a [`Command`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_playing(mut self, is_playing: bool) -> Self {
        self.is_playing = Some(is_playing);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
