//! User settings and the key-value store they are read from.
//!
//! Settings are read fresh on every invocation; nothing is cached between
//! requests, so a key saved from the settings page applies to the next read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::chunking::ChunkBounds;
use crate::ConfigError;

pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_MODEL: &str = "tts-1";
pub const DEFAULT_MAX_CHUNK_LENGTH: usize = 4000;
pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 100;

/// How synthesized audio reaches the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryMode {
    /// Whole selection in one request, played through the seekable engine.
    #[default]
    Seekable,
    /// Selection split into chunks, played back to back as they arrive.
    Streamed,
}

/// Settings consulted each time text is read aloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(default, setter(into))]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// API key for the speech service. Required before synthesis.
    #[builder(setter(into, strip_option))]
    pub api_key: Option<String>,
    /// Voice name.
    pub voice: String,
    /// Speech model name.
    pub model: String,
    /// Upper bound for a chunk in streamed mode.
    pub max_chunk_length: usize,
    /// Lower bound for a chunk in streamed mode.
    pub min_chunk_length: usize,
    pub mode: DeliveryMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            voice: DEFAULT_VOICE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_chunk_length: DEFAULT_MAX_CHUNK_LENGTH,
            min_chunk_length: DEFAULT_MIN_CHUNK_LENGTH,
            mode: DeliveryMode::default(),
        }
    }
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Read settings from the store, falling back to defaults for absent keys.
    pub fn load(store: &dyn SettingsStore) -> Result<Self, ConfigError> {
        let mut object = Map::new();
        for key in Self::KEYS {
            if let Some(value) = store.get(key)? {
                object.insert((*key).to_string(), value);
            }
        }

        let settings: Settings = serde_json::from_value(Value::Object(object))?;
        settings.chunk_bounds()?;
        Ok(settings)
    }

    const KEYS: &'static [&'static str] = &[
        "apiKey",
        "voice",
        "model",
        "maxChunkLength",
        "minChunkLength",
        "mode",
    ];

    /// The API key, or the error shown to the user when none is configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey),
        }
    }

    pub fn chunk_bounds(&self) -> Result<ChunkBounds, ConfigError> {
        ChunkBounds::new(self.max_chunk_length, self.min_chunk_length)
    }
}

/// Persist the API key and voice chosen on the settings page.
///
/// The key is trimmed; an empty key is rejected and nothing is written.
pub fn save_credentials(
    store: &dyn SettingsStore,
    api_key: &str,
    voice: &str,
) -> Result<(), ConfigError> {
    let api_key = api_key.trim();
    if api_key.is_empty() {
        return Err(ConfigError::EmptyApiKey);
    }
    store.set("apiKey", Value::String(api_key.to_string()))?;
    store.set("voice", Value::String(voice.to_string()))?;
    log::info!("Settings saved (voice: {voice})");
    Ok(())
}

/// Key-value configuration store.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, ConfigError>;
    fn set(&self, key: &str, value: Value) -> Result<(), ConfigError>;
}

/// Store kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store backed by a single JSON object on disk.
///
/// A missing file reads as an empty store; `set` rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>, ConfigError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(ConfigError::InvalidValue {
                key: self.path.display().to_string(),
                reason: format!("expected a JSON object, found {other}"),
            }),
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, ConfigError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_object()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut object = self.read_object()?;
        object.insert(key.to_string(), value);
        let content = serde_json::to_string_pretty(&Value::Object(object))?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}
