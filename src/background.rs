//! Background orchestration: read the selection, synthesize it and hand the
//! audio to the page.
//!
//! In seekable mode the whole selection is synthesized in one request and
//! sent as a single payload. In streamed mode the selection is split into
//! chunks that are synthesized one at a time and sent as they arrive, each
//! tagged with whether it is the last. The first failure aborts the rest.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;

use crate::chunking::chunk_text;
use crate::config::{DeliveryMode, Settings, SettingsStore};
use crate::messages::{Command, Response};
use crate::{ReaderError, SpeechRequest, SynthesisGateway};

/// Out-of-band error reporting, independent of what the user is shown.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, message: &str);
}

/// Reports through the `log` facade.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticSink for LogDiagnostics {
    fn report(&self, message: &str) {
        log::error!("{message}");
    }
}

/// Request/response link to the page hosting the player.
#[async_trait]
pub trait ContentChannel: Send + Sync {
    async fn send(&self, command: Command) -> Result<Response, ReaderError>;
}

#[async_trait]
impl<C: ContentChannel + ?Sized> ContentChannel for Arc<C> {
    async fn send(&self, command: Command) -> Result<Response, ReaderError> {
        (**self).send(command).await
    }
}

pub struct ReadAloud<C, G> {
    channel: C,
    gateway: G,
    store: Arc<dyn SettingsStore>,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl<C, G> ReadAloud<C, G>
where
    C: ContentChannel,
    G: SynthesisGateway,
{
    pub fn new(channel: C, gateway: G, store: Arc<dyn SettingsStore>) -> Self {
        Self {
            channel,
            gateway,
            store,
            diagnostics: Arc::new(LogDiagnostics),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Read whatever is selected on the page aloud.
    pub async fn read_selection(&self) -> Result<(), ReaderError> {
        let result = match self.selected_text().await {
            Ok(text) => self.deliver(&text).await,
            Err(e) => Err(e),
        };
        self.settle(result).await
    }

    /// Read `text` aloud as if it had been selected.
    pub async fn read_text(&self, text: &str) -> Result<(), ReaderError> {
        let result = self.deliver(text).await;
        self.settle(result).await
    }

    async fn selected_text(&self) -> Result<String, ReaderError> {
        let response = self.channel.send(Command::GetSelectedText).await?;
        Ok(response.text.unwrap_or_default())
    }

    async fn deliver(&self, text: &str) -> Result<(), ReaderError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ReaderError::NoSelection);
        }

        let settings = Settings::load(self.store.as_ref())?;
        let api_key = settings.require_api_key()?.to_string();

        self.channel.send(Command::ShowLoading).await?;
        let result = match settings.mode {
            DeliveryMode::Seekable => self.deliver_whole(&settings, &api_key, text).await,
            DeliveryMode::Streamed => self.deliver_chunks(&settings, &api_key, text).await,
        };
        self.channel.send(Command::HideLoading).await?;
        result
    }

    async fn deliver_whole(
        &self,
        settings: &Settings,
        api_key: &str,
        text: &str,
    ) -> Result<(), ReaderError> {
        log::info!("Synthesizing {} chars in one request", text.chars().count());
        let audio = self
            .gateway
            .synthesize(&request(settings, api_key, text))
            .await?;
        log::debug!("Received {} bytes of audio", audio.len());

        let response = self
            .channel
            .send(Command::PlayAudioData { audio_data: audio })
            .await?;
        accepted(response)
    }

    async fn deliver_chunks(
        &self,
        settings: &Settings,
        api_key: &str,
        text: &str,
    ) -> Result<(), ReaderError> {
        let chunks = chunk_text(text, settings.chunk_bounds()?);
        let total = chunks.len();
        log::info!("Synthesizing {total} chunks");

        for (index, chunk) in chunks.iter().enumerate() {
            log::debug!(
                "Synthesizing chunk {}/{total} ({} chars)",
                index + 1,
                chunk.chars().count()
            );
            let audio = self
                .gateway
                .synthesize(&request(settings, api_key, chunk))
                .await?;
            let response = self
                .channel
                .send(Command::PlayAudio {
                    audio_data: base64::engine::general_purpose::STANDARD.encode(&audio),
                    is_last_chunk: index + 1 == total,
                })
                .await?;
            accepted(response)?;
        }
        Ok(())
    }

    /// Surface a failure to the user and to diagnostics.
    async fn settle(&self, result: Result<(), ReaderError>) -> Result<(), ReaderError> {
        let Err(error) = result else {
            return Ok(());
        };
        log::error!("Read aloud failed: {error}");
        self.diagnostics.report(&error.to_string());

        let banner = match &error {
            // The page already showed its own failure.
            ReaderError::Rejected(_) => None,
            ReaderError::NoSelection | ReaderError::Config(_) => Some(error.to_string()),
            other => Some(format!("Error: {other}")),
        };
        if let Some(banner) = banner {
            if let Err(e) = self.channel.send(Command::ShowError { error: banner }).await {
                log::warn!("Could not show error on the page: {e}");
            }
        }
        Err(error)
    }
}

fn request(settings: &Settings, api_key: &str, text: &str) -> SpeechRequest {
    SpeechRequest {
        text: text.to_string(),
        voice: settings.voice.clone(),
        model: settings.model.clone(),
        api_key: api_key.to_string(),
    }
}

fn accepted(response: Response) -> Result<(), ReaderError> {
    if response.success {
        Ok(())
    } else {
        Err(ReaderError::Rejected(
            response.error.unwrap_or_else(|| "unknown error".into()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::SynthesisError;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeChannel {
        selection: String,
        sent: Mutex<Vec<Command>>,
        reject_audio: bool,
    }

    impl FakeChannel {
        fn selecting(text: &str) -> Self {
            Self {
                selection: text.into(),
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContentChannel for FakeChannel {
        async fn send(&self, command: Command) -> Result<Response, ReaderError> {
            let response = match &command {
                Command::GetSelectedText => Response::ok().with_text(self.selection.clone()),
                Command::PlayAudioData { .. } | Command::PlayAudio { .. } if self.reject_audio => {
                    Response::failure("Unsupported or malformed audio: bad")
                }
                _ => Response::ok(),
            };
            self.sent.lock().unwrap().push(command);
            Ok(response)
        }
    }

    /// Echoes the input text as the audio bytes; fails on a chosen call.
    #[derive(Default)]
    struct FakeGateway {
        requests: Mutex<Vec<SpeechRequest>>,
        fail_on_call: Option<usize>,
    }

    #[async_trait]
    impl SynthesisGateway for FakeGateway {
        async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            if self.fail_on_call == Some(requests.len()) {
                return Err(SynthesisError::Service {
                    status: 500,
                    body: "overloaded".into(),
                });
            }
            Ok(request.text.as_bytes().to_vec())
        }
    }

    fn store(settings: serde_json::Value) -> Arc<dyn SettingsStore> {
        let store = MemoryStore::new();
        for (key, value) in settings.as_object().unwrap() {
            store.set(key, value.clone()).unwrap();
        }
        Arc::new(store)
    }

    fn banners(commands: &[Command]) -> Vec<String> {
        commands
            .iter()
            .filter_map(|c| match c {
                Command::ShowError { error } => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn seekable_mode_sends_one_payload() {
        let reader = ReadAloud::new(
            FakeChannel::selecting("  Hello there.  "),
            FakeGateway::default(),
            store(json!({"apiKey": "sk-test", "voice": "nova"})),
        );
        reader.read_selection().await.unwrap();

        assert_eq!(
            reader.channel.sent(),
            vec![
                Command::GetSelectedText,
                Command::ShowLoading,
                Command::PlayAudioData {
                    audio_data: b"Hello there.".to_vec()
                },
                Command::HideLoading,
            ]
        );
        let requests = reader.gateway.requests.lock().unwrap();
        assert_eq!(requests[0].voice, "nova");
        assert_eq!(requests[0].model, "tts-1");
        assert_eq!(requests[0].api_key, "sk-test");
    }

    #[tokio::test]
    async fn streamed_mode_sends_chunks_in_order() {
        let reader = ReadAloud::new(
            FakeChannel::default(),
            FakeGateway::default(),
            store(json!({
                "apiKey": "sk-test",
                "mode": "streamed",
                "maxChunkLength": 10,
                "minChunkLength": 1
            })),
        );
        reader
            .read_text("the quick brown fox jumps")
            .await
            .unwrap();

        let clips: Vec<(Vec<u8>, bool)> = reader
            .channel
            .sent()
            .into_iter()
            .filter_map(|c| match c {
                Command::PlayAudio {
                    audio_data,
                    is_last_chunk,
                } => Some((
                    base64::engine::general_purpose::STANDARD
                        .decode(audio_data)
                        .unwrap(),
                    is_last_chunk,
                )),
                _ => None,
            })
            .collect();
        assert_eq!(
            clips,
            vec![
                (b"the quick".to_vec(), false),
                (b"brown fox".to_vec(), false),
                (b"jumps".to_vec(), true),
            ]
        );
    }

    #[tokio::test]
    async fn streamed_failure_aborts_remaining_chunks() {
        let reader = ReadAloud::new(
            FakeChannel::default(),
            FakeGateway {
                fail_on_call: Some(2),
                ..Default::default()
            },
            store(json!({
                "apiKey": "sk-test",
                "mode": "streamed",
                "maxChunkLength": 10,
                "minChunkLength": 1
            })),
        );
        let err = reader
            .read_text("the quick brown fox jumps")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReaderError::Synthesis(SynthesisError::Service { status: 500, .. })
        ));

        assert_eq!(reader.gateway.requests.lock().unwrap().len(), 2);
        let sent = reader.channel.sent();
        let clips = sent
            .iter()
            .filter(|c| matches!(c, Command::PlayAudio { .. }))
            .count();
        assert_eq!(clips, 1);
        assert_eq!(
            banners(&sent),
            vec!["Error: HTTP error! status: 500, message: overloaded".to_string()]
        );
        assert!(sent.contains(&Command::HideLoading));
    }

    #[tokio::test]
    async fn empty_selection_is_reported_without_synthesis() {
        let reader = ReadAloud::new(
            FakeChannel::selecting("   "),
            FakeGateway::default(),
            store(json!({"apiKey": "sk-test"})),
        );
        assert!(matches!(
            reader.read_selection().await,
            Err(ReaderError::NoSelection)
        ));
        assert!(reader.gateway.requests.lock().unwrap().is_empty());
        assert_eq!(banners(&reader.channel.sent()), vec!["No text selected"]);
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_verbatim() {
        let reader = ReadAloud::new(
            FakeChannel::selecting("Hello"),
            FakeGateway::default(),
            store(json!({})),
        );
        assert!(reader.read_selection().await.is_err());
        assert!(reader.gateway.requests.lock().unwrap().is_empty());
        assert_eq!(
            banners(&reader.channel.sent()),
            vec!["API key not found. Please configure it in the settings."]
        );
    }

    #[tokio::test]
    async fn page_rejection_is_not_shown_twice() {
        struct Counting(Mutex<Vec<String>>);
        impl DiagnosticSink for Counting {
            fn report(&self, message: &str) {
                self.0.lock().unwrap().push(message.to_string());
            }
        }

        let diagnostics = Arc::new(Counting(Mutex::new(Vec::new())));
        let reader = ReadAloud::new(
            FakeChannel {
                selection: "Hello".into(),
                reject_audio: true,
                ..Default::default()
            },
            FakeGateway::default(),
            store(json!({"apiKey": "sk-test"})),
        )
        .with_diagnostics(diagnostics.clone());

        assert!(matches!(
            reader.read_selection().await,
            Err(ReaderError::Rejected(_))
        ));
        assert!(banners(&reader.channel.sent()).is_empty());
        assert_eq!(diagnostics.0.lock().unwrap().len(), 1);
    }
}
