use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use read_aloud::background::ReadAloud;
use read_aloud::config::{DeliveryMode, MemoryStore, SettingsStore};
use read_aloud::host::ContentHost;
use read_aloud::playback::{ClipSink, ManualClock, PlaybackState, Progress};
use read_aloud::ui::{Gesture, PlayerView};
use read_aloud::{DecodedAudio, PlaybackError, SpeechRequest, SynthesisError, SynthesisGateway};
use serde_json::{json, Value};

/// One second of silence per ten characters of input, as 16-bit mono WAV.
struct WavGateway;

#[async_trait]
impl SynthesisGateway for WavGateway {
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthesisError> {
        let frames = request.text.chars().count() * 800;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        Ok(cursor.into_inner())
    }
}

#[derive(Clone, Default)]
struct Screen {
    visible: Arc<Mutex<bool>>,
    banners: Arc<Mutex<Vec<String>>>,
    downloads: Arc<Mutex<Vec<(String, usize)>>>,
}

impl PlayerView for Screen {
    fn attach(&mut self, _progress: &Progress) {
        *self.visible.lock().unwrap() = true;
    }

    fn detach(&mut self) {
        *self.visible.lock().unwrap() = false;
    }

    fn render(&mut self, _progress: &Progress) {}

    fn set_loading(&mut self, _visible: bool) {}

    fn show_banner(&mut self, message: &str) {
        self.banners.lock().unwrap().push(message.to_string());
    }

    fn dismiss_banner(&mut self) {}

    fn offer_download(&mut self, file_name: &str, bytes: Vec<u8>) {
        self.downloads
            .lock()
            .unwrap()
            .push((file_name.to_string(), bytes.len()));
    }
}

#[derive(Default)]
struct CountingSink {
    frames: Mutex<Vec<usize>>,
}

#[async_trait]
impl ClipSink for CountingSink {
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        self.frames.lock().unwrap().push(audio.frames());
        Ok(())
    }

    fn stop(&self) {}
}

fn settings(values: Value) -> Arc<dyn SettingsStore> {
    let store = MemoryStore::new();
    for (key, value) in values.as_object().unwrap() {
        store.set(key, value.clone()).unwrap();
    }
    Arc::new(store)
}

#[tokio::test]
async fn selection_is_synthesized_and_controllable() {
    let screen = Screen::default();
    let clock = ManualClock::new();
    let host = ContentHost::builder(screen.clone(), || "Twenty characters!!!".to_string())
        .clock(Arc::new(clock.clone()))
        .build();
    let reader = ReadAloud::new(
        host.clone(),
        WavGateway,
        settings(json!({"apiKey": "sk-test"})),
    );

    reader.read_selection().await.unwrap();
    let progress = host.progress().await;
    assert_eq!(progress.state, PlaybackState::Playing);
    assert!((progress.duration - 2.0).abs() < 1e-6);
    assert!(*screen.visible.lock().unwrap());

    clock.advance(0.5);
    host.gesture(Gesture::SetRate(2.0)).await.unwrap();
    clock.advance(0.5);
    assert!((host.poll_progress().await.position - 1.5).abs() < 1e-9);

    clock.advance(5.0);
    let progress = host.poll_progress().await;
    assert_eq!(progress.state, PlaybackState::Paused);
    assert_eq!(progress.position, progress.duration);

    host.gesture(Gesture::Download).await.unwrap();
    let downloads = screen.downloads.lock().unwrap().clone();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].0, "tts_audio.wav");

    host.gesture(Gesture::Close).await.unwrap();
    assert!(!*screen.visible.lock().unwrap());
    let response = host.handle_json(json!({"action": "restorePlayer"})).await;
    assert!(response.success);
    assert!(*screen.visible.lock().unwrap());
    assert_eq!(host.progress().await.position, 0.0);
}

#[tokio::test]
async fn streamed_selection_plays_every_chunk() {
    let sink = Arc::new(CountingSink::default());
    let host = ContentHost::builder(Screen::default(), || {
        "one two three four five six seven eight nine ten".to_string()
    })
    .clip_sink(sink.clone())
    .build();
    let mode = serde_json::to_value(DeliveryMode::Streamed).unwrap();
    let reader = ReadAloud::new(
        host.clone(),
        WavGateway,
        settings(json!({
            "apiKey": "sk-test",
            "mode": mode,
            "maxChunkLength": 20,
            "minChunkLength": 5
        })),
    );

    reader.read_selection().await.unwrap();
    // Clips are played by a background task.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // "one two three four" / "five six seven eight" / "nine ten"
    let frames = sink.frames.lock().unwrap().clone();
    assert_eq!(frames, vec![14_400, 16_000, 6_400]);
}

#[tokio::test]
async fn missing_key_shows_settings_hint() {
    let screen = Screen::default();
    let host = ContentHost::builder(screen.clone(), || "Hello".to_string()).build();
    let reader = ReadAloud::new(host.clone(), WavGateway, settings(json!({})));

    assert!(reader.read_selection().await.is_err());
    assert_eq!(
        *screen.banners.lock().unwrap(),
        vec!["API key not found. Please configure it in the settings.".to_string()]
    );
    assert_eq!(host.progress().await.state, PlaybackState::Empty);
}
