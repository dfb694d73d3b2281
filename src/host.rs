//! Page-side message dispatcher.
//!
//! A [`ContentHost`] owns the seekable engine, the transport controller and
//! the queued player for one page and answers [`Command`]s sent by the
//! background side. All state sits behind one async mutex; decoding happens
//! outside it so a slow decode never blocks the controls.
//!
//! Every whole-buffer load takes a generation number. A close or a newer
//! load bumps the generation, and a decode that finishes under a stale
//! generation is discarded instead of being played.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_builder::Builder;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::background::{ContentChannel, DiagnosticSink, LogDiagnostics};
use crate::decode::decode_audio;
use crate::export::export_wav;
use crate::messages::{Command, Response};
use crate::playback::{
    AudioOutput, Clip, ClipSink, Clock, MonotonicClock, NullClipSink, NullOutput, PlaybackEngine,
    Progress, QueuedPlayer,
};
use crate::ui::{Gesture, PlayerView, RestoreOutcome, TransportController};
use crate::{DecodeError, ExportError, ReaderError};

/// Where the current text selection is read from.
pub trait SelectionSource: Send + Sync {
    fn selected_text(&self) -> String;
}

impl<F> SelectionSource for F
where
    F: Fn() -> String + Send + Sync,
{
    fn selected_text(&self) -> String {
        self()
    }
}

/// Timing knobs for the host.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct HostOptions {
    /// How often progress is pushed to the controls while playing.
    pub progress_interval: Duration,
    /// How long an error banner stays up.
    pub banner_timeout: Duration,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_millis(100),
            banner_timeout: Duration::from_secs(5),
        }
    }
}

struct HostState {
    engine: PlaybackEngine,
    controller: TransportController,
    queue: Option<QueuedPlayer>,
    generation: u64,
    banner_seq: u64,
    ticker: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ContentHost {
    state: Arc<Mutex<HostState>>,
    selection: Arc<dyn SelectionSource>,
    clip_sink: Arc<dyn ClipSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    options: HostOptions,
}

pub struct ContentHostBuilder {
    view: Box<dyn PlayerView>,
    selection: Arc<dyn SelectionSource>,
    output: Box<dyn AudioOutput>,
    clock: Arc<dyn Clock>,
    clip_sink: Arc<dyn ClipSink>,
    diagnostics: Arc<dyn DiagnosticSink>,
    options: HostOptions,
}

impl ContentHostBuilder {
    /// Device output for the seekable engine. Defaults to silence.
    pub fn output(mut self, output: impl AudioOutput + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Device sink for queued clips. Defaults to silence.
    pub fn clip_sink(mut self, clip_sink: Arc<dyn ClipSink>) -> Self {
        self.clip_sink = clip_sink;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn options(mut self, options: HostOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> ContentHost {
        let state = HostState {
            engine: PlaybackEngine::new(self.output, self.clock),
            controller: TransportController::new(self.view),
            queue: None,
            generation: 0,
            banner_seq: 0,
            ticker: None,
        };
        ContentHost {
            state: Arc::new(Mutex::new(state)),
            selection: self.selection,
            clip_sink: self.clip_sink,
            diagnostics: self.diagnostics,
            options: self.options,
        }
    }
}

impl ContentHost {
    pub fn builder(
        view: impl PlayerView + 'static,
        selection: impl SelectionSource + 'static,
    ) -> ContentHostBuilder {
        ContentHostBuilder {
            view: Box::new(view),
            selection: Arc::new(selection),
            output: Box::new(NullOutput),
            clock: Arc::new(MonotonicClock::new()),
            clip_sink: Arc::new(NullClipSink),
            diagnostics: Arc::new(LogDiagnostics),
            options: HostOptions::default(),
        }
    }

    /// Answer one command. Failures are logged, reported and turned into a
    /// failure response; they never escape as errors.
    pub async fn handle(&self, command: Command) -> Response {
        let action = command.action();
        log::debug!("Message received: {action}");
        match self.dispatch(command).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("Error handling {action}: {e}");
                self.diagnostics.report(&format!("{action}: {e}"));
                Response::failure(e)
            }
        }
    }

    /// Parse a raw message envelope and answer it.
    pub async fn handle_json(&self, message: Value) -> Response {
        match Command::from_json(message) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                log::warn!("Rejected message: {e}");
                Response::failure(e)
            }
        }
    }

    async fn dispatch(&self, command: Command) -> Result<Response, ReaderError> {
        match command {
            Command::GetSelectedText => {
                let text = self.selection.selected_text();
                Ok(Response::ok().with_text(text.trim()))
            }
            Command::PlayAudioData { audio_data } => {
                self.play_audio_data(audio_data).await?;
                Ok(Response::ok())
            }
            Command::PlayAudio {
                audio_data,
                is_last_chunk,
            } => {
                self.enqueue_clip(&audio_data, is_last_chunk).await?;
                Ok(Response::ok())
            }
            Command::TogglePlayPause => {
                let playing = self.toggle_play_pause().await?;
                Ok(Response::ok().with_playing(playing))
            }
            Command::RestorePlayer => {
                let outcome = self.restore_player().await;
                Ok(Response {
                    success: outcome.is_success(),
                    ..Default::default()
                }
                .with_message(outcome.message()))
            }
            Command::ShowLoading => {
                self.state.lock().await.controller.set_loading(true);
                Ok(Response::ok())
            }
            Command::HideLoading => {
                self.state.lock().await.controller.set_loading(false);
                Ok(Response::ok())
            }
            Command::ShowError { error } => {
                self.show_error(&error).await;
                Ok(Response::ok())
            }
        }
    }

    /// Decode a whole synthesized payload, load it and start playing.
    pub async fn play_audio_data(&self, bytes: Vec<u8>) -> Result<(), ReaderError> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            if let Some(queue) = &state.queue {
                queue.stop();
            }
            state.generation
        };

        let decoded = tokio::task::spawn_blocking(move || decode_audio(&bytes))
            .await
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        let audio = match decoded {
            Ok(audio) => audio,
            Err(e) => return Err(self.surface(e.into()).await),
        };

        let started = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                log::info!("Discarding decoded audio superseded while decoding");
                return Err(ReaderError::Superseded);
            }
            state.engine.load_decoded(audio);
            let progress = state.engine.progress();
            state.controller.show(&progress);
            let started = state.engine.play();
            let progress = state.engine.progress();
            state.controller.refresh(&progress);
            self.ensure_ticker(&mut state);
            started
        };
        match started {
            Ok(()) => Ok(()),
            Err(e) => Err(self.surface(e.into()).await),
        }
    }

    /// Queue one base64 clip behind whatever is already playing.
    pub async fn enqueue_clip(&self, encoded: &str, is_final: bool) -> Result<(), ReaderError> {
        use base64::Engine as _;
        let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.surface(DecodeError::from(e).into()).await),
        };

        let enqueued = {
            let mut state = self.state.lock().await;
            if state.engine.is_playing() {
                state.engine.pause();
            }
            let progress = state.engine.progress();
            state.controller.show(&progress);
            let sink = Arc::clone(&self.clip_sink);
            let queue = state.queue.get_or_insert_with(|| QueuedPlayer::spawn(sink));
            queue.enqueue(Clip::new(bytes, is_final))
        };
        match enqueued {
            Ok(()) => Ok(()),
            Err(e) => Err(self.surface(e.into()).await),
        }
    }

    pub async fn toggle_play_pause(&self) -> Result<bool, ReaderError> {
        let toggled = {
            let mut state = self.state.lock().await;
            if !state.engine.has_audio() {
                return Err(ReaderError::NoAudio);
            }
            let toggled = state.engine.toggle_play_pause();
            let progress = state.engine.progress();
            state.controller.refresh(&progress);
            self.ensure_ticker(&mut state);
            toggled
        };
        match toggled {
            Ok(playing) => Ok(playing),
            Err(e) => Err(self.surface(e.into()).await),
        }
    }

    pub async fn restore_player(&self) -> RestoreOutcome {
        let mut state = self.state.lock().await;
        let HostState {
            engine, controller, ..
        } = &mut *state;
        controller.restore(engine)
    }

    /// Apply a gesture from the controls.
    ///
    /// Close also stops the queued player. Download renders the export off
    /// the async runtime without holding the state lock.
    pub async fn gesture(&self, gesture: Gesture) -> Result<(), ReaderError> {
        let result = if gesture == Gesture::Download {
            self.download().await
        } else {
            let mut state = self.state.lock().await;
            if gesture == Gesture::Close {
                state.generation += 1;
                if let Some(queue) = &state.queue {
                    queue.stop();
                }
            }
            let HostState {
                engine, controller, ..
            } = &mut *state;
            let result = controller.handle(engine, gesture);
            self.ensure_ticker(&mut state);
            result
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                log::error!("Gesture {gesture:?} failed: {e}");
                self.diagnostics.report(&e.to_string());
                Err(self.surface(e).await)
            }
        }
    }

    async fn download(&self) -> Result<(), ReaderError> {
        let audio = self
            .state
            .lock()
            .await
            .engine
            .audio()
            .ok_or(ExportError::NothingLoaded)?;
        let bytes = tokio::task::spawn_blocking(move || export_wav(&audio))
            .await
            .map_err(|e| ExportError::Interrupted(e.to_string()))??;
        self.state.lock().await.controller.offer_download(bytes);
        Ok(())
    }

    /// Show `error` in a banner and hand it back.
    async fn surface(&self, error: ReaderError) -> ReaderError {
        self.show_error(&format!("Error: {error}")).await;
        error
    }

    /// Advance the timeline once and push it to the controls.
    pub async fn poll_progress(&self) -> Progress {
        let mut state = self.state.lock().await;
        let progress = state.engine.tick();
        state.controller.refresh(&progress);
        progress
    }

    pub async fn progress(&self) -> Progress {
        self.state.lock().await.engine.progress()
    }

    pub async fn is_player_visible(&self) -> bool {
        self.state.lock().await.controller.is_attached()
    }

    /// Show an error banner that dismisses itself after the configured timeout.
    pub async fn show_error(&self, message: &str) {
        let seq = {
            let mut state = self.state.lock().await;
            state.controller.set_loading(false);
            state.controller.show_banner(message);
            state.banner_seq += 1;
            state.banner_seq
        };

        let state = Arc::clone(&self.state);
        let timeout = self.options.banner_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut state = state.lock().await;
            if state.banner_seq == seq {
                state.controller.dismiss_banner();
            }
        });
    }

    /// Tear down the session: stop all audio, release the buffer and remove
    /// the controls.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        if let Some(ticker) = state.ticker.take() {
            ticker.abort();
        }
        if let Some(queue) = state.queue.take() {
            queue.stop();
        }
        state.engine.close();
        state.controller.hide();
        log::info!("Player session closed");
    }

    fn ensure_ticker(&self, state: &mut HostState) {
        if !state.engine.is_playing() {
            return;
        }
        if state.ticker.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let shared = Arc::clone(&self.state);
        let period = self.options.progress_interval;
        state.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut state = shared.lock().await;
                let progress = state.engine.tick();
                state.controller.refresh(&progress);
                if !progress.is_playing() {
                    // Cleared under the lock so the next play spawns a fresh ticker.
                    state.ticker = None;
                    break;
                }
            }
        }));
    }
}

#[async_trait]
impl ContentChannel for ContentHost {
    async fn send(&self, command: Command) -> Result<Response, ReaderError> {
        Ok(self.handle(command).await)
    }
}
