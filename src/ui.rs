//! Transport controls.
//!
//! The controller is presentation only: it turns user gestures into
//! [`PlaybackEngine`] calls and pushes engine snapshots to a [`PlayerView`].
//! Whether controls are attached is tracked explicitly here; rendering into
//! a detached view never recreates it.

use crate::export::{export_wav, EXPORT_FILE_NAME};
use crate::playback::{PlaybackEngine, Progress};
use crate::{ExportError, ReaderError};

/// Seconds moved by the skip buttons.
pub const SKIP_SECONDS: f64 = 5.0;

/// Choices offered by the speed selector.
pub const SPEED_CHOICES: [f32; 7] = [0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0];

/// Presentation surface for the player.
pub trait PlayerView: Send {
    /// Build the controls showing `progress`.
    fn attach(&mut self, progress: &Progress);
    /// Remove the controls.
    fn detach(&mut self);
    /// Update progress bar, time display and play/pause icon.
    fn render(&mut self, progress: &Progress);
    fn set_loading(&mut self, visible: bool);
    fn show_banner(&mut self, message: &str);
    fn dismiss_banner(&mut self);
    /// Hand an exported file to the user.
    fn offer_download(&mut self, file_name: &str, bytes: Vec<u8>);
}

impl<V: PlayerView + ?Sized> PlayerView for Box<V> {
    fn attach(&mut self, progress: &Progress) {
        (**self).attach(progress)
    }

    fn detach(&mut self) {
        (**self).detach()
    }

    fn render(&mut self, progress: &Progress) {
        (**self).render(progress)
    }

    fn set_loading(&mut self, visible: bool) {
        (**self).set_loading(visible)
    }

    fn show_banner(&mut self, message: &str) {
        (**self).show_banner(message)
    }

    fn dismiss_banner(&mut self) {
        (**self).dismiss_banner()
    }

    fn offer_download(&mut self, file_name: &str, bytes: Vec<u8>) {
        (**self).offer_download(file_name, bytes)
    }
}

/// User input on the player controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Click on the progress bar at a fraction of its width.
    Scrub(f64),
    SkipBack,
    SkipForward,
    TogglePlayPause,
    SetRate(f32),
    SetVolume(f32),
    ToggleMute,
    Download,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    AlreadyVisible,
    Restored,
    NothingToRestore,
}

impl RestoreOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RestoreOutcome::NothingToRestore)
    }

    pub fn message(&self) -> &'static str {
        match self {
            RestoreOutcome::AlreadyVisible => "Player is already visible",
            RestoreOutcome::Restored => "Player restored",
            RestoreOutcome::NothingToRestore => "No audio available to restore",
        }
    }
}

pub struct TransportController {
    view: Box<dyn PlayerView>,
    attached: bool,
}

impl TransportController {
    pub fn new(view: impl PlayerView + 'static) -> Self {
        Self {
            view: Box::new(view),
            attached: false,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Attach the controls, or refresh them if they already are.
    pub fn show(&mut self, progress: &Progress) {
        if self.attached {
            self.view.render(progress);
        } else {
            self.view.attach(progress);
            self.attached = true;
        }
    }

    pub fn hide(&mut self) {
        if self.attached {
            self.view.detach();
            self.attached = false;
        }
    }

    /// Push a snapshot to attached controls; ignored while detached.
    pub fn refresh(&mut self, progress: &Progress) {
        if self.attached {
            self.view.render(progress);
        }
    }

    /// Rebuild detached controls for a session that still has audio.
    ///
    /// Playback is left as it is; after a close the engine has already been
    /// rewound, so the restored player shows the start, paused.
    pub fn restore(&mut self, engine: &PlaybackEngine) -> RestoreOutcome {
        if !engine.has_audio() {
            return RestoreOutcome::NothingToRestore;
        }
        let progress = engine.progress();
        if self.attached {
            self.view.render(&progress);
            return RestoreOutcome::AlreadyVisible;
        }
        log::info!("Restoring player at {}", format_time(progress.position));
        self.view.attach(&progress);
        self.attached = true;
        RestoreOutcome::Restored
    }

    /// Apply a gesture to the engine and reflect the result.
    pub fn handle(
        &mut self,
        engine: &mut PlaybackEngine,
        gesture: Gesture,
    ) -> Result<(), ReaderError> {
        log::debug!("Gesture: {gesture:?}");
        match gesture {
            Gesture::Scrub(fraction) => {
                let fraction = if fraction.is_nan() { 0.0 } else { fraction };
                engine.seek(fraction.clamp(0.0, 1.0) * engine.duration())?;
            }
            Gesture::SkipBack => engine.skip(-SKIP_SECONDS)?,
            Gesture::SkipForward => engine.skip(SKIP_SECONDS)?,
            Gesture::TogglePlayPause => {
                engine.toggle_play_pause()?;
            }
            Gesture::SetRate(rate) => {
                engine.set_playback_rate(rate);
            }
            Gesture::SetVolume(volume) => engine.set_volume(volume),
            Gesture::ToggleMute => {
                engine.toggle_mute();
            }
            Gesture::Download => {
                let audio = engine.audio().ok_or(ExportError::NothingLoaded)?;
                let bytes = export_wav(&audio)?;
                self.offer_download(bytes);
            }
            Gesture::Close => {
                engine.stop();
                self.hide();
                return Ok(());
            }
        }
        self.refresh(&engine.progress());
        Ok(())
    }

    /// Hand an exported WAV file to the user.
    pub fn offer_download(&mut self, bytes: Vec<u8>) {
        self.view.offer_download(EXPORT_FILE_NAME, bytes);
    }

    pub fn set_loading(&mut self, visible: bool) {
        self.view.set_loading(visible);
    }

    pub fn show_banner(&mut self, message: &str) {
        self.view.show_banner(message);
    }

    pub fn dismiss_banner(&mut self) {
        self.view.dismiss_banner();
    }
}

/// Format seconds as `m:ss`.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// View that logs what it would display.
#[derive(Debug, Default)]
pub struct LogView;

impl PlayerView for LogView {
    fn attach(&mut self, progress: &Progress) {
        log::info!(
            "Player shown ({} / {})",
            format_time(progress.position),
            format_time(progress.duration)
        );
    }

    fn detach(&mut self) {
        log::info!("Player closed");
    }

    fn render(&mut self, progress: &Progress) {
        log::debug!(
            "{} {:>5.1}% {} / {} {}x{}",
            if progress.is_playing() { "❚❚" } else { "▶" },
            progress.fraction() * 100.0,
            format_time(progress.position),
            format_time(progress.duration),
            progress.rate,
            if progress.muted { " (muted)" } else { "" }
        );
    }

    fn set_loading(&mut self, visible: bool) {
        if visible {
            log::info!("Loading…");
        }
    }

    fn show_banner(&mut self, message: &str) {
        log::warn!("{message}");
    }

    fn dismiss_banner(&mut self) {}

    fn offer_download(&mut self, file_name: &str, bytes: Vec<u8>) {
        log::info!("Download ready: {file_name} ({} bytes)", bytes.len());
    }
}
