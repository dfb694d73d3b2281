//! Seekable single-buffer playback.
//!
//! The timeline is bookkept rather than read back from the device:
//!
//! ```text
//! position = paused_at + (clock.now() - anchor) * rate      while playing
//! position = paused_at                                      otherwise
//! ```
//!
//! Every change that affects the elapsed computation (pause, seek, rate
//! change) first folds the elapsed time into `paused_at` with the rate that
//! was in effect, then re-anchors.

use std::sync::Arc;

use super::clock::{Clock, MonotonicClock};
use super::output::{AudioOutput, NullOutput};
use crate::decode::decode_audio;
use crate::{DecodeError, DecodedAudio, PlaybackError};

pub const MIN_PLAYBACK_RATE: f32 = 0.25;
pub const MAX_PLAYBACK_RATE: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No audio loaded.
    Empty,
    /// Audio loaded, not started since load or stop.
    Ready,
    Playing,
    Paused,
}

/// Snapshot of the timeline for presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub state: PlaybackState,
    pub position: f64,
    pub duration: f64,
    pub rate: f32,
    pub volume: f32,
    pub muted: bool,
}

impl Progress {
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Position as a fraction of the duration, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.position / self.duration).clamp(0.0, 1.0)
        }
    }
}

pub struct PlaybackEngine {
    audio: Option<Arc<DecodedAudio>>,
    paused_at: f64,
    /// Clock time the current segment started; `None` while not playing.
    anchor: Option<f64>,
    started: bool,
    rate: f32,
    volume: f32,
    last_audible_volume: f32,
    muted: bool,
    output: Box<dyn AudioOutput>,
    clock: Arc<dyn Clock>,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(NullOutput, Arc::new(MonotonicClock::new()))
    }
}

impl PlaybackEngine {
    pub fn new(output: impl AudioOutput + 'static, clock: Arc<dyn Clock>) -> Self {
        Self {
            audio: None,
            paused_at: 0.0,
            anchor: None,
            started: false,
            rate: 1.0,
            volume: 1.0,
            last_audible_volume: 1.0,
            muted: false,
            output: Box::new(output),
            clock,
        }
    }

    /// Decode `bytes` and make them the current session.
    ///
    /// On failure the previous session, if any, is left untouched.
    pub fn load_audio(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let audio = decode_audio(bytes)?;
        self.load_decoded(audio);
        Ok(())
    }

    /// Replace the current session with already decoded audio.
    pub fn load_decoded(&mut self, audio: DecodedAudio) {
        self.output.stop();
        log::info!("Loaded {:.2}s of audio", audio.duration_secs());
        self.audio = Some(Arc::new(audio));
        self.paused_at = 0.0;
        self.anchor = None;
        self.started = false;
    }

    pub fn state(&self) -> PlaybackState {
        match (&self.audio, self.anchor, self.started) {
            (None, _, _) => PlaybackState::Empty,
            (Some(_), Some(_), _) => PlaybackState::Playing,
            (Some(_), None, true) => PlaybackState::Paused,
            (Some(_), None, false) => PlaybackState::Ready,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// Shared handle to the decoded buffer, e.g. for export.
    pub fn audio(&self) -> Option<Arc<DecodedAudio>> {
        self.audio.clone()
    }

    pub fn duration(&self) -> f64 {
        self.audio.as_ref().map_or(0.0, |a| a.duration_secs())
    }

    /// Current position in seconds, including time elapsed in the live segment.
    pub fn position(&self) -> f64 {
        self.position_at(self.clock.now())
    }

    fn position_at(&self, now: f64) -> f64 {
        let elapsed = self
            .anchor
            .map_or(0.0, |anchor| (now - anchor).max(0.0) * self.rate as f64);
        (self.paused_at + elapsed).clamp(0.0, self.duration())
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn progress(&self) -> Progress {
        Progress {
            state: self.state(),
            position: self.position(),
            duration: self.duration(),
            rate: self.rate,
            volume: self.volume,
            muted: self.muted,
        }
    }

    /// Start or resume playback.
    ///
    /// A no-op without audio or while already playing. Playing from the very
    /// end of the buffer starts over from the beginning.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        if self.audio.is_none() {
            log::debug!("play() ignored: no audio loaded");
            return Ok(());
        }
        if self.is_playing() {
            return Ok(());
        }
        if self.paused_at >= self.duration() {
            self.paused_at = 0.0;
        }
        self.start_segment()
    }

    fn start_segment(&mut self) -> Result<(), PlaybackError> {
        let Some(audio) = self.audio.clone() else {
            return Ok(());
        };
        self.output.stop();
        self.output
            .start(audio, self.paused_at, self.rate, self.gain())
            .inspect_err(|e| log::error!("Failed to start playback: {e}"))?;
        self.anchor = Some(self.clock.now());
        self.started = true;
        log::debug!("Playing from {:.3}s at {}x", self.paused_at, self.rate);
        Ok(())
    }

    pub fn pause(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.output.stop();
        self.paused_at = self.position();
        self.anchor = None;
        log::debug!("Paused at {:.3}s", self.paused_at);
    }

    /// Pause if playing, otherwise play. Returns whether playback is running.
    pub fn toggle_play_pause(&mut self) -> Result<bool, PlaybackError> {
        if self.is_playing() {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(self.is_playing())
    }

    /// Move to `target` seconds, clamped to `[0, duration]`.
    ///
    /// A playing session keeps playing from the new position.
    pub fn seek(&mut self, target: f64) -> Result<(), PlaybackError> {
        if self.audio.is_none() {
            return Ok(());
        }
        let target = if target.is_nan() { 0.0 } else { target };
        let target = target.clamp(0.0, self.duration());
        if self.is_playing() {
            self.output.stop();
            self.anchor = None;
            self.paused_at = target;
            self.start_segment()
        } else {
            self.paused_at = target;
            Ok(())
        }
    }

    /// Seek relative to the live position.
    pub fn skip(&mut self, delta: f64) -> Result<(), PlaybackError> {
        if self.audio.is_none() {
            return Ok(());
        }
        self.seek(self.position() + delta)
    }

    /// Change the speed multiplier without restarting the segment.
    ///
    /// Returns the rate actually applied after clamping.
    pub fn set_playback_rate(&mut self, rate: f32) -> f32 {
        let rate = if rate.is_finite() {
            rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
        } else {
            1.0
        };
        if self.is_playing() {
            let now = self.clock.now();
            self.paused_at = self.position_at(now);
            self.anchor = Some(now);
            self.output.set_rate(rate);
        }
        self.rate = rate;
        rate
    }

    /// Set the volume in `[0, 1]`. A non-zero volume also unmutes.
    pub fn set_volume(&mut self, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.volume = volume;
        if volume > 0.0 {
            self.last_audible_volume = volume;
            self.muted = false;
        }
        self.output.set_gain(self.gain());
    }

    /// Mute, or unmute back to the remembered volume. Returns the new mute state.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        if !self.muted && self.volume == 0.0 {
            self.volume = self.last_audible_volume;
        }
        self.output.set_gain(self.gain());
        self.muted
    }

    fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.volume
        }
    }

    /// Polling step: detect the end of the buffer and report progress.
    ///
    /// Reaching the end pauses exactly at `duration`; the audio stays loaded.
    pub fn tick(&mut self) -> Progress {
        if self.is_playing() && self.position() >= self.duration() {
            self.output.stop();
            self.anchor = None;
            self.paused_at = self.duration();
            log::debug!("Reached end of audio at {:.3}s", self.paused_at);
        }
        self.progress()
    }

    /// Halt playback and rewind, keeping the decoded buffer.
    pub fn stop(&mut self) {
        self.output.stop();
        self.anchor = None;
        self.paused_at = 0.0;
        self.started = false;
    }

    /// Halt playback and release the decoded buffer.
    pub fn close(&mut self) {
        self.stop();
        if self.audio.take().is_some() {
            log::info!("Playback session closed");
        }
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.output.stop();
    }
}
