use std::sync::Arc;

use crate::{DecodedAudio, PlaybackError};

/// Device output for the seekable engine.
///
/// One segment sounds at a time. `start` replaces whatever was sounding;
/// `set_rate` and `set_gain` retarget the live segment without restarting.
pub trait AudioOutput: Send {
    /// Begin sounding `audio` from `offset_secs` at `rate` and `gain`.
    fn start(
        &mut self,
        audio: Arc<DecodedAudio>,
        offset_secs: f64,
        rate: f32,
        gain: f32,
    ) -> Result<(), PlaybackError>;

    /// Halt the sounding segment, if any.
    fn stop(&mut self);

    fn set_rate(&mut self, rate: f32);

    fn set_gain(&mut self, gain: f32);
}

/// Output that discards audio. The timeline still runs off the clock.
#[derive(Debug, Default)]
pub struct NullOutput;

impl AudioOutput for NullOutput {
    fn start(
        &mut self,
        _audio: Arc<DecodedAudio>,
        offset_secs: f64,
        rate: f32,
        _gain: f32,
    ) -> Result<(), PlaybackError> {
        log::trace!("Null output: start at {offset_secs:.3}s, rate {rate}");
        Ok(())
    }

    fn stop(&mut self) {}

    fn set_rate(&mut self, _rate: f32) {}

    fn set_gain(&mut self, _gain: f32) {}
}

impl<O: AudioOutput + ?Sized> AudioOutput for Box<O> {
    fn start(
        &mut self,
        audio: Arc<DecodedAudio>,
        offset_secs: f64,
        rate: f32,
        gain: f32,
    ) -> Result<(), PlaybackError> {
        (**self).start(audio, offset_secs, rate, gain)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn set_rate(&mut self, rate: f32) {
        (**self).set_rate(rate)
    }

    fn set_gain(&mut self, gain: f32) {
        (**self).set_gain(gain)
    }
}
