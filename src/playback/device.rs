//! rodio-backed outputs for both playback modes.
//!
//! The caller keeps the [`OutputStream`] alive for as long as audio should
//! be heard; the outputs only hold sinks connected to its mixer.

use std::sync::Arc;

use async_trait::async_trait;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::output::AudioOutput;
use super::queue::ClipSink;
use crate::{DecodedAudio, PlaybackError};

/// Open the default output device.
pub fn open_default_stream() -> Result<OutputStream, PlaybackError> {
    OutputStreamBuilder::open_default_stream()
        .map_err(|e| PlaybackError::OutputUnavailable(e.to_string()))
}

/// Device output for the seekable engine.
pub struct RodioOutput {
    sink: Sink,
}

impl RodioOutput {
    pub fn new(stream: &OutputStream) -> Self {
        Self {
            sink: Sink::connect_new(stream.mixer()),
        }
    }
}

impl AudioOutput for RodioOutput {
    fn start(
        &mut self,
        audio: Arc<DecodedAudio>,
        offset_secs: f64,
        rate: f32,
        gain: f32,
    ) -> Result<(), PlaybackError> {
        self.sink.clear();
        let samples = audio.samples_from(offset_secs).to_vec();
        self.sink
            .append(SamplesBuffer::new(audio.channels, audio.sample_rate, samples));
        self.sink.set_speed(rate);
        self.sink.set_volume(gain);
        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.sink.clear();
    }

    fn set_rate(&mut self, rate: f32) {
        self.sink.set_speed(rate);
    }

    fn set_gain(&mut self, gain: f32) {
        self.sink.set_volume(gain);
    }
}

/// Device sink for the queued player.
pub struct RodioClipSink {
    sink: Arc<Sink>,
}

impl RodioClipSink {
    pub fn new(stream: &OutputStream) -> Self {
        Self {
            sink: Arc::new(Sink::connect_new(stream.mixer())),
        }
    }
}

#[async_trait]
impl ClipSink for RodioClipSink {
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
        self.sink.append(SamplesBuffer::new(
            audio.channels,
            audio.sample_rate,
            audio.samples,
        ));
        self.sink.play();

        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.sleep_until_end())
            .await
            .map_err(|e| PlaybackError::Output(e.to_string()))
    }

    fn stop(&self) {
        self.sink.clear();
    }
}
