//! Offline rendering of the loaded audio to a downloadable WAV file.
//!
//! Export never touches the live playback state: it renders from the shared
//! decoded buffer at unity gain and native rate, frame by frame, into a new
//! buffer and encodes that.

use std::io::Cursor;

use crate::{DecodedAudio, ExportError};

/// File name offered for downloads.
pub const EXPORT_FILE_NAME: &str = "tts_audio.wav";

/// Frames rendered per block.
const RENDER_BLOCK_FRAMES: usize = 4096;

/// Render the whole buffer without the realtime clock.
///
/// The result has the source's channel count, sample rate and length
/// regardless of where playback currently is.
pub fn render_offline(audio: &DecodedAudio) -> DecodedAudio {
    let channels = audio.channels.max(1) as usize;
    let mut rendered = Vec::with_capacity(audio.frames() * channels);

    for block in audio.samples.chunks(RENDER_BLOCK_FRAMES * channels) {
        rendered.extend(block.iter().map(|s| s.clamp(-1.0, 1.0)));
    }

    // Drop a trailing partial frame so every channel has the same length.
    rendered.truncate(audio.frames() * channels);
    DecodedAudio::new(rendered, audio.channels, audio.sample_rate)
}

/// Render and encode as 16-bit PCM WAV.
pub fn export_wav(audio: &DecodedAudio) -> Result<Vec<u8>, ExportError> {
    let rendered = render_offline(audio);
    let spec = hound::WavSpec {
        channels: rendered.channels,
        sample_rate: rendered.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + rendered.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &rendered.samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()?;
    }

    log::info!(
        "Exported {:.2}s of audio to WAV ({} bytes)",
        rendered.duration_secs(),
        cursor.get_ref().len()
    );
    Ok(cursor.into_inner())
}

fn to_i16(sample: f32) -> i16 {
    if sample < 0.0 {
        (sample * 32768.0) as i16
    } else {
        (sample * 32767.0) as i16
    }
}
