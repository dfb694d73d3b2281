//! Decoding of synthesized audio into PCM.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::{DecodeError, DecodedAudio};

/// Decode an encoded audio payload.
///
/// RIFF/WAVE payloads go through `hound`; everything else is probed by
/// symphonia (mp3, ogg/vorbis, flac).
pub fn decode_audio(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let audio = if is_wav(bytes) {
        decode_wav(bytes)?
    } else {
        decode_compressed(bytes.to_vec())?
    };

    if audio.frames() == 0 {
        return Err(DecodeError::Malformed("stream contains no audio frames".into()));
    }

    log::debug!(
        "Decoded {:.2}s of audio ({} ch @ {} Hz)",
        audio.duration_secs(),
        audio.channels,
        audio.sample_rate
    );
    Ok(audio)
}

/// Decode a base64 payload as sent by the streamed delivery path.
pub fn decode_base64_audio(encoded: &str) -> Result<DecodedAudio, DecodeError> {
    use base64::Engine;

    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    decode_audio(&bytes)
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / i8::MAX as f32))
                .collect::<Result<_, _>>()?,
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<_, _>>()?,
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_607.0))
                .collect::<Result<_, _>>()?,
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                .collect::<Result<_, _>>()?,
            bits => {
                return Err(DecodeError::Malformed(format!(
                    "unsupported WAV bit depth: {bits}"
                )));
            }
        },
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    Ok(DecodedAudio::new(samples, spec.channels, spec.sample_rate))
}

fn decode_compressed(bytes: Vec<u8>) -> Result<DecodedAudio, DecodeError> {
    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(bytes)),
        MediaSourceStreamOptions::default(),
    );

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::Malformed("no audio track found".into()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let mut sample_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                channels.get_or_insert(spec.channels.count() as u16);
                let sb = sample_buf
                    .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
                sb.copy_interleaved_ref(decoded);
                samples.extend_from_slice(sb.samples());
            }
            Err(SymphoniaError::IoError(_)) | Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| DecodeError::Malformed("unknown sample rate".into()))?;
    Ok(DecodedAudio::new(samples, channels.unwrap_or(1), sample_rate))
}
