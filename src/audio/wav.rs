//! WAV container encoding and decoding for synthesized clips.

use crate::audio::{PcmAudio, PcmFormat};
use crate::error::{PodsynthError, Result};
use std::io::{Cursor, Read};

/// Wrap PCM16 samples in a self-describing WAV container.
pub fn encode_wav(samples: &[i16], format: PcmFormat) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).map_err(|e| PodsynthError::AudioFormat {
            message: format!("Failed to start WAV container: {}", e),
        })?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| PodsynthError::AudioFormat {
                message: format!("Failed to write WAV sample: {}", e),
            })?;
    }
    writer.finalize().map_err(|e| PodsynthError::AudioFormat {
        message: format!("Failed to finalize WAV container: {}", e),
    })?;

    Ok(cursor.into_inner())
}

/// Wrap a whole PCM buffer in a WAV container.
pub fn encode_pcm(audio: &PcmAudio) -> Result<Vec<u8>> {
    encode_wav(&audio.samples(), audio.format)
}

/// Whether the bytes start with a RIFF/WAVE header.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

/// Decode a 16-bit integer WAV container into mono PCM.
///
/// Stereo input is downmixed by averaging the channels.
pub fn decode_wav(reader: impl Read) -> Result<PcmAudio> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| PodsynthError::AudioFormat {
        message: format!("Failed to parse WAV data: {}", e),
    })?;

    let spec = wav_reader.spec();
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(PodsynthError::AudioFormat {
            message: format!(
                "Unsupported WAV layout: {:?} {}-bit",
                spec.sample_format, spec.bits_per_sample
            ),
        });
    }

    let raw_samples: Vec<i16> = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PodsynthError::AudioFormat {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    let mono_samples = match spec.channels {
        1 => raw_samples,
        2 => raw_samples
            .chunks_exact(2)
            .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
            .collect(),
        n => {
            return Err(PodsynthError::AudioFormat {
                message: format!("Unsupported channel count: {}", n),
            });
        }
    };

    Ok(PcmAudio::from_samples(&mono_samples, spec.sample_rate))
}

/// Interpret provider output that is either a WAV container or raw PCM16.
pub fn decode_provider_audio(bytes: Vec<u8>, sample_rate: u32) -> Result<PcmAudio> {
    if looks_like_wav(&bytes) {
        decode_wav(Cursor::new(bytes))
    } else {
        Ok(PcmAudio::new(bytes, sample_rate))
    }
}
