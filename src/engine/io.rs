//! Recording I/O
//!
//! Reads recording bytes (local file, or HTTP with the `remote-sources`
//! feature) and decodes WAV data into planar f32 at the processing rate.
//! Rate conversion uses linear interpolation.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::engine::buffer::{AudioBuffer, ChannelLayout};
use crate::engine::source::AudioSource;
use crate::error::{ChirpError, Result};

/// Largest accepted ratio between output and recorded sample rate
const MAX_UPSAMPLE_RATIO: f64 = 16.0;

/// Longest recording decoded into memory
const MAX_DECODED_SECONDS: f64 = 3600.0;

/// Fetch the raw bytes behind a source
///
/// # Errors
/// * `SourceLoadFailed` - the file or URL cannot be read
pub fn read_source_bytes(source: &AudioSource) -> Result<Vec<u8>> {
    if source.is_remote() {
        return fetch_remote(source);
    }

    let path = Path::new(source.url());
    std::fs::read(path).map_err(|e| ChirpError::SourceLoadFailed {
        reason: format!("{}: {}", path.display(), e),
    })
}

#[cfg(feature = "remote-sources")]
fn fetch_remote(source: &AudioSource) -> Result<Vec<u8>> {
    let load_failed = |e: reqwest::Error| ChirpError::SourceLoadFailed {
        reason: format!("{}: {}", source.url(), e),
    };

    let response = reqwest::blocking::get(source.url())
        .and_then(|r| r.error_for_status())
        .map_err(load_failed)?;
    let bytes = response.bytes().map_err(load_failed)?;
    Ok(bytes.to_vec())
}

#[cfg(not(feature = "remote-sources"))]
fn fetch_remote(source: &AudioSource) -> Result<Vec<u8>> {
    Err(ChirpError::SourceLoadFailed {
        reason: format!(
            "{}: remote sources need the `remote-sources` feature",
            source.url()
        ),
    })
}

/// Decode WAV bytes and convert to `target_rate`
///
/// # Errors
/// * `SourceDecodeFailed` - not a WAV stream, more than two channels, a
///   zero or implausibly low sample rate, or truncated sample data
pub fn decode_wav(bytes: &[u8], target_rate: u32) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| ChirpError::SourceDecodeFailed {
        reason: format!("not a WAV stream: {}", e),
    })?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(ChirpError::SourceDecodeFailed {
            reason: "header declares a sample rate of 0 Hz".to_string(),
        });
    }
    let channels = spec.channels as usize;
    let layout = ChannelLayout::from_count(channels).ok_or_else(|| ChirpError::SourceDecodeFailed {
        reason: format!("{}-channel audio (only mono/stereo supported)", channels),
    })?;

    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)?;
    let mut buffer = AudioBuffer::from_interleaved(&interleaved, layout, spec.sample_rate)?;

    if target_rate != 0 && spec.sample_rate != target_rate {
        let ratio = target_rate as f64 / spec.sample_rate as f64;
        let target_len = (buffer.len() as f64 * ratio).round();
        if ratio > MAX_UPSAMPLE_RATIO || target_len > MAX_DECODED_SECONDS * target_rate as f64 {
            return Err(ChirpError::SourceDecodeFailed {
                reason: format!(
                    "{} Hz audio cannot be converted to {} Hz",
                    spec.sample_rate, target_rate
                ),
            });
        }
        buffer.samples = buffer
            .samples
            .iter()
            .map(|channel| resample_linear(channel, ratio))
            .collect();
        buffer.sample_rate = target_rate;
    }

    Ok(buffer)
}

/// Generate a mono sine tone
pub fn generate_test_tone(frequency: f32, duration_secs: f32, sample_rate: u32) -> AudioBuffer {
    let frames = (duration_secs * sample_rate as f32) as usize;
    let samples: Vec<f32> = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.5 * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect();

    AudioBuffer {
        samples: vec![samples],
        sample_rate,
    }
}

fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decode_failed = |e: hound::Error| ChirpError::SourceDecodeFailed {
        reason: format!("failed to read {}-bit samples: {}", bits_per_sample, e),
    };

    match (sample_format, bits_per_sample) {
        (SampleFormat::Float, _) => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_failed),
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .map(|s| s.map(|v| v as f32 / 128.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_failed),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_failed),
        // 24-bit stored as i32 in hound
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 8388608.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_failed),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / 2147483648.0))
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(decode_failed),
        (SampleFormat::Int, bits) => Err(ChirpError::SourceDecodeFailed {
            reason: format!("{}-bit integer audio is not supported", bits),
        }),
    }
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).round() as usize;

    (0..target_len)
        .map(|i| {
            let src_pos = i as f64 / ratio;
            let src_idx = src_pos.floor() as usize;
            let frac = (src_pos - src_idx as f64) as f32;

            if src_idx + 1 < source_len {
                samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
            } else {
                samples[source_len - 1]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames * channels as usize {
                writer.write_sample(((i % 100) as i16) * 100).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_mono_16_bit() {
        let buffer = decode_wav(&wav_bytes(1, 48000, 4800), 48000).unwrap();
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.len(), 4800);
        assert!((buffer.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let buffer = decode_wav(&wav_bytes(2, 24000, 2400), 48000).unwrap();
        assert_eq!(buffer.sample_rate, 48000);
        assert_eq!(buffer.len(), 4800);
        assert_eq!(buffer.channels(), 2);
    }

    /// Rewrite the sample-rate and byte-rate header fields of a mono 16-bit file
    fn with_declared_rate(mut bytes: Vec<u8>, rate: u32) -> Vec<u8> {
        bytes[24..28].copy_from_slice(&rate.to_le_bytes());
        bytes[28..32].copy_from_slice(&(rate * 2).to_le_bytes());
        bytes
    }

    #[test]
    fn test_zero_rate_header_is_decode_failure() {
        let bytes = with_declared_rate(wav_bytes(1, 8000, 100), 0);
        let err = decode_wav(&bytes, 48000).unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_DECODE_FAILED");
    }

    #[test]
    fn test_tiny_rate_header_is_not_inflated() {
        let bytes = with_declared_rate(wav_bytes(1, 8000, 100), 1);
        let err = decode_wav(&bytes, 48000).unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_DECODE_FAILED");
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        let err = decode_wav(b"definitely not a riff header", 48000).unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_DECODE_FAILED");
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let source = AudioSource::new("/nonexistent/recording.wav", "recording.wav");
        let err = read_source_bytes(&source).unwrap_err();
        assert_eq!(err.error_code(), "SOURCE_LOAD_FAILED");
    }

    #[test]
    fn test_generate_test_tone() {
        let tone = generate_test_tone(440.0, 0.5, 48000);
        assert_eq!(tone.len(), 24000);
        assert!(tone.peak() <= 0.5 + 1e-6);
    }
}
