//! Conversion between base64 PCM16 payloads and float sample buffers

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::{Error, Result};

/// Sample rate of speech returned by the content service
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// Channel count of speech returned by the content service
pub const TTS_CHANNELS: u16 = 1;

/// Fixed layout of a PCM16 payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeechFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for SpeechFormat {
    fn default() -> Self {
        Self {
            sample_rate: TTS_SAMPLE_RATE,
            channels: TTS_CHANNELS,
        }
    }
}

/// De-interleaved float samples, one vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl SampleBuffer {
    /// Build a mono buffer from samples already in `[-1.0, 1.0]`
    #[must_use]
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel)
    #[must_use]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Samples of one channel
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Sample for an output channel, reusing the last source channel when the
    /// output has more channels than the buffer
    #[must_use]
    pub fn sample_for(&self, output_channel: usize, frame: usize) -> f32 {
        let Some(last) = self.channels.len().checked_sub(1) else {
            return 0.0;
        };
        self.channels[output_channel.min(last)]
            .get(frame)
            .copied()
            .unwrap_or(0.0)
    }

    /// Playback length
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }
}

/// Decode a standard base64 payload
///
/// # Errors
///
/// Returns `Error::Decode` on malformed input
pub fn decode(payload: &str) -> Result<Vec<u8>> {
    Ok(STANDARD.decode(payload.trim())?)
}

/// Interpret little-endian signed 16-bit PCM as a float sample buffer
///
/// Samples are normalized by 32768 and de-interleaved by channel. A trailing
/// partial frame is dropped.
///
/// # Errors
///
/// Returns `Error::Format` for an odd byte count or a zero channel count
pub fn pcm16_to_sample_buffer(bytes: &[u8], format: SpeechFormat) -> Result<SampleBuffer> {
    if bytes.len() % 2 != 0 {
        return Err(Error::Format(format!(
            "odd PCM16 byte count: {}",
            bytes.len()
        )));
    }
    if format.channels == 0 {
        return Err(Error::Format("channel count must be at least 1".to_string()));
    }

    let channel_count = usize::from(format.channels);
    let sample_count = bytes.len() / 2;
    let frames = sample_count / channel_count;
    if frames * channel_count != sample_count {
        tracing::debug!(
            sample_count,
            channel_count,
            "dropping trailing partial PCM frame"
        );
    }

    let mut channels = vec![Vec::with_capacity(frames); channel_count];
    for (i, pair) in bytes.chunks_exact(2).take(frames * channel_count).enumerate() {
        let value = i16::from_le_bytes([pair[0], pair[1]]);
        channels[i % channel_count].push(f32::from(value) / 32768.0);
    }

    Ok(SampleBuffer {
        sample_rate: format.sample_rate,
        channels,
    })
}

/// Decode a base64 PCM16 payload straight into a sample buffer
///
/// # Errors
///
/// Returns `Error::Decode` or `Error::Format` for a malformed payload
pub fn decode_speech(payload: &str, format: SpeechFormat) -> Result<SampleBuffer> {
    let bytes = decode(payload)?;
    pcm16_to_sample_buffer(&bytes, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_mono_length_and_range() {
        let bytes = pcm(&[0, i16::MAX, i16::MIN, -1, 1234]);
        let buffer = pcm16_to_sample_buffer(&bytes, SpeechFormat::default()).unwrap();

        assert_eq!(buffer.frames(), bytes.len() / 2);
        assert_eq!(buffer.sample_rate(), 24000);
        let samples = buffer.channel(0).unwrap();
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!((samples[2] + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stereo_deinterleave() {
        let bytes = pcm(&[100, -100, 200, -200, 300]);
        let format = SpeechFormat {
            sample_rate: 24000,
            channels: 2,
        };
        let buffer = pcm16_to_sample_buffer(&bytes, format).unwrap();

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frames(), 2);
        assert!(buffer.channel(0).unwrap().iter().all(|s| *s > 0.0));
        assert!(buffer.channel(1).unwrap().iter().all(|s| *s < 0.0));
    }

    #[test]
    fn test_odd_length_is_format_error() {
        let result = pcm16_to_sample_buffer(&[1, 2, 3], SpeechFormat::default());
        assert!(matches!(result, Err(Error::Format(_))));
    }

    #[test]
    fn test_malformed_base64() {
        assert!(matches!(decode("not base64!!"), Err(Error::Decode(_))));
    }

    #[test]
    fn test_decode_speech() {
        let payload = STANDARD.encode(pcm(&[0, 16384, -16384]));
        let buffer = decode_speech(&payload, SpeechFormat::default()).unwrap();
        assert_eq!(buffer.frames(), 3);
        assert!((buffer.channel(0).unwrap()[1] - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sample_for_extra_output_channels() {
        let buffer = SampleBuffer::mono(vec![0.25, 0.5], 24000);
        assert!((buffer.sample_for(1, 1) - 0.5).abs() < f32::EPSILON);
        assert!(buffer.sample_for(0, 5).abs() < f32::EPSILON);
    }
}
