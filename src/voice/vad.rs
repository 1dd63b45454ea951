//! Voice-activity detection
//!
//! Decides, from a stream of RMS energy readings, when the learner has finished
//! speaking. Two exits: trailing silence after speech ends the utterance, and
//! a long stretch with no speech at all abandons it.

use std::time::Duration;

use tokio::time::Instant;

/// RMS energy above which a window counts as speech
pub const SPEECH_THRESHOLD: f32 = 0.015;

/// Silence after speech that ends an utterance
pub const TRAILING_SILENCE: Duration = Duration::from_millis(1200);

/// Total silence after which a capture is abandoned
pub const NO_SPEECH_TIMEOUT: Duration = Duration::from_millis(8000);

/// Sampling period of the capture loop (about 60 Hz)
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Samples analysed per tick
pub const ANALYSIS_WINDOW: usize = 2048;

/// Voice-activity detector tuning
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadConfig {
    pub speech_threshold: f32,
    pub trailing_silence: Duration,
    pub no_speech_timeout: Duration,
    pub tick_interval: Duration,
    pub window: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            speech_threshold: SPEECH_THRESHOLD,
            trailing_silence: TRAILING_SILENCE,
            no_speech_timeout: NO_SPEECH_TIMEOUT,
            tick_interval: TICK_INTERVAL,
            window: ANALYSIS_WINDOW,
        }
    }
}

/// Result of feeding one energy reading to the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    /// Keep recording
    Continue,
    /// Speech was heard and has been followed by enough silence
    Finished,
    /// Nothing was said before the timeout
    NoSpeech,
}

/// Tracks speech presence over one capture
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    config: VadConfig,
    started_at: Instant,
    last_speech: Option<Instant>,
}

impl VoiceActivityDetector {
    #[must_use]
    pub const fn new(config: VadConfig, started_at: Instant) -> Self {
        Self {
            config,
            started_at,
            last_speech: None,
        }
    }

    /// Feed one RMS reading taken at `now`
    pub fn observe(&mut self, energy: f32, now: Instant) -> VadDecision {
        if energy > self.config.speech_threshold {
            if self.last_speech.is_none() {
                tracing::debug!(energy, "speech detected");
            }
            self.last_speech = Some(now);
            return VadDecision::Continue;
        }

        match self.last_speech {
            Some(last) if now.saturating_duration_since(last) > self.config.trailing_silence => {
                tracing::debug!("trailing silence, utterance complete");
                VadDecision::Finished
            }
            None if now.saturating_duration_since(self.started_at)
                > self.config.no_speech_timeout =>
            {
                tracing::debug!("no speech before timeout");
                VadDecision::NoSpeech
            }
            _ => {
                tracing::trace!(energy, "silence");
                VadDecision::Continue
            }
        }
    }

    /// Whether speech has been heard at least once
    #[must_use]
    pub const fn heard_speech(&self) -> bool {
        self.last_speech.is_some()
    }

    #[must_use]
    pub const fn config(&self) -> &VadConfig {
        &self.config
    }
}

/// Root-mean-square energy of samples in `[-1.0, 1.0]`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Root-mean-square energy of 16-bit samples, normalized to `[-1.0, 1.0]`
#[must_use]
pub fn rms_i16(samples: &[i16]) -> f32 {
    let normalized: Vec<f32> = samples.iter().map(|&s| f32::from(s) / 32768.0).collect();
    rms(&normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(rms(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(rms(&loud) > 0.4);

        assert!(rms(&[]).abs() < f32::EPSILON);
        assert!((rms_i16(&[i16::MIN; 8]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_trailing_silence_finishes() {
        let start = Instant::now();
        let mut vad = VoiceActivityDetector::new(VadConfig::default(), start);

        assert_eq!(vad.observe(0.2, start + ms(100)), VadDecision::Continue);
        assert!(vad.heard_speech());
        assert_eq!(vad.observe(0.0, start + ms(1200)), VadDecision::Continue);
        assert_eq!(vad.observe(0.0, start + ms(1301)), VadDecision::Finished);
    }

    #[test]
    fn test_speech_resets_silence_clock() {
        let start = Instant::now();
        let mut vad = VoiceActivityDetector::new(VadConfig::default(), start);

        vad.observe(0.2, start);
        vad.observe(0.2, start + ms(1000));
        assert_eq!(vad.observe(0.0, start + ms(2100)), VadDecision::Continue);
        assert_eq!(vad.observe(0.0, start + ms(2201)), VadDecision::Finished);
    }

    #[test]
    fn test_no_speech_timeout() {
        let start = Instant::now();
        let mut vad = VoiceActivityDetector::new(VadConfig::default(), start);

        assert_eq!(vad.observe(0.001, start + ms(7999)), VadDecision::Continue);
        assert_eq!(vad.observe(0.001, start + ms(8001)), VadDecision::NoSpeech);
        assert!(!vad.heard_speech());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let start = Instant::now();
        let mut vad = VoiceActivityDetector::new(VadConfig::default(), start);

        vad.observe(SPEECH_THRESHOLD, start);
        assert!(!vad.heard_speech());
    }
}
