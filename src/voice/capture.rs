//! Audio capture from microphone
//!
//! A [`SpeechCapture`] records one utterance at a time. While recording, a
//! sampling task measures the energy of the latest input window at a fixed
//! rate and stops the capture on its own once the learner goes quiet.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::time::{Instant, MissedTickBehavior};

use super::vad::{VadConfig, VadDecision, VoiceActivityDetector, rms};
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// MIME type of encoded clips
pub const CLIP_MIME_TYPE: &str = "audio/wav";

/// Callback receiving a finished utterance
pub type FinishedCallback = Box<dyn FnOnce(AudioClip) + Send + 'static>;

/// A finished recording, encoded for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub sample_rate: u32,
    pub samples: usize,
}

impl AudioClip {
    /// Encode mono samples as a 16-bit WAV clip
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Result<Self> {
        Ok(Self {
            bytes: samples_to_wav(samples, sample_rate)?,
            mime_type: CLIP_MIME_TYPE.to_string(),
            sample_rate,
            samples: samples.len(),
        })
    }

    /// Whether the clip holds no audio samples
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Recorded length
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(self.samples as u64 * 1000 / u64::from(self.sample_rate))
    }
}

/// Accumulating sample store written by an input backend
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    samples: Arc<Mutex<Vec<f32>>>,
}

impl CaptureBuffer {
    /// Append captured samples
    pub fn push(&self, data: &[f32]) {
        lock(&self.samples).extend_from_slice(data);
    }

    /// The most recent `window` samples
    #[must_use]
    pub fn latest(&self, window: usize) -> Vec<f32> {
        let samples = lock(&self.samples);
        let start = samples.len().saturating_sub(window);
        samples[start..].to_vec()
    }

    /// Take all samples, leaving the buffer empty
    #[must_use]
    pub fn take(&self) -> Vec<f32> {
        std::mem::take(&mut *lock(&self.samples))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.samples).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Microphone able to feed a [`CaptureBuffer`]
pub trait AudioInput: Send {
    /// Sample rate of the samples pushed into the buffer
    fn sample_rate(&self) -> u32;

    /// Acquire the device and start pushing mono samples into `buffer`
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the device cannot be acquired
    fn open(&mut self, buffer: CaptureBuffer) -> Result<Box<dyn InputStream>>;
}

/// An open microphone stream
pub trait InputStream: Send {
    /// Release the device; closing twice is harmless
    fn close(&mut self);
}

/// Lifecycle of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// Nothing has been recorded, or the device could not be acquired
    Idle,
    /// Microphone open, sampling loop running
    Recording,
    /// Recording ended, by silence or by an explicit stop
    Stopped,
}

struct Session {
    phase: CapturePhase,
    stream: Option<Box<dyn InputStream>>,
    buffer: CaptureBuffer,
    /// Buffer length at the previous sampling tick
    measured: usize,
    detector: VoiceActivityDetector,
    on_finished: Option<FinishedCallback>,
    sample_rate: u32,
}

impl Session {
    /// End the recording, returning the callback and clip to deliver
    fn finish(&mut self, discard: bool) -> Option<(FinishedCallback, AudioClip)> {
        if self.phase != CapturePhase::Recording {
            return None;
        }

        self.phase = CapturePhase::Stopped;
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }

        let samples = self.buffer.take();
        let callback = self.on_finished.take();
        tracing::debug!(samples = samples.len(), discard, "audio capture stopped");

        if discard {
            return None;
        }

        match AudioClip::from_samples(&samples, self.sample_rate) {
            Ok(clip) => callback.map(|cb| (cb, clip)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode captured clip");
                None
            }
        }
    }
}

struct ActiveCapture {
    session: Arc<Mutex<Session>>,
    ticker: tokio::task::JoinHandle<()>,
}

/// Records one utterance at a time with automatic end-of-speech detection
pub struct SpeechCapture {
    input: Box<dyn AudioInput>,
    config: VadConfig,
    active: Option<ActiveCapture>,
}

impl SpeechCapture {
    #[must_use]
    pub fn new(input: Box<dyn AudioInput>, config: VadConfig) -> Self {
        Self {
            input,
            config,
            active: None,
        }
    }

    /// Start recording; `on_finished` receives the clip when the learner stops
    /// speaking or when [`stop`](Self::stop) is called without discarding
    ///
    /// Any capture already running is stopped and discarded first. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if the microphone cannot be
    /// acquired; the capture is left idle
    pub fn start(&mut self, on_finished: FinishedCallback) -> Result<()> {
        self.stop(true);
        self.active = None;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Audio(format!("capture needs an async runtime: {e}")))?;

        let buffer = CaptureBuffer::default();
        let stream = self.input.open(buffer.clone()).inspect_err(|e| {
            tracing::warn!(error = %e, "microphone unavailable");
        })?;

        let session = Arc::new(Mutex::new(Session {
            phase: CapturePhase::Recording,
            stream: Some(stream),
            buffer,
            measured: 0,
            detector: VoiceActivityDetector::new(self.config, Instant::now()),
            on_finished: Some(on_finished),
            sample_rate: self.input.sample_rate(),
        }));

        let ticker = runtime.spawn(run_sampling(Arc::clone(&session), self.config));
        self.active = Some(ActiveCapture { session, ticker });

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop recording
    ///
    /// With `discard == false` the clip captured so far is delivered to the
    /// callback. Safe to call repeatedly and while idle.
    pub fn stop(&mut self, discard: bool) {
        let Some(active) = self.active.as_ref() else {
            return;
        };

        active.ticker.abort();
        let delivery = lock(&active.session).finish(discard);
        if let Some((callback, clip)) = delivery {
            callback(clip);
        }
    }

    #[must_use]
    pub fn phase(&self) -> CapturePhase {
        self.active
            .as_ref()
            .map_or(CapturePhase::Idle, |active| lock(&active.session).phase)
    }

    #[must_use]
    pub fn is_recording(&self) -> bool {
        self.phase() == CapturePhase::Recording
    }

    #[must_use]
    pub const fn config(&self) -> &VadConfig {
        &self.config
    }
}

impl Drop for SpeechCapture {
    fn drop(&mut self) {
        self.stop(true);
    }
}

/// Sampling loop: one energy reading per tick until the detector decides
async fn run_sampling(session: Arc<Mutex<Session>>, config: VadConfig) {
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let delivery = {
            let mut state = lock(&session);
            if state.phase != CapturePhase::Recording {
                return;
            }

            // A device that stopped delivering reads as silence
            let len = state.buffer.len();
            let energy = if len == state.measured {
                0.0
            } else {
                rms(&state.buffer.latest(config.window))
            };
            state.measured = len;

            match state.detector.observe(energy, Instant::now()) {
                VadDecision::Continue => continue,
                VadDecision::Finished => state.finish(false),
                VadDecision::NoSpeech => state.finish(true),
            }
        };

        if let Some((callback, clip)) = delivery {
            callback(clip);
        }
        return;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Captures audio from the default input device
///
/// The cpal stream lives on a dedicated thread because it cannot move between
/// threads; closing the stream signals that thread and returns without
/// waiting for it.
pub struct CpalInput {
    config: StreamConfig,
}

impl CpalInput {
    /// Create a new audio capture backend
    ///
    /// Prefers a 16kHz mono configuration, falling back to the device default.
    ///
    /// # Errors
    ///
    /// Returns `Error::CaptureUnavailable` if no input device can be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::CaptureUnavailable("no input device available".to_string()))?;

        let preferred = device
            .supported_input_configs()
            .map_err(|e| Error::CaptureUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .map(|c| c.with_sample_rate(SampleRate(SAMPLE_RATE)).config());

        let config = match preferred {
            Some(config) => config,
            None => device
                .default_input_config()
                .map_err(|e| Error::CaptureUnavailable(e.to_string()))?
                .config(),
        };

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self { config })
    }
}

impl AudioInput for CpalInput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn open(&mut self, buffer: CaptureBuffer) -> Result<Box<dyn InputStream>> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (close_tx, close_rx) = mpsc::channel();
        let config = self.config.clone();

        let thread = std::thread::Builder::new()
            .name("drill-capture".to_string())
            .spawn(move || run_input(&config, buffer, &close_rx, &ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalInputStream {
                close_tx: Some(close_tx),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::CaptureUnavailable(
                "capture thread exited early".to_string(),
            )),
        }
    }
}

struct CpalInputStream {
    close_tx: Option<mpsc::Sender<()>>,
}

impl InputStream for CpalInputStream {
    // Called under the capture lock from async code, so never joins
    fn close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_input(
    config: &StreamConfig,
    buffer: CaptureBuffer,
    close_rx: &mpsc::Receiver<()>,
    ready_tx: &mpsc::SyncSender<Result<()>>,
) {
    let host = cpal::default_host();
    let Some(device) = host.default_input_device() else {
        let _ = ready_tx.send(Err(Error::CaptureUnavailable("no input device".to_string())));
        return;
    };

    let channels = usize::from(config.channels).max(1);
    #[allow(clippy::cast_precision_loss)]
    let stream = device.build_input_stream(
        config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                buffer.push(data);
            } else {
                let mono: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                    .collect();
                buffer.push(&mono);
            }
        },
        |err| {
            tracing::error!(error = %err, "audio capture error");
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(Error::CaptureUnavailable(e.to_string())));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::CaptureUnavailable(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    // Hold the stream until asked to close or the handle is dropped
    let _ = close_rx.recv();
    drop(stream);
    tracing::trace!("microphone released");
}

/// Convert f32 samples to WAV bytes for upload
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
