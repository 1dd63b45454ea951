//! Audio playback to speakers
//!
//! [`PlaybackController`] owns at most one audible clip. Starting a clip stops
//! the previous one first, so its end callback fires before the new clip opens
//! its output stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use super::codec::SampleBuffer;
use crate::{Error, Result};

/// Callback invoked once a clip has ended, naturally or by being stopped
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// How often the output thread checks for natural completion
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// One-shot end-of-clip notification shared between controller and backend
#[derive(Clone)]
pub struct EndedSignal {
    callback: Arc<Mutex<Option<EndedCallback>>>,
    fired: Arc<AtomicBool>,
}

impl EndedSignal {
    #[must_use]
    pub fn new(callback: EndedCallback) -> Self {
        Self {
            callback: Arc::new(Mutex::new(Some(callback))),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the callback if nobody has yet
    ///
    /// Returns `true` for the call that actually ran it.
    pub fn fire(&self) -> bool {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.fired.store(true, Ordering::SeqCst);

        callback.is_some_and(|cb| {
            cb();
            true
        })
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for EndedSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndedSignal")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

/// Output device able to play one sample buffer
///
/// The backend fires `drained` when the clip finishes on its own.
pub trait AudioOutput: Send {
    /// Open a stream and start playing `buffer`
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be opened
    fn open(&mut self, buffer: SampleBuffer, drained: EndedSignal) -> Result<Box<dyn OutputStream>>;
}

/// A playing output stream
pub trait OutputStream: Send {
    /// Silence the stream immediately; halting twice is harmless
    fn halt(&mut self);
}

/// Identifies a clip started by [`PlaybackController::play`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHandle(u64);

struct ActiveClip {
    handle: StreamHandle,
    stream: Box<dyn OutputStream>,
    ended: EndedSignal,
}

/// Serializes playback so only one clip is ever audible
pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    active: Option<ActiveClip>,
    next_handle: u64,
}

impl PlaybackController {
    #[must_use]
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            active: None,
            next_handle: 0,
        }
    }

    /// Stop the current clip and start playing `buffer`
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened; `on_ended` is
    /// dropped without running in that case
    pub fn play(&mut self, buffer: SampleBuffer, on_ended: EndedCallback) -> Result<StreamHandle> {
        self.stop();

        self.next_handle += 1;
        let handle = StreamHandle(self.next_handle);
        let ended = EndedSignal::new(on_ended);
        let frames = buffer.frames();

        let stream = self.output.open(buffer, ended.clone())?;
        self.active = Some(ActiveClip {
            handle,
            stream,
            ended,
        });

        tracing::debug!(handle = handle.0, frames, "playback started");
        Ok(handle)
    }

    /// Halt the current clip, if any
    pub fn stop(&mut self) {
        let Some(mut clip) = self.active.take() else {
            return;
        };

        clip.stream.halt();
        if clip.ended.fire() {
            tracing::debug!(handle = clip.handle.0, "playback stopped");
        }
    }

    /// Whether a clip is currently audible
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|clip| !clip.ended.has_fired())
    }

    /// Handle of the most recently started clip, if it is still audible
    #[must_use]
    pub fn current(&self) -> Option<StreamHandle> {
        self.active
            .as_ref()
            .filter(|clip| !clip.ended.has_fired())
            .map(|clip| clip.handle)
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Plays audio to the default output device
///
/// Each clip runs on its own thread because cpal streams cannot move between
/// threads.
#[derive(Debug, Default)]
pub struct CpalOutput;

impl CpalOutput {
    /// Create a playback backend, checking that an output device exists
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );

        Ok(Self)
    }
}

impl AudioOutput for CpalOutput {
    fn open(&mut self, buffer: SampleBuffer, drained: EndedSignal) -> Result<Box<dyn OutputStream>> {
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (halt_tx, halt_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("drill-playback".to_string())
            .spawn(move || run_output(buffer, &drained, &halt_rx, &ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalOutputStream {
                halt_tx: Some(halt_tx),
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::Audio("playback thread exited early".to_string())),
        }
    }
}

struct CpalOutputStream {
    halt_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputStream for CpalOutputStream {
    fn halt(&mut self) {
        if let Some(tx) = self.halt_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CpalOutputStream {
    fn drop(&mut self) {
        self.halt();
    }
}

fn run_output(
    buffer: SampleBuffer,
    drained: &EndedSignal,
    halt_rx: &mpsc::Receiver<()>,
    ready_tx: &mpsc::SyncSender<Result<()>>,
) {
    let finished = Arc::new(AtomicBool::new(false));

    let stream = match build_output_stream(buffer, Arc::clone(&finished)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::Audio(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    loop {
        match halt_rx.recv_timeout(DRAIN_POLL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                drop(stream);
                return;
            }
            Err(RecvTimeoutError::Timeout) => {
                if finished.load(Ordering::SeqCst) {
                    drop(stream);
                    drained.fire();
                    tracing::debug!("playback complete");
                    return;
                }
            }
        }
    }
}

fn build_output_stream(buffer: SampleBuffer, finished: Arc<AtomicBool>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let rate = SampleRate(buffer.sample_rate());
    let wanted = u16::try_from(buffer.channel_count()).unwrap_or(1).max(1);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .min_by_key(|c| c.channels().abs_diff(wanted))
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);
    let total = buffer.frames();
    let mut frame = 0usize;

    device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for out in data.chunks_mut(channels) {
                    for (channel, sample) in out.iter_mut().enumerate() {
                        *sample = buffer.sample_for(channel, frame);
                    }
                    if frame < total {
                        frame += 1;
                    } else {
                        finished.store(true, Ordering::SeqCst);
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))
}
