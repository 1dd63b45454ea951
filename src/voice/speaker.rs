//! Text-to-speech playback with supersession
//!
//! Each [`Speaker::speak`] call takes a request id when it is issued. Synthesis
//! and decoding run without being cancelled, but only the latest request may
//! start playback or flip the playing flag; older results are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::codec::{self, SampleBuffer, SpeechFormat};
use super::playback::{PlaybackController, StreamHandle};
use crate::Result;
use crate::content::ContentService;
use crate::supersede::{Generation, Ticket};

/// Outcome of a speak request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback started
    Started(StreamHandle),
    /// The service returned no audio
    Silent,
    /// A newer request was issued while this one was in flight
    Superseded,
}

/// Speaks text through the content service and the playback controller
#[derive(Clone)]
pub struct Speaker {
    content: Arc<dyn ContentService>,
    playback: Arc<Mutex<PlaybackController>>,
    requests: Generation,
    playing: Arc<AtomicBool>,
    format: SpeechFormat,
}

impl Speaker {
    #[must_use]
    pub fn new(content: Arc<dyn ContentService>, playback: PlaybackController) -> Self {
        Self::with_format(content, playback, SpeechFormat::default())
    }

    #[must_use]
    pub fn with_format(
        content: Arc<dyn ContentService>,
        playback: PlaybackController,
        format: SpeechFormat,
    ) -> Self {
        Self {
            content,
            playback: Arc::new(Mutex::new(playback)),
            requests: Generation::new(),
            playing: Arc::new(AtomicBool::new(false)),
            format,
        }
    }

    /// Synthesize `text` and play it, interrupting anything already playing
    ///
    /// # Errors
    ///
    /// Returns error if synthesis, decoding or playback fails for the latest
    /// request; failures of superseded requests are swallowed
    pub async fn speak(&self, text: &str) -> Result<SpeakOutcome> {
        let ticket = self.requests.issue();
        self.playing.store(true, Ordering::SeqCst);
        tracing::debug!(request = ticket.id(), chars = text.len(), "speech requested");

        // Silence the previous clip while this one is synthesized
        self.playback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();

        let payload = self.content.synthesize_speech(text).await;
        if !ticket.is_current() {
            tracing::trace!(request = ticket.id(), "dropping superseded speech");
            return Ok(SpeakOutcome::Superseded);
        }

        let buffer = match payload {
            Ok(Some(payload)) => codec::decode_speech(&payload, self.format),
            Ok(None) => {
                self.settle(&ticket);
                return Ok(SpeakOutcome::Silent);
            }
            Err(e) => Err(e),
        };

        match buffer.and_then(|buffer| self.play(buffer, &ticket)) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, request = ticket.id(), "speech playback failed");
                self.settle(&ticket);
                Err(e)
            }
        }
    }

    /// Play an already decoded buffer as a new request
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub fn play_buffer(&self, buffer: SampleBuffer) -> Result<SpeakOutcome> {
        let ticket = self.requests.issue();
        self.playing.store(true, Ordering::SeqCst);
        self.play(buffer, &ticket).inspect_err(|_| self.settle(&ticket))
    }

    fn play(&self, buffer: SampleBuffer, ticket: &Ticket) -> Result<SpeakOutcome> {
        let mut playback = self
            .playback
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Decoding is synchronous, but check again before touching the device
        if !ticket.is_current() {
            return Ok(SpeakOutcome::Superseded);
        }

        tracing::debug!(
            request = ticket.id(),
            secs = buffer.duration().as_secs_f32(),
            "playing speech"
        );

        let playing = Arc::clone(&self.playing);
        let ended = ticket.clone();
        let handle = playback.play(
            buffer,
            Box::new(move || {
                if ended.is_current() {
                    playing.store(false, Ordering::SeqCst);
                }
            }),
        )?;

        Ok(SpeakOutcome::Started(handle))
    }

    /// Stop playback and invalidate every in-flight request
    pub fn stop(&self) {
        self.requests.bump();
        self.playback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
        self.playing.store(false, Ordering::SeqCst);
    }

    /// Whether a request is being synthesized or played
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    fn settle(&self, ticket: &Ticket) {
        if ticket.is_current() {
            self.playing.store(false, Ordering::SeqCst);
        }
    }
}
