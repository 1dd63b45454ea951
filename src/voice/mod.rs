//! Voice processing module
//!
//! Handles speech playback, microphone capture with voice-activity detection,
//! and conversion of the content service's PCM16 audio.

mod capture;
pub mod codec;
mod playback;
mod speaker;
pub mod vad;

pub use capture::{
    AudioClip, AudioInput, CLIP_MIME_TYPE, CaptureBuffer, CapturePhase, CpalInput,
    FinishedCallback, InputStream, SAMPLE_RATE, SpeechCapture, samples_to_wav,
};
pub use codec::{SampleBuffer, SpeechFormat};
pub use playback::{
    AudioOutput, CpalOutput, EndedCallback, EndedSignal, OutputStream, PlaybackController,
    StreamHandle,
};
pub use speaker::{SpeakOutcome, Speaker};
pub use vad::{VadConfig, VadDecision, VoiceActivityDetector};
