//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, oneshot};

use vocab_drill::voice::codec::{self, SpeechFormat};
use vocab_drill::voice::{
    AudioClip, CapturePhase, PlaybackController, SAMPLE_RATE, SampleBuffer, SpeakOutcome, Speaker,
    SpeechCapture, VadConfig, samples_to_wav,
};

mod common;

use common::{FakeContent, FakeInput, FakeOutput, pcm_payload, speak_into, tone};

fn clip(frames: usize) -> SampleBuffer {
    SampleBuffer::mono(vec![0.1; frames], 24000)
}

fn logger(log: &Arc<Mutex<Vec<String>>>, name: &str) -> Box<dyn FnOnce() + Send> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Box::new(move || log.lock().unwrap().push(format!("ended:{name}")))
}

#[test]
fn test_pcm16_mono_length_and_range() {
    let bytes: Vec<u8> = [i16::MIN, -1, 0, 1, i16::MAX, 12345]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();

    let buffer = codec::pcm16_to_sample_buffer(&bytes, SpeechFormat::default()).unwrap();
    assert_eq!(buffer.frames(), bytes.len() / 2);
    assert_eq!(buffer.sample_rate(), 24000);

    let samples = buffer.channel(0).unwrap();
    assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    assert!((samples[0] + 1.0).abs() < f32::EPSILON);
}

#[test]
fn test_odd_byte_count_rejected() {
    let result = codec::pcm16_to_sample_buffer(&[0, 1, 2], SpeechFormat::default());
    assert!(matches!(result, Err(vocab_drill::Error::Format(_))));
}

#[test]
fn test_malformed_base64_rejected() {
    let result = codec::decode_speech("not base64!!", SpeechFormat::default());
    assert!(matches!(result, Err(vocab_drill::Error::Decode(_))));
}

#[test]
fn test_samples_to_wav() {
    let samples = tone(1600, 0.5);
    let wav_data = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");

    let mut reader = hound::WavReader::new(Cursor::new(wav_data)).unwrap();
    assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.samples::<i16>().count(), samples.len());
}

#[test]
fn test_play_twice_ends_first_before_second_opens() {
    let output = FakeOutput::default();
    let mut playback = PlaybackController::new(Box::new(output.clone()));
    let log = Arc::clone(&output.events);

    playback.play(clip(100), logger(&log, "a")).unwrap();
    playback.play(clip(200), logger(&log, "b")).unwrap();

    assert_eq!(
        output.events(),
        vec!["open:1:100", "halt:1", "ended:a", "open:2:200"]
    );
    assert!(playback.is_playing());

    // B drains naturally, then an explicit stop must not end it again
    assert!(output.finish_latest());
    assert!(!playback.is_playing());
    playback.stop();

    let ended_b = output.events().iter().filter(|e| *e == "ended:b").count();
    assert_eq!(ended_b, 1);
}

#[test]
fn test_stop_idle_playback_is_noop() {
    let output = FakeOutput::default();
    let mut playback = PlaybackController::new(Box::new(output.clone()));

    playback.stop();
    playback.stop();
    assert!(output.events().is_empty());
    assert!(playback.current().is_none());
}

#[tokio::test]
async fn test_stop_idle_capture_is_noop() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    capture.stop(false);
    capture.stop(true);
    assert_eq!(capture.phase(), CapturePhase::Idle);
    assert_eq!(input.closed(), 0);
}

#[tokio::test]
async fn test_capture_unavailable_stays_idle() {
    let mut capture = SpeechCapture::new(Box::new(FakeInput::unavailable()), VadConfig::default());

    let result = capture.start(Box::new(|_: AudioClip| panic!("no clip expected")));
    assert!(matches!(result, Err(vocab_drill::Error::CaptureUnavailable(_))));
    assert_eq!(capture.phase(), CapturePhase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_capture_stops_after_trailing_silence() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    let (tx, rx) = oneshot::channel();
    capture
        .start(Box::new(move |clip: AudioClip| {
            let _ = tx.send(clip);
        }))
        .unwrap();
    assert!(capture.is_recording());

    speak_into(&input).await;

    let clip = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("capture should stop on its own")
        .expect("clip delivered");

    assert!(!clip.is_empty());
    assert_eq!(clip.mime_type, "audio/wav");
    assert_eq!(capture.phase(), CapturePhase::Stopped);
    assert_eq!(input.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_capture_gives_up_without_speech() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    let (tx, rx) = oneshot::channel();
    capture
        .start(Box::new(move |clip: AudioClip| {
            let _ = tx.send(clip);
        }))
        .unwrap();

    input.buffer().unwrap().push(&vec![0.001; 4096]);

    let delivered = tokio::time::timeout(Duration::from_secs(20), rx)
        .await
        .expect("capture should time out");

    // The callback is dropped, never invoked
    assert!(delivered.is_err());
    assert_eq!(capture.phase(), CapturePhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_device_counts_as_silence() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    let (tx, rx) = oneshot::channel();
    capture
        .start(Box::new(move |clip: AudioClip| {
            let _ = tx.send(clip);
        }))
        .unwrap();

    // One loud burst, then the device goes quiet without sending zeros
    input.buffer().unwrap().push(&tone(2048, 0.5));

    let clip = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("capture should stop once samples stop arriving")
        .expect("clip delivered");

    assert_eq!(clip.samples, 2048);
    assert_eq!(capture.phase(), CapturePhase::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_stop_delivers_partial_clip() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    let (tx, rx) = oneshot::channel();
    capture
        .start(Box::new(move |clip: AudioClip| {
            let _ = tx.send(clip);
        }))
        .unwrap();

    input.buffer().unwrap().push(&tone(1000, 0.5));
    capture.stop(false);
    capture.stop(false);

    let clip = rx.await.unwrap();
    assert_eq!(clip.samples, 1000);
    assert_eq!(input.closed(), 1);
}

#[tokio::test]
async fn test_new_capture_discards_previous() {
    let input = FakeInput::default();
    let mut capture = SpeechCapture::new(Box::new(input.clone()), VadConfig::default());

    let (first_tx, first_rx) = oneshot::channel();
    capture
        .start(Box::new(move |clip: AudioClip| {
            let _ = first_tx.send(clip);
        }))
        .unwrap();
    capture.start(Box::new(|_: AudioClip| {})).unwrap();

    assert!(first_rx.await.is_err());
    assert_eq!(input.closed(), 1);
    assert!(capture.is_recording());
}

#[tokio::test]
async fn test_speaker_plays_synthesized_speech() {
    let content = FakeContent::new();
    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    let outcome = speaker.speak("candid").await.unwrap();
    assert!(matches!(outcome, SpeakOutcome::Started(_)));
    assert!(speaker.is_playing());
    assert_eq!(output.events(), vec!["open:1:480"]);

    output.finish_latest();
    assert!(!speaker.is_playing());
}

#[tokio::test]
async fn test_speaker_drops_superseded_request() {
    let content = FakeContent::new();
    let gate = Arc::new(Notify::new());
    *content.slow_speech.lock().unwrap() = Some(("slow".to_string(), Arc::clone(&gate)));

    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    let (slow, fast) = tokio::join!(speaker.speak("slow"), async {
        tokio::task::yield_now().await;
        let outcome = speaker.speak("fast").await;
        gate.notify_one();
        outcome
    });

    assert_eq!(slow.unwrap(), SpeakOutcome::Superseded);
    assert!(matches!(fast.unwrap(), SpeakOutcome::Started(_)));
    assert_eq!(output.opened(), 1);
}

#[tokio::test]
async fn test_speaker_silent_and_stop() {
    let content = FakeContent::new();
    *content.speech.lock().unwrap() = None;

    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    assert_eq!(speaker.speak("quiet").await.unwrap(), SpeakOutcome::Silent);
    assert!(!speaker.is_playing());

    *content.speech.lock().unwrap() = Some(pcm_payload(10));
    speaker.speak("again").await.unwrap();
    speaker.stop();
    assert!(!speaker.is_playing());
    assert_eq!(output.events(), vec!["open:1:10", "halt:1"]);
}

#[tokio::test]
async fn test_speaker_reports_bad_payload() {
    let content = FakeContent::new();
    *content.speech.lock().unwrap() = Some("%%%".to_string());

    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    assert!(speaker.speak("broken").await.is_err());
    assert!(!speaker.is_playing());
    assert_eq!(output.opened(), 0);
}

#[tokio::test]
async fn test_decoded_buffer_supersedes_pending_speech() {
    let content = FakeContent::new();
    let gate = Arc::new(Notify::new());
    *content.slow_speech.lock().unwrap() = Some(("slow".to_string(), Arc::clone(&gate)));

    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    let (slow, direct) = tokio::join!(speaker.speak("slow"), async {
        tokio::task::yield_now().await;
        let outcome = speaker.play_buffer(clip(50));
        gate.notify_one();
        outcome
    });

    assert_eq!(slow.unwrap(), SpeakOutcome::Superseded);
    assert!(matches!(direct.unwrap(), SpeakOutcome::Started(_)));
    assert_eq!(output.events(), vec!["open:1:50"]);
}

#[tokio::test]
async fn test_new_request_silences_previous_clip_before_synthesis() {
    let content = FakeContent::new();
    let gate = Arc::new(Notify::new());
    *content.slow_speech.lock().unwrap() = Some(("second".to_string(), Arc::clone(&gate)));

    let output = FakeOutput::default();
    let speaker = Speaker::new(content.clone(), PlaybackController::new(Box::new(output.clone())));

    speaker.speak("first").await.unwrap();
    assert_eq!(output.events(), vec!["open:1:480"]);

    let (second, events_in_flight) = tokio::join!(speaker.speak("second"), async {
        tokio::task::yield_now().await;
        let events = output.events();
        gate.notify_one();
        events
    });

    // The first clip was halted while the second was still being synthesized
    assert_eq!(events_in_flight, vec!["open:1:480", "halt:1"]);
    assert!(matches!(second.unwrap(), SpeakOutcome::Started(_)));
    assert_eq!(output.events(), vec!["open:1:480", "halt:1", "open:2:480"]);
}
