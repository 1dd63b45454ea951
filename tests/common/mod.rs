//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use tokio::sync::Notify;

use vocab_drill::content::{
    ChatTurn, ContentService, FollowUpAnswer, PronunciationGrade, SentenceVerdict, WordExtras,
};
use vocab_drill::voice::{
    AudioClip, AudioInput, AudioOutput, CaptureBuffer, EndedSignal, InputStream, OutputStream,
    SAMPLE_RATE, SampleBuffer,
};
use vocab_drill::{DbPool, Error, Result, SqliteStore, WordUnit, db};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// In-memory progress store
#[must_use]
pub fn setup_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::new(setup_test_db()))
}

/// Two words with example sentences
#[must_use]
pub fn sample_words() -> Vec<WordUnit> {
    vec![
        WordUnit::new("candid", "She was candid about her mistakes."),
        WordUnit::new("frugal", "He lived a frugal life."),
    ]
}

/// Sine tone at the capture sample rate
#[must_use]
pub fn tone(samples: usize, amplitude: f32) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

/// Base64 PCM16 mono payload of `samples` samples
#[must_use]
pub fn pcm_payload(samples: usize) -> String {
    let bytes: Vec<u8> = (0..samples)
        .flat_map(|i| (((i % 300) as i16) * 100).to_le_bytes())
        .collect();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn verdict(is_correct: bool) -> SentenceVerdict {
    SentenceVerdict {
        is_correct,
        corrected_sentence: (!is_correct).then(|| "He is candid.".to_string()),
        explanation: if is_correct {
            String::new()
        } else {
            "A verb is missing.".to_string()
        },
        explanation_translation: String::new(),
    }
}

/// Scripted content service
pub struct FakeContent {
    /// Calls made, e.g. "speech:candid"
    pub calls: Mutex<Vec<String>>,
    /// Payload returned by speech synthesis
    pub speech: Mutex<Option<String>>,
    /// Verdicts returned in order; correct once exhausted
    pub verdicts: Mutex<VecDeque<SentenceVerdict>>,
    pub pronunciation_score: Mutex<u32>,
    /// Every call fails
    pub fail: AtomicBool,
    /// Grading calls wait for this before answering
    pub gate: Mutex<Option<Arc<Notify>>>,
    /// Speech for this text waits for the notify before answering
    pub slow_speech: Mutex<Option<(String, Arc<Notify>)>>,
}

impl Default for FakeContent {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            speech: Mutex::new(Some(pcm_payload(480))),
            verdicts: Mutex::new(VecDeque::new()),
            pronunciation_score: Mutex::new(80),
            fail: AtomicBool::new(false),
            gate: Mutex::new(None),
            slow_speech: Mutex::new(None),
        }
    }
}

impl FakeContent {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_verdict(&self, verdict: SentenceVerdict) {
        self.verdicts.lock().unwrap().push_back(verdict);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Generation("service unavailable".to_string()));
        }
        Ok(())
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

#[async_trait]
impl ContentService for FakeContent {
    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>> {
        self.record(format!("speech:{text}"))?;

        let slow = self
            .slow_speech
            .lock()
            .unwrap()
            .clone()
            .filter(|(slow_text, _)| slow_text == text);
        if let Some((_, notify)) = slow {
            notify.notified().await;
        }

        Ok(self.speech.lock().unwrap().clone())
    }

    async fn grade_sentence(&self, word: &str, sentence: &str) -> Result<SentenceVerdict> {
        self.record(format!("sentence:{word}:{sentence}"))?;
        self.wait_gate().await;
        Ok(self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| verdict(true)))
    }

    async fn grade_pronunciation(
        &self,
        clip: &AudioClip,
        target: &str,
    ) -> Result<PronunciationGrade> {
        self.record(format!("pronunciation:{target}:{}", clip.samples))?;
        self.wait_gate().await;
        Ok(PronunciationGrade {
            score: *self.pronunciation_score.lock().unwrap(),
            feedback: "Clear vowels.".to_string(),
            feedback_translation: String::new(),
            details: String::new(),
            details_translation: String::new(),
        })
    }

    async fn answer_follow_up(
        &self,
        _context: &str,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<FollowUpAnswer> {
        self.record(format!("follow_up:{}:{question}", history.len()))?;
        self.wait_gate().await;
        Ok(FollowUpAnswer {
            content: "Because the sentence needs a verb.".to_string(),
            translation: String::new(),
        })
    }

    async fn word_extras(&self, word: &str) -> Result<WordExtras> {
        self.record(format!("extras:{word}"))?;
        Ok(WordExtras {
            synonyms: vec!["frank".to_string()],
            antonyms: vec!["guarded".to_string()],
            roots: Vec::new(),
        })
    }
}

/// Output backend that logs events instead of touching hardware
#[derive(Clone, Default)]
pub struct FakeOutput {
    /// "open:<frames>", "halt:<n>"
    pub events: Arc<Mutex<Vec<String>>>,
    /// Drain signals of every opened clip, in order
    pub drains: Arc<Mutex<Vec<EndedSignal>>>,
}

impl FakeOutput {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Let the most recent clip finish on its own
    pub fn finish_latest(&self) -> bool {
        self.drains
            .lock()
            .unwrap()
            .last()
            .is_some_and(EndedSignal::fire)
    }

    pub fn opened(&self) -> usize {
        self.drains.lock().unwrap().len()
    }
}

struct FakeStream {
    id: usize,
    events: Arc<Mutex<Vec<String>>>,
}

impl OutputStream for FakeStream {
    fn halt(&mut self) {
        self.events.lock().unwrap().push(format!("halt:{}", self.id));
    }
}

impl AudioOutput for FakeOutput {
    fn open(&mut self, buffer: SampleBuffer, drained: EndedSignal) -> Result<Box<dyn OutputStream>> {
        let mut drains = self.drains.lock().unwrap();
        drains.push(drained);
        let id = drains.len();

        self.events
            .lock()
            .unwrap()
            .push(format!("open:{id}:{}", buffer.frames()));

        Ok(Box::new(FakeStream {
            id,
            events: Arc::clone(&self.events),
        }))
    }
}

/// Input backend fed by the test through the captured buffer
#[derive(Clone, Default)]
pub struct FakeInput {
    pub buffer: Arc<Mutex<Option<CaptureBuffer>>>,
    pub closed: Arc<Mutex<usize>>,
    pub unavailable: bool,
}

impl FakeInput {
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Buffer of the open recording
    pub fn buffer(&self) -> Option<CaptureBuffer> {
        self.buffer.lock().unwrap().clone()
    }

    pub fn closed(&self) -> usize {
        *self.closed.lock().unwrap()
    }
}

struct FakeInputStream {
    closed: Arc<Mutex<usize>>,
}

impl InputStream for FakeInputStream {
    fn close(&mut self) {
        *self.closed.lock().unwrap() += 1;
    }
}

impl AudioInput for FakeInput {
    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn open(&mut self, buffer: CaptureBuffer) -> Result<Box<dyn InputStream>> {
        if self.unavailable {
            return Err(Error::CaptureUnavailable("no input device".to_string()));
        }

        *self.buffer.lock().unwrap() = Some(buffer);
        Ok(Box::new(FakeInputStream {
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Speak into a fake microphone: a loud burst, then silence
pub async fn speak_into(input: &FakeInput) {
    // Let the recording open
    while input.buffer().is_none() {
        tokio::task::yield_now().await;
    }
    let buffer = input.buffer().expect("recording open");

    buffer.push(&tone(2048, 0.5));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    buffer.push(&vec![0.0; 2048]);
}
