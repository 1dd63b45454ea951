//! Per-word drill state machine
//!
//! The engine is cheap to clone; clones share one session. State lives behind
//! a mutex that is never held across an await. Every async operation takes a
//! ticket from the engine's generation when it is issued and drops its result
//! if navigation has bumped the generation in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::mistakes::MistakeLog;
use super::outcome::{
    ExtrasOutcome, FollowUpOutcome, Notice, PronunciationOutcome, SubmitOutcome, Transition,
};
use super::scoring::{
    PRONUNCIATION_POINTS, PRONUNCIATION_THRESHOLD, SENTENCE_COPY_POINTS, SENTENCE_POINTS,
    is_recall, repetition_points,
};
use super::state::{DrillState, DrillStep, DrillView, REPETITIONS};
use crate::compare::{diagnose_mismatch, sentences_match, words_match};
use crate::content::{ChatRole, ChatTurn, ContentService};
use crate::db::{HistoryEntry, HistoryKind, MistakeKind, MistakeRecord, ProgressStore};
use crate::supersede::Generation;
use crate::voice::{AudioClip, SpeechCapture, Speaker};
use crate::word::WordUnit;
use crate::{Error, Result};

/// Microphone shared between engines
pub type SharedCapture = Arc<Mutex<SpeechCapture>>;

/// Collaborators a drill engine talks to
#[derive(Clone)]
pub struct DrillServices {
    pub content: Arc<dyn ContentService>,
    pub store: Arc<dyn ProgressStore>,
    pub speaker: Option<Speaker>,
    pub capture: Option<SharedCapture>,
}

impl DrillServices {
    /// Services without audio
    #[must_use]
    pub fn new(content: Arc<dyn ContentService>, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            content,
            store,
            speaker: None,
            capture: None,
        }
    }

    #[must_use]
    pub fn with_speaker(mut self, speaker: Speaker) -> Self {
        self.speaker = Some(speaker);
        self
    }

    #[must_use]
    pub fn with_capture(mut self, capture: SharedCapture) -> Self {
        self.capture = Some(capture);
        self
    }
}

struct Inner {
    words: Vec<WordUnit>,
    username: String,
    state: Mutex<DrillState>,
    generation: Generation,
    recordings: Generation,
    /// Bumped when sentence feedback is cleared for a retry
    attempts: Generation,
    services: DrillServices,
    mistakes: MistakeLog,
}

/// Drives one learner through a list of words
#[derive(Clone)]
pub struct DrillEngine {
    inner: Arc<Inner>,
}

enum WordCheck {
    Correct { awarded: u32, count: u8, next: Option<DrillStep> },
    Incorrect,
}

impl DrillEngine {
    /// Create an engine positioned at the first word's Learn step
    ///
    /// Nothing plays until [`start`](Self::start) is called.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWord` if `words` is empty
    pub fn new(
        words: Vec<WordUnit>,
        username: impl Into<String>,
        services: DrillServices,
    ) -> Result<Self> {
        if words.is_empty() {
            return Err(Error::InvalidWord { index: 0, len: 0 });
        }

        let username = username.into();
        let mistakes = MistakeLog::new(Arc::clone(&services.store), username.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                words,
                username,
                state: Mutex::new(DrillState::new()),
                generation: Generation::new(),
                recordings: Generation::new(),
                attempts: Generation::new(),
                services,
                mistakes,
            }),
        })
    }

    #[must_use]
    pub fn words(&self) -> &[WordUnit] {
        &self.inner.words
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Begin (or restart) at the first word
    pub async fn start(&self) -> Transition {
        *self.state() = DrillState::new();
        tracing::info!(words = self.inner.words.len(), "drill session started");
        self.enter_word(0, DrillStep::Learn, true).await
    }

    /// Snapshot of the current state
    #[must_use]
    pub fn snapshot(&self) -> DrillView {
        let state = self.state();
        let word = self.word(state.index);

        DrillView {
            index: state.index,
            total: self.inner.words.len(),
            word: word.clone(),
            step: state.step,
            repetition_count: state.repetition_count,
            word_hidden: state.step == DrillStep::Drill && is_recall(state.repetition_count),
            awards: state.awards(),
            annotations: state.annotations.clone(),
            copy_hint: state.copy_hint.clone(),
            sentence_input: state.sentence_input.clone(),
            sentence_feedback: state.sentence_feedback.clone(),
            chat: state.chat.clone(),
            pronunciation: state.pronunciation.clone(),
            recording: state.recording,
            extras: word
                .extras
                .clone()
                .or_else(|| state.extras.get(&state.index).cloned()),
            session_points: state.session_points,
            completed: state.completed,
        }
    }

    /// Points earned since [`start`](Self::start)
    #[must_use]
    pub fn session_points(&self) -> u32 {
        self.state().session_points
    }

    /// Move forward: Learn to Drill, or from MakeSentence (once graded) to the
    /// next word
    pub async fn advance(&self) -> Transition {
        let (index, step, graded, word_points, completed) = {
            let state = self.state();
            (
                state.index,
                state.step,
                state.sentence_feedback.is_some(),
                state.word_points,
                state.completed,
            )
        };

        if completed {
            return Transition::Completed;
        }

        match step {
            DrillStep::Learn => self.change_step(DrillStep::Drill).await,
            DrillStep::MakeSentence if graded => {
                self.record_history(&self.word(index).word, HistoryKind::WordCompleted, word_points);

                if index + 1 < self.inner.words.len() {
                    self.enter_word(index + 1, DrillStep::Learn, false).await
                } else {
                    self.inner.generation.bump();
                    self.discard_recording();
                    let points = {
                        let mut state = self.state();
                        state.completed = true;
                        state.session_points
                    };
                    tracing::info!(points, "drill session complete");
                    Transition::Completed
                }
            }
            _ => Transition::Stayed,
        }
    }

    /// Move back one step; from a word's Learn step this re-enters the
    /// previous word at MakeSentence
    pub async fn back(&self) -> Transition {
        let (index, step) = {
            let state = self.state();
            (state.index, state.step)
        };

        match step {
            DrillStep::Learn if index == 0 => Transition::Stayed,
            DrillStep::Learn => {
                self.enter_word(index - 1, DrillStep::MakeSentence, false)
                    .await
            }
            DrillStep::Drill => self.change_step(DrillStep::Learn).await,
            DrillStep::CopySentence => self.change_step(DrillStep::Drill).await,
            DrillStep::MakeSentence => self.change_step(DrillStep::CopySentence).await,
        }
    }

    /// Start the word at `index` afresh, award flags included
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWord` if `index` is out of range
    pub async fn jump_to(&self, index: usize) -> Result<Transition> {
        let len = self.inner.words.len();
        if index >= len {
            return Err(Error::InvalidWord { index, len });
        }

        Ok(self.enter_word(index, DrillStep::Learn, true).await)
    }

    /// Type the word during the Drill step
    pub async fn submit_word(&self, input: &str) -> SubmitOutcome {
        let (index, check) = {
            let mut state = self.state();
            if state.step != DrillStep::Drill {
                return SubmitOutcome::WrongStep(state.step);
            }

            let index = state.index;
            let check = if words_match(input, &self.word(index).word) {
                let awarded = repetition_points(state.repetition_count);
                state.repetition_count += 1;
                state.session_points += awarded;
                state.word_points += awarded;

                let next = (state.repetition_count >= REPETITIONS).then(|| {
                    state.step = DrillStep::CopySentence;
                    state.clear_step_state();
                    DrillStep::CopySentence
                });
                WordCheck::Correct {
                    awarded,
                    count: state.repetition_count,
                    next,
                }
            } else {
                WordCheck::Incorrect
            };
            (index, check)
        };

        let word = self.word(index);
        match check {
            WordCheck::Correct {
                awarded,
                count,
                next,
            } => {
                tracing::info!(word = %word.word, awarded, repetitions = count, "word typed correctly");
                self.persist_points(awarded);

                let notice = match next {
                    Some(step) => {
                        tracing::debug!(word = %word.word, step = %step, "drill complete");
                        self.announce(index, step).await
                    }
                    // Recall repetition: play the word with it hidden
                    None if is_recall(count) => self.speak(&word.word).await,
                    None => None,
                };

                SubmitOutcome::Correct {
                    awarded,
                    next,
                    notice,
                }
            }
            WordCheck::Incorrect => {
                tracing::debug!(word = %word.word, input, "word typed incorrectly");
                self.inner.mistakes.record(&MistakeRecord::new(
                    MistakeKind::Spelling,
                    &word.word,
                    input.trim(),
                    &word.word,
                    None,
                    &word.example_sentence,
                ));
                let audio = self.speak(&word.word).await;

                SubmitOutcome::Incorrect {
                    notice: Notice::TryAgain,
                    audio,
                }
            }
        }
    }

    /// Type the example sentence during the CopySentence step
    pub fn submit_copy(&self, input: &str) -> SubmitOutcome {
        let mut state = self.state();
        if state.step != DrillStep::CopySentence {
            return SubmitOutcome::WrongStep(state.step);
        }

        let word = self.word(state.index);
        if sentences_match(input, &word.example_sentence) {
            state.session_points += SENTENCE_COPY_POINTS;
            state.word_points += SENTENCE_COPY_POINTS;
            state.step = DrillStep::MakeSentence;
            state.clear_step_state();
            drop(state);

            tracing::info!(word = %word.word, awarded = SENTENCE_COPY_POINTS, "sentence copied");
            self.persist_points(SENTENCE_COPY_POINTS);

            SubmitOutcome::Correct {
                awarded: SENTENCE_COPY_POINTS,
                next: Some(DrillStep::MakeSentence),
                notice: None,
            }
        } else {
            let diagnosis = diagnose_mismatch(input, &word.example_sentence);
            tracing::debug!(word = %word.word, ?diagnosis, "sentence copy mismatch");
            state.copy_hint = Some(diagnosis.hint());

            SubmitOutcome::Incorrect {
                notice: Notice::Hint(diagnosis),
                audio: None,
            }
        }
    }

    /// Submit an original sentence for grading during MakeSentence
    pub async fn submit_sentence(&self, sentence: &str) -> SubmitOutcome {
        let index = {
            let mut state = self.state();
            if state.step != DrillStep::MakeSentence {
                return SubmitOutcome::WrongStep(state.step);
            }
            sentence.clone_into(&mut state.sentence_input);
            state.index
        };

        let word = self.word(index);
        let ticket = self.inner.generation.current();
        let attempt = self.inner.attempts.current();
        let result = self
            .inner
            .services
            .content
            .grade_sentence(&word.word, sentence)
            .await;

        if !ticket.is_current() || !attempt.is_current() {
            tracing::debug!(word = %word.word, "dropping stale sentence grade");
            return SubmitOutcome::Stale;
        }

        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, word = %word.word, "sentence grading failed");
                return SubmitOutcome::Failed(Notice::ServiceUnavailable(e.to_string()));
            }
        };

        let awarded = {
            let mut state = self.state();
            state.sentence_feedback = Some(verdict.clone());
            state.chat.clear();

            if verdict.is_correct && !state.awards().sentence {
                state.awards_mut().sentence = true;
                state.session_points += SENTENCE_POINTS;
                state.word_points += SENTENCE_POINTS;
                SENTENCE_POINTS
            } else {
                0
            }
        };

        if verdict.is_correct {
            tracing::info!(word = %word.word, awarded, "sentence judged correct");
            self.persist_points(awarded);
        } else {
            tracing::debug!(word = %word.word, "sentence judged incorrect");
            let explanation = Some(verdict.explanation.clone()).filter(|e| !e.is_empty());
            self.inner.mistakes.record(&MistakeRecord::new(
                MistakeKind::Grammar,
                &word.word,
                sentence.trim(),
                verdict.corrected_sentence.as_deref().unwrap_or_default(),
                explanation,
                &word.example_sentence,
            ));
        }

        SubmitOutcome::Graded { verdict, awarded }
    }

    /// Clear sentence feedback and chat so the learner can try again
    ///
    /// Award flags are kept. Returns false outside MakeSentence.
    pub fn retry_sentence(&self) -> bool {
        let mut state = self.state();
        if state.step != DrillStep::MakeSentence {
            return false;
        }

        self.inner.attempts.bump();
        state.sentence_feedback = None;
        state.sentence_input.clear();
        state.chat.clear();
        true
    }

    /// Ask a question about the current sentence feedback
    pub async fn ask_follow_up(&self, question: &str) -> FollowUpOutcome {
        let (context, history) = {
            let state = self.state();
            let Some(feedback) = state.sentence_feedback.as_ref() else {
                return FollowUpOutcome::NoFeedback;
            };

            let word = self.word(state.index);
            let context = format!(
                "Word: {}\nSentence: {}\nCorrect: {}\nCorrected: {}\nExplanation: {}",
                word.word,
                state.sentence_input,
                feedback.is_correct,
                feedback.corrected_sentence.as_deref().unwrap_or("-"),
                feedback.explanation,
            );
            (context, state.chat.clone())
        };

        let ticket = self.inner.generation.current();
        let attempt = self.inner.attempts.current();
        let result = self
            .inner
            .services
            .content
            .answer_follow_up(&context, &history, question)
            .await;

        // Navigated away or retried while the answer was in flight
        if !ticket.is_current() || !attempt.is_current() {
            return FollowUpOutcome::Stale;
        }

        match result {
            Ok(answer) => {
                let mut state = self.state();

                state.chat.push(ChatTurn {
                    role: ChatRole::Learner,
                    content: question.to_string(),
                    translation: None,
                });
                state.chat.push(ChatTurn {
                    role: ChatRole::Tutor,
                    content: answer.content.clone(),
                    translation: Some(answer.translation.clone()).filter(|t| !t.is_empty()),
                });
                FollowUpOutcome::Answered(answer)
            }
            Err(e) => {
                tracing::warn!(error = %e, "follow-up failed");
                FollowUpOutcome::Failed(Notice::ServiceUnavailable(e.to_string()))
            }
        }
    }

    /// Record one utterance and have it graded against the current word (or
    /// the example sentence during CopySentence)
    ///
    /// Resolves when the learner stops speaking, or on
    /// [`stop_recording`](Self::stop_recording).
    pub async fn practice_pronunciation(&self) -> PronunciationOutcome {
        let Some(capture) = self.inner.services.capture.clone() else {
            return PronunciationOutcome::Unavailable(Notice::MicrophoneUnavailable(
                "voice is disabled".to_string(),
            ));
        };

        let target = {
            let state = self.state();
            self.pronunciation_target(state.index, state.step)
        };

        // Keep the speaker out of the recording
        if let Some(speaker) = &self.inner.services.speaker {
            speaker.stop();
        }

        let ticket = self.inner.generation.current();
        let take = self.inner.recordings.issue();
        let (tx, rx) = oneshot::channel();

        let started = lock(&capture).start(Box::new(move |clip: AudioClip| {
            let _ = tx.send(clip);
        }));
        if let Err(e) = started {
            tracing::warn!(error = %e, "could not start recording");
            return PronunciationOutcome::Unavailable(Notice::MicrophoneUnavailable(
                e.to_string(),
            ));
        }

        self.state().recording = true;
        tracing::debug!(text = %target, "pronunciation recording started");

        let clip = rx.await;
        if take.is_current() {
            self.state().recording = false;
        }
        if !ticket.is_current() {
            return PronunciationOutcome::Stale;
        }

        let clip = match clip {
            Ok(clip) if !clip.is_empty() => clip,
            _ => {
                tracing::debug!("recording ended without speech");
                return PronunciationOutcome::NoSpeech;
            }
        };

        let result = self
            .inner
            .services
            .content
            .grade_pronunciation(&clip, &target)
            .await;

        if !ticket.is_current() {
            tracing::debug!(text = %target, "dropping stale pronunciation grade");
            return PronunciationOutcome::Stale;
        }

        let grade = match result {
            Ok(grade) => grade,
            Err(e) => {
                tracing::warn!(error = %e, "pronunciation grading failed");
                return PronunciationOutcome::Failed(Notice::ServiceUnavailable(e.to_string()));
            }
        };

        let awarded = {
            let mut state = self.state();
            state.pronunciation = Some(grade.clone());

            if grade.score() >= PRONUNCIATION_THRESHOLD && !state.awards().pronunciation {
                state.awards_mut().pronunciation = true;
                state.session_points += PRONUNCIATION_POINTS;
                state.word_points += PRONUNCIATION_POINTS;
                PRONUNCIATION_POINTS
            } else {
                0
            }
        };

        tracing::info!(text = %target, score = grade.score(), awarded, "pronunciation graded");
        self.persist_points(awarded);

        PronunciationOutcome::Graded { grade, awarded }
    }

    /// End the current recording and grade what was captured
    ///
    /// Returns false if nothing was recording.
    pub fn stop_recording(&self) -> bool {
        let Some(capture) = &self.inner.services.capture else {
            return false;
        };

        let mut capture = lock(capture);
        let was_recording = capture.is_recording();
        capture.stop(false);
        was_recording
    }

    /// Play the current word (or the example sentence during CopySentence)
    pub async fn replay_audio(&self) -> Option<Notice> {
        let text = {
            let state = self.state();
            self.pronunciation_target(state.index, state.step)
        };
        self.speak(&text).await
    }

    /// Fetch synonyms, antonyms and roots for the current word
    ///
    /// Extras shipped with the word or fetched earlier are returned directly.
    pub async fn load_extras(&self) -> ExtrasOutcome {
        let (index, cached) = {
            let state = self.state();
            let cached = self
                .word(state.index)
                .extras
                .clone()
                .or_else(|| state.extras.get(&state.index).cloned());
            (state.index, cached)
        };

        if let Some(extras) = cached {
            return ExtrasOutcome::Loaded(extras);
        }

        let word = self.word(index);
        let ticket = self.inner.generation.current();
        let result = self.inner.services.content.word_extras(&word.word).await;

        if !ticket.is_current() {
            return ExtrasOutcome::Stale;
        }

        match result {
            Ok(extras) => {
                self.state().extras.insert(index, extras.clone());
                tracing::debug!(word = %word.word, "extras loaded");
                ExtrasOutcome::Loaded(extras)
            }
            Err(e) => {
                tracing::warn!(error = %e, word = %word.word, "extras unavailable");
                ExtrasOutcome::Failed(Notice::ServiceUnavailable(e.to_string()))
            }
        }
    }

    /// Toggle a syllable split before character `position` of the current word
    pub fn toggle_syllable_split(&self, position: usize) -> bool {
        let mut state = self.state();
        let word = &self.word(state.index).word;
        state.annotations.toggle_split(word, position)
    }

    /// Toggle the stress mark on syllable `syllable` of the current word
    pub fn toggle_stress(&self, syllable: usize) -> bool {
        let mut state = self.state();
        let word = &self.word(state.index).word;
        state.annotations.toggle_stress(word, syllable)
    }

    async fn enter_word(&self, index: usize, step: DrillStep, fresh: bool) -> Transition {
        self.inner.generation.bump();
        self.discard_recording();

        {
            let mut state = self.state();
            if fresh {
                state.awards.remove(&index);
            }
            state.enter_word(index, step);
        }

        tracing::debug!(index, word = %self.word(index).word, step = %step, "entered word");
        let notice = self.announce(index, step).await;
        Transition::Moved {
            index,
            step,
            notice,
        }
    }

    async fn change_step(&self, step: DrillStep) -> Transition {
        self.inner.generation.bump();
        self.discard_recording();

        let index = {
            let mut state = self.state();
            state.step = step;
            state.completed = false;
            state.clear_step_state();
            if step == DrillStep::Drill {
                state.repetition_count = 0;
            }
            state.index
        };

        tracing::debug!(index, word = %self.word(index).word, step = %step, "changed step");
        let notice = self.announce(index, step).await;
        Transition::Moved {
            index,
            step,
            notice,
        }
    }

    /// Entry audio: the word on Learn, the example sentence on CopySentence
    async fn announce(&self, index: usize, step: DrillStep) -> Option<Notice> {
        match step {
            DrillStep::Learn | DrillStep::CopySentence => {
                let text = self.pronunciation_target(index, step);
                self.speak(&text).await
            }
            DrillStep::Drill | DrillStep::MakeSentence => None,
        }
    }

    async fn speak(&self, text: &str) -> Option<Notice> {
        let speaker = self.inner.services.speaker.as_ref()?;
        if text.trim().is_empty() {
            return None;
        }

        match speaker.speak(text).await {
            Ok(outcome) => {
                tracing::trace!(?outcome, "speech request settled");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "speech failed");
                Some(Notice::SpeechFailed(e.to_string()))
            }
        }
    }

    fn pronunciation_target(&self, index: usize, step: DrillStep) -> String {
        let word = self.word(index);
        if step == DrillStep::CopySentence && !word.example_sentence.trim().is_empty() {
            word.example_sentence.clone()
        } else {
            word.word.clone()
        }
    }

    fn discard_recording(&self) {
        if let Some(capture) = &self.inner.services.capture {
            lock(capture).stop(true);
        }
    }

    fn persist_points(&self, points: u32) {
        if points == 0 {
            return;
        }
        if let Err(e) = self
            .inner
            .services
            .store
            .add_points(&self.inner.username, points)
        {
            tracing::warn!(error = %e, points, "failed to save points");
        }
    }

    fn record_history(&self, word: &str, kind: HistoryKind, points: u32) {
        let entry = HistoryEntry::new(&self.inner.username, word, kind, points);
        if let Err(e) = self.inner.services.store.append_history(&entry) {
            tracing::warn!(error = %e, word, "failed to save history");
        }
    }

    fn word(&self, index: usize) -> &WordUnit {
        &self.inner.words[index]
    }

    fn state(&self) -> MutexGuard<'_, DrillState> {
        lock(&self.inner.state)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
