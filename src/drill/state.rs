//! Drill progression state

use std::collections::{BTreeSet, HashMap};

use crate::content::{ChatTurn, PronunciationGrade, SentenceVerdict, WordExtras};
use crate::word::WordUnit;

/// Copy/recall repetitions needed to leave the drill step
pub const REPETITIONS: u8 = 3;

/// Step of the per-word progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrillStep {
    /// Word, phonetic and definition are shown; pronunciation plays on entry
    Learn,
    /// Type the word: twice while it is visible, once from memory
    Drill,
    /// Type the example sentence
    CopySentence,
    /// Compose an original sentence, graded by the content service
    MakeSentence,
}

impl DrillStep {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Learn => "learn",
            Self::Drill => "drill",
            Self::CopySentence => "copy_sentence",
            Self::MakeSentence => "make_sentence",
        }
    }
}

impl std::fmt::Display for DrillStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points already awarded for a word
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AwardFlags {
    /// The 10-point sentence award was given
    pub sentence: bool,
    /// The 5-point pronunciation bonus was given
    pub pronunciation: bool,
}

/// Learner-chosen syllable marks for the active word
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WordAnnotations {
    /// Split points, as character offsets into the word (1..len)
    pub splits: BTreeSet<usize>,
    /// Stressed syllables, by index into [`syllables`](Self::syllables)
    pub stresses: BTreeSet<usize>,
}

impl WordAnnotations {
    /// Toggle a split point before the character at `position`
    ///
    /// Returns false if `position` is not strictly inside the word. Stress
    /// marks are cleared because syllable indices shift.
    pub fn toggle_split(&mut self, word: &str, position: usize) -> bool {
        let len = word.chars().count();
        if position == 0 || position >= len {
            return false;
        }

        if !self.splits.remove(&position) {
            self.splits.insert(position);
        }
        self.stresses.clear();
        true
    }

    /// Toggle the stress mark on a syllable
    ///
    /// Returns false if there is no such syllable.
    pub fn toggle_stress(&mut self, word: &str, syllable: usize) -> bool {
        if syllable >= self.syllables(word).len() {
            return false;
        }

        if !self.stresses.remove(&syllable) {
            self.stresses.insert(syllable);
        }
        true
    }

    /// The word cut at the chosen split points
    #[must_use]
    pub fn syllables(&self, word: &str) -> Vec<String> {
        let mut parts = Vec::with_capacity(self.splits.len() + 1);
        let mut current = String::new();

        for (i, c) in word.chars().enumerate() {
            if i > 0 && self.splits.contains(&i) {
                parts.push(std::mem::take(&mut current));
            }
            current.push(c);
        }
        parts.push(current);
        parts
    }

    /// Render as "pho·TO·syn" style text: splits as dots, stressed syllables
    /// uppercased
    #[must_use]
    pub fn render(&self, word: &str) -> String {
        self.syllables(word)
            .iter()
            .enumerate()
            .map(|(i, s)| {
                if self.stresses.contains(&i) {
                    s.to_uppercase()
                } else {
                    s.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("·")
    }

    pub fn clear(&mut self) {
        self.splits.clear();
        self.stresses.clear();
    }
}

/// Mutable state of one drill session
#[derive(Debug)]
pub(crate) struct DrillState {
    pub index: usize,
    pub step: DrillStep,
    pub repetition_count: u8,
    pub awards: HashMap<usize, AwardFlags>,
    pub annotations: WordAnnotations,
    pub copy_hint: Option<String>,
    pub sentence_input: String,
    pub sentence_feedback: Option<SentenceVerdict>,
    pub chat: Vec<ChatTurn>,
    pub pronunciation: Option<PronunciationGrade>,
    pub recording: bool,
    pub extras: HashMap<usize, WordExtras>,
    pub session_points: u32,
    pub word_points: u32,
    pub completed: bool,
}

impl DrillState {
    pub fn new() -> Self {
        Self {
            index: 0,
            step: DrillStep::Learn,
            repetition_count: 0,
            awards: HashMap::new(),
            annotations: WordAnnotations::default(),
            copy_hint: None,
            sentence_input: String::new(),
            sentence_feedback: None,
            chat: Vec::new(),
            pronunciation: None,
            recording: false,
            extras: HashMap::new(),
            session_points: 0,
            word_points: 0,
            completed: false,
        }
    }

    /// Make `index` the active word at `step`, dropping all transient state
    pub fn enter_word(&mut self, index: usize, step: DrillStep) {
        self.index = index;
        self.step = step;
        self.repetition_count = 0;
        self.annotations.clear();
        self.word_points = 0;
        self.completed = false;
        self.clear_step_state();
    }

    /// Drop inputs, feedback, chat and recording results
    pub fn clear_step_state(&mut self) {
        self.copy_hint = None;
        self.sentence_input.clear();
        self.sentence_feedback = None;
        self.chat.clear();
        self.pronunciation = None;
        self.recording = false;
    }

    pub fn awards_mut(&mut self) -> &mut AwardFlags {
        self.awards.entry(self.index).or_default()
    }

    pub fn awards(&self) -> AwardFlags {
        self.awards.get(&self.index).copied().unwrap_or_default()
    }
}

/// Read-only snapshot for a host UI
#[derive(Debug, Clone)]
pub struct DrillView {
    pub index: usize,
    pub total: usize,
    pub word: WordUnit,
    pub step: DrillStep,
    pub repetition_count: u8,
    /// The word is hidden during the recall repetition
    pub word_hidden: bool,
    pub awards: AwardFlags,
    pub annotations: WordAnnotations,
    pub copy_hint: Option<String>,
    pub sentence_input: String,
    pub sentence_feedback: Option<SentenceVerdict>,
    pub chat: Vec<ChatTurn>,
    pub pronunciation: Option<PronunciationGrade>,
    pub recording: bool,
    pub extras: Option<WordExtras>,
    pub session_points: u32,
    pub completed: bool,
}

impl DrillView {
    /// Advance is available from Learn, and from MakeSentence once feedback exists
    #[must_use]
    pub const fn can_advance(&self) -> bool {
        match self.step {
            DrillStep::Learn => !self.completed,
            DrillStep::MakeSentence => self.sentence_feedback.is_some() && !self.completed,
            DrillStep::Drill | DrillStep::CopySentence => false,
        }
    }
}
