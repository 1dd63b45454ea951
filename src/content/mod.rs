//! Content generation service contract
//!
//! Speech synthesis, sentence and pronunciation grading, follow-up answers and
//! word extras all come from an external service. The drill engine only sees
//! the [`ContentService`] trait; [`HttpContentService`] is the network client.

mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpContentService;

use crate::Result;
use crate::voice::AudioClip;

/// Verdict on a learner-composed sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceVerdict {
    pub is_correct: bool,
    #[serde(default)]
    pub corrected_sentence: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub explanation_translation: String,
}

/// Pronunciation score for a recorded clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PronunciationGrade {
    /// 0 to 100
    pub score: u32,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub feedback_translation: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub details_translation: String,
}

impl PronunciationGrade {
    /// Score clamped to 0..=100
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score.min(100)
    }
}

/// Answer to a follow-up question about feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpAnswer {
    pub content: String,
    #[serde(default)]
    pub translation: String,
}

/// Speaker of a follow-up chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    Learner,
    Tutor,
}

/// One entry of the follow-up chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    #[serde(default)]
    pub translation: Option<String>,
}

/// Word root with its meaning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtymologyRoot {
    pub root: String,
    pub meaning: String,
}

/// Lazily fetched word enrichment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordExtras {
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
    #[serde(default)]
    pub roots: Vec<EtymologyRoot>,
}

/// External content generation and grading service
///
/// Every call may fail (network, quota). Callers must leave their state
/// untouched on failure so the learner can retry.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Synthesize speech as base64 PCM16 (24kHz mono); `None` if the service
    /// produced no audio
    async fn synthesize_speech(&self, text: &str) -> Result<Option<String>>;

    /// Judge a sentence the learner wrote with `word`
    async fn grade_sentence(&self, word: &str, sentence: &str) -> Result<SentenceVerdict>;

    /// Score how well `clip` pronounces `target`
    async fn grade_pronunciation(&self, clip: &AudioClip, target: &str)
    -> Result<PronunciationGrade>;

    /// Answer a question about earlier feedback
    async fn answer_follow_up(
        &self,
        context: &str,
        history: &[ChatTurn],
        question: &str,
    ) -> Result<FollowUpAnswer>;

    /// Synonyms, antonyms and etymology roots of `word`
    async fn word_extras(&self, word: &str) -> Result<WordExtras>;
}
