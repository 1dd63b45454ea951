//! Session sequencing
//!
//! A word list is studied in batches. Each batch goes through vocabulary
//! drilling, then article study, then free writing, before the next batch
//! starts.

use crate::db::{HistoryEntry, HistoryKind};
use crate::drill::{DrillEngine, DrillServices};
use crate::word::WordUnit;
use crate::{Error, Result};

/// Stage of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Vocabulary,
    ArticleStudy,
    FreeWriting,
    /// Every batch is done
    Complete,
}

impl Stage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::ArticleStudy => "article_study",
            Self::FreeWriting => "free_writing",
            Self::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the learner is in the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    /// Zero-based batch index
    pub batch: usize,
    pub batches: usize,
    pub stage: Stage,
    pub words_in_batch: usize,
}

/// Walks a word list batch by batch through the session stages
pub struct SessionController {
    words: Vec<WordUnit>,
    batch_size: usize,
    username: String,
    services: DrillServices,
    batch: usize,
    stage: Stage,
}

impl SessionController {
    /// # Errors
    ///
    /// Returns `Error::Config` if `batch_size` is zero, or `Error::InvalidWord`
    /// if `words` is empty
    pub fn new(
        words: Vec<WordUnit>,
        batch_size: usize,
        username: impl Into<String>,
        services: DrillServices,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if words.is_empty() {
            return Err(Error::InvalidWord { index: 0, len: 0 });
        }

        Ok(Self {
            words,
            batch_size,
            username: username.into(),
            services,
            batch: 0,
            stage: Stage::Vocabulary,
        })
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Number of batches
    #[must_use]
    pub fn batch_count(&self) -> usize {
        self.words.len().div_ceil(self.batch_size)
    }

    /// Words of the current batch (empty once complete)
    #[must_use]
    pub fn batch_words(&self) -> &[WordUnit] {
        if self.is_complete() {
            return &[];
        }

        let start = self.batch * self.batch_size;
        let end = (start + self.batch_size).min(self.words.len());
        &self.words[start..end]
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            batch: self.batch,
            batches: self.batch_count(),
            stage: self.stage,
            words_in_batch: self.batch_words().len(),
        }
    }

    /// Drill engine over the current batch
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidWord` once the session is complete
    pub fn drill_engine(&self) -> Result<DrillEngine> {
        DrillEngine::new(
            self.batch_words().to_vec(),
            self.username.clone(),
            self.services.clone(),
        )
    }

    /// Finish the current stage and move to the next one
    ///
    /// A `StageCompleted` history entry is saved (best-effort).
    pub fn complete_stage(&mut self) -> Stage {
        let finished = self.stage;
        let next = match finished {
            Stage::Vocabulary => Stage::ArticleStudy,
            Stage::ArticleStudy => Stage::FreeWriting,
            Stage::FreeWriting if self.batch + 1 < self.batch_count() => {
                self.batch += 1;
                Stage::Vocabulary
            }
            Stage::FreeWriting | Stage::Complete => Stage::Complete,
        };

        if finished != Stage::Complete {
            let entry = HistoryEntry::new(
                &self.username,
                finished.as_str(),
                HistoryKind::StageCompleted,
                0,
            );
            if let Err(e) = self.services.store.append_history(&entry) {
                tracing::warn!(error = %e, stage = %finished, "failed to save stage history");
            }
            tracing::info!(stage = %finished, next = %next, batch = self.batch, "stage completed");
        }

        self.stage = next;
        next
    }
}
