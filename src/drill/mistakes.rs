//! Mistake logging with per-day deduplication

use std::sync::Arc;

use crate::db::{MistakeRecord, ProgressStore};

/// Writes mistakes for one learner, skipping any already logged for the same
/// word, kind and day
#[derive(Clone)]
pub struct MistakeLog {
    store: Arc<dyn ProgressStore>,
    username: String,
}

impl MistakeLog {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>, username: impl Into<String>) -> Self {
        Self {
            store,
            username: username.into(),
        }
    }

    /// Log `record` unless a matching one exists; returns whether it was written
    ///
    /// Store failures are logged and reported as not written.
    pub fn record(&self, record: &MistakeRecord) -> bool {
        let existing = match self.store.list_mistakes(&self.username) {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read mistakes");
                return false;
            }
        };

        if existing.iter().any(|m| m.same_day_as(record)) {
            tracing::debug!(
                word = %record.word,
                kind = record.kind.as_str(),
                "mistake already logged today"
            );
            return false;
        }

        match self.store.insert_mistake(&self.username, record) {
            Ok(inserted) => {
                if inserted {
                    tracing::info!(word = %record.word, kind = record.kind.as_str(), "mistake logged");
                }
                inserted
            }
            Err(e) => {
                tracing::warn!(error = %e, word = %record.word, "failed to log mistake");
                false
            }
        }
    }
}
