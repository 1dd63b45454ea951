//! Learning history repository

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{DbPool, parse_datetime};
use crate::{Error, Result};

/// What a history entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    /// A word was taken through every drill step
    WordCompleted,
    /// A session stage (vocabulary, article, writing) was finished
    StageCompleted,
}

impl HistoryKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WordCompleted => "word_completed",
            Self::StageCompleted => "stage_completed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "stage_completed" => Self::StageCompleted,
            _ => Self::WordCompleted,
        }
    }
}

/// One history entry
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub id: String,
    pub username: String,
    /// Word, or stage name for stage entries
    pub word: String,
    pub kind: HistoryKind,
    pub points: u32,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(username: &str, word: &str, kind: HistoryKind, points: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            word: word.to_string(),
            kind,
            points,
            created_at: Utc::now(),
        }
    }
}

/// History repository
#[derive(Clone)]
pub struct HistoryRepo {
    pool: DbPool,
}

impl HistoryRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Append an entry
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn append(&self, entry: &HistoryEntry) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO history (id, username, word, kind, points, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.id,
                entry.username,
                entry.word,
                entry.kind.as_str(),
                entry.points,
                entry.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Entries for a learner, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, username: &str) -> Result<Vec<HistoryEntry>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, username, word, kind, points, created_at FROM history
             WHERE username = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map([username], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                username: row.get(1)?,
                word: row.get(2)?,
                kind: HistoryKind::parse(&row.get::<_, String>(3)?),
                points: row.get(4)?,
                created_at: parse_datetime(&row.get::<_, String>(5)?),
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, username, "skipping unreadable history row"),
            }
        }

        Ok(entries)
    }
}
