//! Mistake log repository

use chrono::{NaiveDate, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

use super::DbPool;
use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Kind of mistake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MistakeKind {
    /// Word typed wrong while drilling
    Spelling,
    /// Sentence judged incorrect
    Grammar,
}

impl MistakeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spelling => "spelling",
            Self::Grammar => "grammar",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "grammar" => Self::Grammar,
            _ => Self::Spelling,
        }
    }
}

/// A logged mistake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MistakeRecord {
    pub id: String,
    pub kind: MistakeKind,
    /// Calendar day the mistake was made
    pub date: NaiveDate,
    pub word: String,
    pub user_input: String,
    pub correction: String,
    pub explanation: Option<String>,
    pub context: String,
}

impl MistakeRecord {
    /// New record dated today (local calendar day)
    #[must_use]
    pub fn new(
        kind: MistakeKind,
        word: &str,
        user_input: &str,
        correction: &str,
        explanation: Option<String>,
        context: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            date: chrono::Local::now().date_naive(),
            word: word.to_string(),
            user_input: user_input.to_string(),
            correction: correction.to_string(),
            explanation,
            context: context.to_string(),
        }
    }

    /// Whether this record covers the same word, kind and day as another
    #[must_use]
    pub fn same_day_as(&self, other: &Self) -> bool {
        self.word == other.word && self.kind == other.kind && self.date == other.date
    }
}

/// Mistake repository
#[derive(Clone)]
pub struct MistakeRepo {
    pool: DbPool,
}

impl MistakeRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Insert a record; returns false if one already exists for the same
    /// word, kind and day
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn insert(&self, username: &str, record: &MistakeRecord) -> Result<bool> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO mistakes
                (id, username, kind, date, word, user_input, correction, explanation, context, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                record.id,
                username,
                record.kind.as_str(),
                record.date.format(DATE_FORMAT).to_string(),
                record.word,
                record.user_input,
                record.correction,
                record.explanation,
                record.context,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(inserted > 0)
    }

    /// All mistakes for a learner, newest day first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self, username: &str) -> Result<Vec<MistakeRecord>> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT id, kind, date, word, user_input, correction, explanation, context
             FROM mistakes WHERE username = ?1 ORDER BY date DESC, created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map([username], |row| {
            let date: String = row.get(2)?;
            Ok(MistakeRecord {
                id: row.get(0)?,
                kind: MistakeKind::parse(&row.get::<_, String>(1)?),
                date: NaiveDate::parse_from_str(&date, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                })?,
                word: row.get(3)?,
                user_input: row.get(4)?,
                correction: row.get(5)?,
                explanation: row.get(6)?,
                context: row.get(7)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            match row {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, username, "skipping unreadable mistake row"),
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn spelling(input: &str) -> MistakeRecord {
        MistakeRecord::new(MistakeKind::Spelling, "candid", input, "candid", None, "drill")
    }

    #[test]
    fn test_unique_per_word_kind_day() {
        let repo = MistakeRepo::new(init_memory().unwrap());

        assert!(repo.insert("ada", &spelling("candud")).unwrap());
        assert!(!repo.insert("ada", &spelling("kandid")).unwrap());

        let grammar = MistakeRecord::new(
            MistakeKind::Grammar,
            "candid",
            "He candid.",
            "He is candid.",
            Some("Missing verb".to_string()),
            "make sentence",
        );
        assert!(repo.insert("ada", &grammar).unwrap());

        let records = repo.list("ada").unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.explanation.as_deref() == Some("Missing verb")));
    }

    #[test]
    fn test_unreadable_date_is_skipped() {
        let pool = init_memory().unwrap();
        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO mistakes
                    (id, username, kind, date, word, user_input, correction, created_at)
                 VALUES ('bad', 'ada', 'spelling', 'someday', 'candid', 'x', 'candid', '')",
                [],
            )
            .unwrap();
        let repo = MistakeRepo::new(pool);

        assert!(repo.list("ada").unwrap().is_empty());

        // Today's entry for the same word is still recorded and listed
        assert!(repo.insert("ada", &spelling("candud")).unwrap());
        let records = repo.list("ada").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].date, Utc::now().date_naive());
    }

    #[test]
    fn test_same_day_as() {
        let a = spelling("candud");
        let mut b = spelling("other");
        assert!(a.same_day_as(&b));

        b.date = a.date.pred_opt().unwrap();
        assert!(!a.same_day_as(&b));
    }
}
