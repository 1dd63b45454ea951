//! Database module for points, history and mistake persistence

pub mod history;
pub mod mistake;
pub mod points;
mod schema;

use std::path::Path;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::{Error, Result};

pub use history::{HistoryEntry, HistoryKind, HistoryRepo};
pub use mistake::{MistakeKind, MistakeRecord, MistakeRepo};
pub use points::PointsRepo;
pub use schema::SCHEMA_VERSION;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Learner progress persistence
///
/// Callers treat every method as best-effort.
pub trait ProgressStore: Send + Sync {
    /// Add to a learner's point total, returning the new total
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn add_points(&self, username: &str, points: u32) -> Result<u32>;

    /// Current point total
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn points(&self, username: &str) -> Result<u32>;

    /// Append a history entry
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn append_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// History for a learner, oldest first
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn history(&self, username: &str) -> Result<Vec<HistoryEntry>>;

    /// Logged mistakes for a learner
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn list_mistakes(&self, username: &str) -> Result<Vec<MistakeRecord>>;

    /// Insert a mistake; false if one already exists for that word, kind and day
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable
    fn insert_mistake(&self, username: &str, record: &MistakeRecord) -> Result<bool>;
}

/// `SQLite`-backed progress store
#[derive(Clone)]
pub struct SqliteStore {
    points: PointsRepo,
    history: HistoryRepo,
    mistakes: MistakeRepo,
}

impl SqliteStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            points: PointsRepo::new(pool.clone()),
            history: HistoryRepo::new(pool.clone()),
            mistakes: MistakeRepo::new(pool),
        }
    }

    /// Open (or create) the database at `path`
    ///
    /// # Errors
    ///
    /// Returns error if database cannot be opened or initialized
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(init(path)?))
    }
}

impl ProgressStore for SqliteStore {
    fn add_points(&self, username: &str, points: u32) -> Result<u32> {
        self.points.add(username, points)
    }

    fn points(&self, username: &str) -> Result<u32> {
        self.points.total(username)
    }

    fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.history.append(entry)
    }

    fn history(&self, username: &str) -> Result<Vec<HistoryEntry>> {
        self.history.list(username)
    }

    fn list_mistakes(&self, username: &str) -> Result<Vec<MistakeRecord>> {
        self.mistakes.list(username)
    }

    fn insert_mistake(&self, username: &str, record: &MistakeRecord) -> Result<bool> {
        self.mistakes.insert(username, record)
    }
}

/// Initialize the database
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }

    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(4)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    // Run migrations on first connection
    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    tracing::info!(version = SCHEMA_VERSION, "database initialized");
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| Error::Database(e.to_string()))?;

    let conn = pool.get().map_err(|e| Error::Database(e.to_string()))?;
    schema::init(&conn)?;

    Ok(pool)
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_memory() {
        let pool = init_memory().unwrap();
        let _conn = pool.get().unwrap();
    }

    #[test]
    fn test_init_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("drill.db");

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.add_points("ada", 5).unwrap(), 5);
        assert!(path.exists());
    }
}
