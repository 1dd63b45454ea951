//! Points repository

use chrono::Utc;

use super::DbPool;
use crate::{Error, Result};

/// Running point totals per learner
#[derive(Clone)]
pub struct PointsRepo {
    pool: DbPool,
}

impl PointsRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add points to a learner's total, creating the row if needed
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn add(&self, username: &str, points: u32) -> Result<u32> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO points (username, total, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(username) DO UPDATE SET total = total + ?2, updated_at = ?3",
            rusqlite::params![username, points, now],
        )?;

        let total: u32 = conn.query_row(
            "SELECT total FROM points WHERE username = ?1",
            [username],
            |row| row.get(0),
        )?;

        tracing::debug!(username, points, total, "points added");
        Ok(total)
    }

    /// Current total (0 for unknown learners)
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn total(&self, username: &str) -> Result<u32> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        let total = conn
            .query_row(
                "SELECT total FROM points WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .ok();

        Ok(total.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn test_add_accumulates() {
        let repo = PointsRepo::new(init_memory().unwrap());

        assert_eq!(repo.total("ada").unwrap(), 0);
        assert_eq!(repo.add("ada", 3).unwrap(), 3);
        assert_eq!(repo.add("ada", 10).unwrap(), 13);
        assert_eq!(repo.total("grace").unwrap(), 0);
    }
}
