//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Points per learner
        CREATE TABLE IF NOT EXISTS points (
            username TEXT PRIMARY KEY,
            total INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Completed words and stages
        CREATE TABLE IF NOT EXISTS history (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            word TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('word_completed', 'stage_completed')),
            points INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_history_user ON history(username, created_at);

        -- Spelling and grammar mistakes
        CREATE TABLE IF NOT EXISTS mistakes (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            kind TEXT NOT NULL CHECK(kind IN ('spelling', 'grammar')),
            date TEXT NOT NULL,
            word TEXT NOT NULL,
            user_input TEXT NOT NULL,
            correction TEXT NOT NULL,
            explanation TEXT,
            context TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_mistakes_user ON mistakes(username, date);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- One mistake per word, kind and day
        CREATE UNIQUE INDEX IF NOT EXISTS idx_mistakes_daily
            ON mistakes(username, word, kind, date);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
