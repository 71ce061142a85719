//! SQLite-based session storage.
//!
//! Provides persistent storage for:
//! - Completed work sessions (label, tracked time, pauses taken)
//! - Daily and all-time statistics
//! - Key-value store for application state (the CLI round-trips the timer
//!   engine through it between invocations)

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

use super::data_dir;
use crate::error::{CoreError, StorageError};

/// A finished work session as recorded on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSessionRecord {
    pub id: String,
    pub label: String,
    /// Active (non-paused) tracked duration.
    pub elapsed_ms: u64,
    pub pauses_used: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Stats {
    pub total_sessions: u64,
    pub total_tracked_ms: u64,
    pub total_pauses: u64,
    pub today_sessions: u64,
    pub today_tracked_ms: u64,
}

/// SQLite database for session storage.
///
/// Stores completed work sessions and provides statistics.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/takt/takt.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()
            .map_err(|e| CoreError::Custom(e.to_string()))?
            .join("takt.db");
        Ok(Self::open_at(&path)?)
    }

    /// Open the database at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS work_sessions (
                id           TEXT PRIMARY KEY,
                label        TEXT NOT NULL DEFAULT '',
                elapsed_ms   INTEGER NOT NULL,
                pauses_used  INTEGER NOT NULL DEFAULT 0,
                started_at   TEXT NOT NULL,
                completed_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_work_sessions_completed_at
                ON work_sessions(completed_at);",
        )?;
        Ok(())
    }

    /// Record a completed work session.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_session(
        &self,
        label: &str,
        elapsed_ms: u64,
        pauses_used: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Result<String, rusqlite::Error> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO work_sessions (id, label, elapsed_ms, pauses_used, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                label,
                elapsed_ms,
                pauses_used,
                started_at.to_rfc3339(),
                completed_at.to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    /// Most recently completed sessions, newest first.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<WorkSessionRecord>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, elapsed_ms, pauses_used, started_at, completed_at
             FROM work_sessions
             ORDER BY completed_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, label, elapsed_ms, pauses_used, started_at, completed_at) = row?;
            records.push(WorkSessionRecord {
                id,
                label,
                elapsed_ms,
                pauses_used,
                started_at: parse_timestamp(&started_at)?,
                completed_at: parse_timestamp(&completed_at)?,
            });
        }
        Ok(records)
    }

    pub fn stats_today(&self) -> Result<Stats, rusqlite::Error> {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(elapsed_ms), 0), COALESCE(SUM(pauses_used), 0)
             FROM work_sessions
             WHERE completed_at >= ?1",
        )?;
        let row = stmt.query_row(params![format!("{today}T00:00:00+00:00")], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        Ok(Stats {
            total_sessions: row.0,
            total_tracked_ms: row.1,
            total_pauses: row.2,
            today_sessions: row.0,
            today_tracked_ms: row.1,
        })
    }

    pub fn stats_all(&self) -> Result<Stats, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(elapsed_ms), 0), COALESCE(SUM(pauses_used), 0)
             FROM work_sessions",
        )?;
        let row = stmt.query_row([], |row| {
            Ok((
                row.get::<_, u64>(0)?,
                row.get::<_, u64>(1)?,
                row.get::<_, u64>(2)?,
            ))
        })?;

        let mut stats = Stats {
            total_sessions: row.0,
            total_tracked_ms: row.1,
            total_pauses: row.2,
            ..Stats::default()
        };

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let mut stmt2 = self.conn.prepare(
            "SELECT COUNT(*), COALESCE(SUM(elapsed_ms), 0)
             FROM work_sessions
             WHERE completed_at >= ?1",
        )?;
        let row = stmt2.query_row(params![format!("{today}T00:00:00+00:00")], |row| {
            Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?))
        })?;
        stats.today_sessions = row.0;
        stats.today_tracked_ms = row.1;

        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Delete a value from the kv store.
    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
