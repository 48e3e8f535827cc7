//! Query history and saved searches, persisted in SQLite.
//!
//! History is last-write-wins per query string, capped on read. Writes happen
//! off the query path (the engine appends from a blocking task), so a slow or
//! broken history store can never delay search results.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use thiserror::Error;

use crate::interface::{HistoryEntry, SavedSearch};

/// Default number of entries returned by `recent`.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub struct HistoryStore {
    pool: Pool<SqliteConnectionManager>,
}

impl HistoryStore {
    pub fn open(path: &Path) -> Result<Self, HistoryError> {
        Self::with_manager(SqliteConnectionManager::file(path))
    }

    /// In-memory store, for tests and ephemeral sessions.
    pub fn open_in_memory() -> Result<Self, HistoryError> {
        // A single connection so every handle sees the same memory database.
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn with_manager(manager: SqliteConnectionManager) -> Result<Self, HistoryError> {
        let manager = manager.with_init(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), HistoryError> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS history (
                query TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                result_count INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_timestamp
                ON history (timestamp DESC);
            CREATE TABLE IF NOT EXISTS saved_searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                query TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_used_at TEXT
            );",
        )?;
        Ok(())
    }

    // ─── history ─────────────────────────────────────────────────

    /// Record a query. Repeating a query updates its timestamp and count
    /// rather than creating a duplicate row.
    pub fn append(&self, query: &str, result_count: u32) -> Result<(), HistoryError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO history (query, timestamp, result_count)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(query) DO UPDATE SET
                 timestamp = excluded.timestamp,
                 result_count = excluded.result_count",
            params![query, Utc::now().to_rfc3339(), result_count],
        )?;
        Ok(())
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>, HistoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT query, timestamp, result_count FROM history
             ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                query: row.get(0)?,
                timestamp: parse_timestamp(row.get::<_, String>(1)?),
                result_count: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn remove(&self, query: &str) -> Result<bool, HistoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute("DELETE FROM history WHERE query = ?1", params![query])?;
        Ok(changed > 0)
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM history", [])?;
        Ok(())
    }

    /// Prefix-matched past queries for typeahead, most recent first.
    pub fn suggestions(&self, prefix: &str, limit: usize) -> Result<Vec<String>, HistoryError> {
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT query FROM history
             WHERE LOWER(query) LIKE ?1 ESCAPE '\\'
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let pattern = format!("{}%", escape_like(&prefix));
        let rows = stmt.query_map(params![pattern, limit as i64], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    // ─── saved searches ──────────────────────────────────────────

    pub fn save_search(&self, name: &str, query: &str) -> Result<SavedSearch, HistoryError> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO saved_searches (name, query, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET query = excluded.query",
            params![name, query, now.to_rfc3339()],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM saved_searches WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(SavedSearch {
            id,
            name: name.to_string(),
            query: query.to_string(),
            created_at: now,
            last_used_at: None,
        })
    }

    pub fn rename_saved(&self, id: i64, name: &str) -> Result<bool, HistoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE saved_searches SET name = ?1 WHERE id = ?2",
            params![name, id],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_saved(&self, id: i64) -> Result<bool, HistoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute("DELETE FROM saved_searches WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Mark a saved search as used now.
    pub fn touch_saved(&self, id: i64) -> Result<bool, HistoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE saved_searches SET last_used_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        Ok(changed > 0)
    }

    pub fn list_saved(&self) -> Result<Vec<SavedSearch>, HistoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, query, created_at, last_used_at FROM saved_searches
             ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SavedSearch {
                id: row.get(0)?,
                name: row.get(1)?,
                query: row.get(2)?,
                created_at: parse_timestamp(row.get::<_, String>(3)?),
                last_used_at: row
                    .get::<_, Option<String>>(4)?
                    .map(parse_timestamp),
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
