//! SQLite-backed durable store
//!
//! One row per session key in `session_records`. Calls into SQLite block, so
//! each operation runs on the blocking thread pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

use super::DurableStore;
use crate::error::{Result, SessionError};
use crate::key::SessionKey;
use crate::record::SessionRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS session_records (
    key        TEXT PRIMARY KEY NOT NULL,
    data       BLOB NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// Durable store backed by a SQLite database
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        let store = Self::from_connection(conn)?;
        tracing::info!("Session store opened at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            op(&conn)
        })
        .await
        .map_err(|e| SessionError::StoreUnavailable(format!("sqlite task failed: {}", e)))?
    }
}

impl Clone for SqliteStore {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SessionError::StoreUnavailable(format!("corrupt created_at {:?}: {}", raw, e)))
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn exists(&self, key: &SessionKey) -> Result<bool> {
        let key = key.as_str().to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM session_records WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn get_or_create(&self, key: &SessionKey) -> Result<SessionRecord> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let row: Option<(Vec<u8>, String)> = conn
                .query_row(
                    "SELECT data, created_at FROM session_records WHERE key = ?1",
                    params![key.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                Some((data, created_at)) => {
                    let created_at = parse_timestamp(&created_at)?;
                    Ok(SessionRecord::restored(key, data, created_at))
                }
                None => Ok(SessionRecord::scaffold(key)),
            }
        })
        .await
    }

    async fn put(&self, record: &mut SessionRecord) -> Result<()> {
        let key = record.key().as_str().to_string();
        let data = record.data.clone();
        let created_at = record.created_at().unwrap_or_else(Utc::now).to_rfc3339();

        // The stored created_at wins over ours when the row already exists.
        let stored = self
            .with_conn(move |conn| {
                let stored: String = conn.query_row(
                    "INSERT INTO session_records (key, data, created_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET data = excluded.data
                     RETURNING created_at",
                    params![key, data, created_at],
                    |row| row.get(0),
                )?;
                parse_timestamp(&stored)
            })
            .await?;

        record.set_created_at(stored);
        record.mark_persisted();
        Ok(())
    }

    async fn delete(&self, record: &mut SessionRecord) -> Result<()> {
        let key = record.key().as_str().to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM session_records WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await?;
        record.mark_deleted();
        Ok(())
    }
}
