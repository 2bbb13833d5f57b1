//! Durable result cache for AI actions.
//!
//! One JSON-serialized [`CacheEntry`] per cache key. There is no schema
//! versioning: an entry written by an older result shape fails to
//! deserialize and the caller decides what to do with that failure.
//!
//! `SqliteCacheStore` uses `rusqlite` in synchronous mode behind a mutex;
//! every operation is a single short statement.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::errors::ActionError;

// ─── Entries ────────────────────────────────────────────────────────────────

/// The last successful (or fallback) payload for one cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    /// Written from the static fallback table rather than a live reply.
    #[serde(default)]
    pub from_fallback: bool,
    pub saved_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn live(data: T) -> Self {
        Self {
            data,
            from_fallback: false,
            saved_at: Utc::now(),
        }
    }

    pub fn fallback(data: T) -> Self {
        Self {
            data,
            from_fallback: true,
            saved_at: Utc::now(),
        }
    }
}

/// Key-value storage for serialized cache entries.
pub trait CacheStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, ActionError>;
    fn write(&self, key: &str, value: &str) -> Result<(), ActionError>;
    fn remove(&self, key: &str) -> Result<(), ActionError>;
}

/// Read and decode the entry for `key`.
///
/// `Ok(None)` means nothing is stored. A stored value that does not decode
/// as `CacheEntry<T>` is an `Err`; callers typically log and discard it.
pub fn load_entry<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<CacheEntry<T>>, ActionError> {
    match store.read(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Encode and store `entry` under `key`.
pub fn save_entry<T: Serialize>(
    store: &dyn CacheStore,
    key: &str,
    entry: &CacheEntry<T>,
) -> Result<(), ActionError> {
    let raw = serde_json::to_string(entry)?;
    store.write(key, &raw)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── SQLite ─────────────────────────────────────────────────────────────────

/// SQLite-backed cache store.
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
}

impl SqliteCacheStore {
    /// Open (or create) the cache database at the given path.
    ///
    /// Pass `":memory:"` for an in-memory database (tests).
    pub fn open(path: &str) -> Result<Self, ActionError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS ai_cache (
                cache_key TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl CacheStore for SqliteCacheStore {
    fn read(&self, key: &str) -> Result<Option<String>, ActionError> {
        let payload = lock(&self.conn)
            .query_row(
                "SELECT payload FROM ai_cache WHERE cache_key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ActionError> {
        lock(&self.conn).execute(
            "INSERT INTO ai_cache (cache_key, payload, updated_at)
             VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(cache_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ActionError> {
        lock(&self.conn).execute("DELETE FROM ai_cache WHERE cache_key = ?1", params![key])?;
        Ok(())
    }
}

// ─── In-memory ──────────────────────────────────────────────────────────────

/// Process-local cache store.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryCacheStore {
    fn read(&self, key: &str) -> Result<Option<String>, ActionError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), ActionError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ActionError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
