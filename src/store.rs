//! Durable history persistence.
//!
//! The significant-change log and the trip log are each stored as a
//! single serialized snapshot under a fixed key: every mutation
//! re-serializes and overwrites the whole collection, there is no
//! incremental append format. Malformed or missing snapshots degrade to
//! an empty collection; write failures are logged and swallowed, the
//! in-memory copy stays authoritative and the next mutation retries the
//! write by virtue of saving the full snapshot again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Snapshot key for the trip log.
pub const TRIPS_KEY: &str = "trips";

/// Snapshot key for the significant-change log.
pub const SIGNIFICANT_CHANGES_KEY: &str = "significant_location_changes";

// ============================================================================
// Record Store
// ============================================================================

/// Durable key/value record store: `get` returns the stored bytes or
/// absent, `set` overwrites synchronously.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// SQLite-backed record store with a single key/value table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a transient in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RecordStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO records (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// In-memory record store, useful for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.records.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

// ============================================================================
// History Store
// ============================================================================

/// Serializes history collections into whole-snapshot records.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn RecordStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Load a named snapshot. Absent or malformed data is treated as
    /// "no history", never surfaced as an error.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.store.get(key) {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    warn!(
                        "[HistoryStore] Malformed snapshot for '{}', treating as empty: {}",
                        key, e
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("[HistoryStore] Read of '{}' failed, treating as empty: {}", key, e);
                Vec::new()
            }
        }
    }

    /// Serialize and overwrite a named snapshot. Failures are logged;
    /// the caller's in-memory copy remains the source of truth.
    pub fn save<T: Serialize>(&self, key: &str, records: &[T]) {
        let bytes = match serde_json::to_vec(records) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[HistoryStore] Could not serialize '{}': {}", key, e);
                return;
            }
        };

        match self.store.set(key, &bytes) {
            Ok(()) => debug!("[HistoryStore] Saved '{}' ({} bytes)", key, bytes.len()),
            Err(e) => warn!(
                "[HistoryStore] Write of '{}' failed, in-memory state stays authoritative: {}",
                key, e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LocationSample, Trip};
    use chrono::Utc;

    #[test]
    fn test_sqlite_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get("missing").unwrap().is_none());

        store.set("k", b"first").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"first");

        // Overwrite replaces the previous value
        store.set("k", b"second").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_sqlite_reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.set("trips", b"[]").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("trips").unwrap().unwrap(), b"[]");
    }

    #[test]
    fn test_history_load_absent_is_empty() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        let trips: Vec<Trip> = history.load(TRIPS_KEY);
        assert!(trips.is_empty());
    }

    #[test]
    fn test_history_load_malformed_is_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set(TRIPS_KEY, b"{not json").unwrap();

        let history = HistoryStore::new(store);
        let trips: Vec<Trip> = history.load(TRIPS_KEY);
        assert!(trips.is_empty());
    }

    #[test]
    fn test_history_roundtrip() {
        let history = HistoryStore::new(Arc::new(MemoryStore::new()));
        let now = Utc::now();
        let trips = vec![Trip::new(now, vec![LocationSample::new(now, 1.0, 2.0)])];

        history.save(TRIPS_KEY, &trips);
        let loaded: Vec<Trip> = history.load(TRIPS_KEY);

        assert_eq!(loaded, trips);
    }

    #[test]
    fn test_history_write_failure_swallowed() {
        struct FailingStore;

        impl RecordStore for FailingStore {
            fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
                Err(crate::error::TrackError::Persistence("read failed".into()))
            }
            fn set(&self, _key: &str, _value: &[u8]) -> Result<()> {
                Err(crate::error::TrackError::Persistence("write failed".into()))
            }
        }

        let history = HistoryStore::new(Arc::new(FailingStore));
        let now = Utc::now();
        let trips = vec![Trip::new(now, vec![])];

        // Neither call panics or propagates; load degrades to empty.
        history.save(TRIPS_KEY, &trips);
        let loaded: Vec<Trip> = history.load(TRIPS_KEY);
        assert!(loaded.is_empty());
    }
}
