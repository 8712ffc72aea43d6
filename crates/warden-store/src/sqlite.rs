//! SQLite implementation of the EntryStore trait.
//!
//! This is the primary storage backend for access control entries. It uses
//! rusqlite with bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use warden_core::AccessControlEntry;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{EntryStore, ResourceKey, StoredEntry};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn encode_entry(entry: &AccessControlEntry) -> Result<String> {
    serde_json::to_string(entry).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_entry(json: &str) -> Result<AccessControlEntry> {
    // Deserialization runs entry validation.
    serde_json::from_str(json).map_err(|e| StoreError::InvalidData(e.to_string()))
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {}", ms)))
}

/// Raw row: (resource_type, resource_id, entry_json, version, updated_at).
type EntryRow = (String, String, String, i64, i64);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok((
        row.get("resource_type")?,
        row.get("resource_id")?,
        row.get("entry_json")?,
        row.get("version")?,
        row.get("updated_at")?,
    ))
}

fn row_to_stored((resource_type, resource_id, json, version, updated_at): EntryRow) -> Result<StoredEntry> {
    Ok(StoredEntry {
        key: ResourceKey::new(resource_type, resource_id),
        entry: decode_entry(&json)?,
        version: u64::try_from(version)
            .map_err(|_| StoreError::InvalidData(format!("negative version: {}", version)))?,
        updated_at: from_millis(updated_at)?,
    })
}

fn current_version(conn: &Connection, key: &ResourceKey) -> Result<Option<u64>> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM access_entries WHERE resource_type = ?1 AND resource_id = ?2",
            params![key.resource_type, key.resource_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.map(|v| v as u64))
}

#[async_trait]
impl EntryStore for SqliteStore {
    async fn insert(&self, key: &ResourceKey, entry: &AccessControlEntry) -> Result<StoredEntry> {
        let key = key.clone();
        let entry = entry.clone();
        let json = encode_entry(&entry)?;

        self.with_conn(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            if current_version(&tx, &key)?.is_some() {
                return Err(StoreError::AlreadyExists(key.to_string()));
            }

            tx.execute(
                "INSERT INTO access_entries
                    (resource_type, resource_id, owner_id, entry_json, version, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    key.resource_type,
                    key.resource_id,
                    entry.owner_id(),
                    json,
                    now.timestamp_millis()
                ],
            )?;
            tx.execute(
                "INSERT INTO access_entry_history
                    (resource_type, resource_id, version, entry_json, updated_at)
                 VALUES (?1, ?2, 1, ?3, ?4)",
                params![key.resource_type, key.resource_id, json, now.timestamp_millis()],
            )?;
            tx.commit()?;

            Ok(StoredEntry {
                key,
                entry,
                version: 1,
                updated_at: from_millis(now.timestamp_millis())?,
            })
        })
        .await
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<StoredEntry>> {
        let key = key.clone();

        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    "SELECT resource_type, resource_id, entry_json, version, updated_at
                     FROM access_entries WHERE resource_type = ?1 AND resource_id = ?2",
                    params![key.resource_type, key.resource_id],
                    read_row,
                )
                .optional()?;
            row.map(row_to_stored).transpose()
        })
        .await
    }

    async fn update(
        &self,
        key: &ResourceKey,
        entry: &AccessControlEntry,
        expected_version: u64,
    ) -> Result<StoredEntry> {
        let key = key.clone();
        let entry = entry.clone();
        let json = encode_entry(&entry)?;

        self.with_conn(move |conn| {
            let now = Utc::now();
            let tx = conn.transaction()?;

            // Versions are stored as INTEGER, so no row can hold a version
            // this large; it is always stale.
            let Some(next_version) = i64::try_from(expected_version)
                .ok()
                .and_then(|v| v.checked_add(1))
            else {
                return match current_version(&tx, &key)? {
                    None => Err(StoreError::NotFound(key.to_string())),
                    Some(actual) => Err(StoreError::VersionConflict {
                        key: key.to_string(),
                        expected: expected_version,
                        actual,
                    }),
                };
            };

            let changed = tx.execute(
                "UPDATE access_entries
                 SET owner_id = ?1, entry_json = ?2, version = ?3, updated_at = ?4
                 WHERE resource_type = ?5 AND resource_id = ?6 AND version = ?7",
                params![
                    entry.owner_id(),
                    json,
                    next_version,
                    now.timestamp_millis(),
                    key.resource_type,
                    key.resource_id,
                    expected_version as i64
                ],
            )?;

            if changed == 0 {
                return match current_version(&tx, &key)? {
                    None => Err(StoreError::NotFound(key.to_string())),
                    Some(actual) => Err(StoreError::VersionConflict {
                        key: key.to_string(),
                        expected: expected_version,
                        actual,
                    }),
                };
            }

            tx.execute(
                "INSERT INTO access_entry_history
                    (resource_type, resource_id, version, entry_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    key.resource_type,
                    key.resource_id,
                    next_version,
                    json,
                    now.timestamp_millis()
                ],
            )?;
            tx.commit()?;

            Ok(StoredEntry {
                key,
                entry,
                version: next_version as u64,
                updated_at: from_millis(now.timestamp_millis())?,
            })
        })
        .await
    }

    async fn history(&self, key: &ResourceKey) -> Result<Vec<StoredEntry>> {
        let key = key.clone();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT resource_type, resource_id, entry_json, version, updated_at
                 FROM access_entry_history
                 WHERE resource_type = ?1 AND resource_id = ?2
                 ORDER BY version ASC",
            )?;
            let rows = stmt
                .query_map(params![key.resource_type, key.resource_id], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(row_to_stored).collect()
        })
        .await
    }

    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<StoredEntry>> {
        let owner_id = owner_id.to_string();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT resource_type, resource_id, entry_json, version, updated_at
                 FROM access_entries
                 WHERE owner_id = ?1
                 ORDER BY resource_type, resource_id",
            )?;
            let rows = stmt
                .query_map(params![owner_id], read_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(row_to_stored).collect()
        })
        .await
    }
}
