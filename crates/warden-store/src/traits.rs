//! EntryStore trait: the abstract interface for entry persistence.
//!
//! The store is the authoritative home of every resource's access control
//! entry. Implementations include SQLite (primary) and in-memory (for tests).

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{AccessControlEntry, ResourceDescriptor};

use crate::error::{Result, StoreError};

/// Identifies a protected resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKey {
    pub resource_type: String,
    pub resource_id: String,
}

impl ResourceKey {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_type, self.resource_id)
    }
}

/// An entry together with its concurrency metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: ResourceKey,
    pub entry: AccessControlEntry,
    /// Starts at 1 and increases by one on every update.
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StoredEntry {
    /// The evaluator's view of the resource.
    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor::new(
            self.key.resource_type.clone(),
            self.key.resource_id.clone(),
            self.entry.clone(),
        )
    }
}

/// The EntryStore trait: async interface for entry persistence.
///
/// # Design Notes
///
/// - **No deletes**: entries are superseded by updates, never removed.
/// - **Optimistic concurrency**: `update` succeeds only if the caller saw the
///   current version; otherwise it returns [`StoreError::VersionConflict`].
/// - **Atomic replacement**: readers see either the old or the new entry.
/// - **History**: every version ever written stays readable.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Register the entry for a new resource. The first version is 1.
    ///
    /// Returns [`StoreError::AlreadyExists`] if the resource is known.
    async fn insert(&self, key: &ResourceKey, entry: &AccessControlEntry) -> Result<StoredEntry>;

    /// Get the current entry for a resource.
    async fn get(&self, key: &ResourceKey) -> Result<Option<StoredEntry>>;

    /// Replace the entry if its current version is `expected_version`.
    async fn update(
        &self,
        key: &ResourceKey,
        entry: &AccessControlEntry,
        expected_version: u64,
    ) -> Result<StoredEntry>;

    /// All versions of a resource's entry, oldest first.
    async fn history(&self, key: &ResourceKey) -> Result<Vec<StoredEntry>>;

    /// Current entries of every resource owned by `owner_id`.
    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<StoredEntry>>;
}

/// Extension trait for common store patterns.
pub trait EntryStoreExt: EntryStore {
    /// Get the entry, or register `default` if the resource is unknown.
    ///
    /// A concurrent registration of the same resource is not an error: the
    /// winner's entry is returned.
    fn get_or_insert(
        &self,
        key: &ResourceKey,
        default: AccessControlEntry,
    ) -> impl std::future::Future<Output = Result<StoredEntry>> + Send;
}

impl<S: EntryStore + ?Sized> EntryStoreExt for S {
    async fn get_or_insert(
        &self,
        key: &ResourceKey,
        default: AccessControlEntry,
    ) -> Result<StoredEntry> {
        if let Some(stored) = self.get(key).await? {
            return Ok(stored);
        }

        match self.insert(key, &default).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::AlreadyExists(_)) => self
                .get(key)
                .await?
                .ok_or_else(|| StoreError::NotFound(key.to_string())),
            Err(e) => Err(e),
        }
    }
}
