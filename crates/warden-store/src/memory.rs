//! In-memory implementation of the EntryStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use warden_core::AccessControlEntry;

use crate::error::{Result, StoreError};
use crate::traits::{EntryStore, ResourceKey, StoredEntry};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Current entry per resource.
    current: HashMap<ResourceKey, StoredEntry>,

    /// Every version per resource, oldest first.
    history: HashMap<ResourceKey, Vec<StoredEntry>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn insert(&self, key: &ResourceKey, entry: &AccessControlEntry) -> Result<StoredEntry> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        if inner.current.contains_key(key) {
            return Err(StoreError::AlreadyExists(key.to_string()));
        }

        let stored = StoredEntry {
            key: key.clone(),
            entry: entry.clone(),
            version: 1,
            updated_at: Utc::now(),
        };
        inner.current.insert(key.clone(), stored.clone());
        inner
            .history
            .entry(key.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn get(&self, key: &ResourceKey) -> Result<Option<StoredEntry>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.current.get(key).cloned())
    }

    async fn update(
        &self,
        key: &ResourceKey,
        entry: &AccessControlEntry,
        expected_version: u64,
    ) -> Result<StoredEntry> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;

        let current = inner
            .current
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        if current.version != expected_version {
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current.version,
            });
        }

        let stored = StoredEntry {
            key: key.clone(),
            entry: entry.clone(),
            version: current.version + 1,
            updated_at: Utc::now(),
        };
        inner.current.insert(key.clone(), stored.clone());
        inner
            .history
            .entry(key.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn history(&self, key: &ResourceKey) -> Result<Vec<StoredEntry>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.history.get(key).cloned().unwrap_or_default())
    }

    async fn list_owned_by(&self, owner_id: &str) -> Result<Vec<StoredEntry>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;

        let mut owned: Vec<StoredEntry> = inner
            .current
            .values()
            .filter(|s| s.entry.is_owner(owner_id))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::EntryStoreExt;

    fn key(id: &str) -> ResourceKey {
        ResourceKey::new("document", id)
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let entry = AccessControlEntry::new_default("u1", None, false);

        let stored = store.insert(&key("a"), &entry).await.unwrap();
        assert_eq!(stored.version, 1);

        let fetched = store.get(&key("a")).await.unwrap().unwrap();
        assert_eq!(fetched.entry, entry);
        assert!(store.get(&key("b")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_duplicate_insert() {
        let store = MemoryStore::new();
        let entry = AccessControlEntry::public("u1");

        store.insert(&key("a"), &entry).await.unwrap();
        let again = store.insert(&key("a"), &entry).await;
        assert!(matches!(again, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_memory_store_version_conflict() {
        let store = MemoryStore::new();
        store
            .insert(&key("a"), &AccessControlEntry::public("u1"))
            .await
            .unwrap();

        let updated = AccessControlEntry::private("u1", ["u2"]);
        let v2 = store.update(&key("a"), &updated, 1).await.unwrap();
        assert_eq!(v2.version, 2);

        let stale = store
            .update(&key("a"), &AccessControlEntry::public("u1"), 1)
            .await;
        assert!(matches!(
            stale,
            Err(StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));

        let history = store.history(&key("a")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].entry, updated);
    }

    #[tokio::test]
    async fn test_memory_store_update_missing() {
        let store = MemoryStore::new();
        let result = store
            .update(&key("nope"), &AccessControlEntry::public("u1"), 1)
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_or_insert() {
        let store = MemoryStore::new();
        let first = store
            .get_or_insert(&key("a"), AccessControlEntry::public("u1"))
            .await
            .unwrap();
        let second = store
            .get_or_insert(&key("a"), AccessControlEntry::new_default("u9", None, false))
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_list_owned_by() {
        let store = MemoryStore::new();
        store
            .insert(&key("b"), &AccessControlEntry::public("u1"))
            .await
            .unwrap();
        store
            .insert(&key("a"), &AccessControlEntry::public("u1"))
            .await
            .unwrap();
        store
            .insert(&key("c"), &AccessControlEntry::public("u2"))
            .await
            .unwrap();

        let owned = store.list_owned_by("u1").await.unwrap();
        let ids: Vec<_> = owned.iter().map(|s| s.key.resource_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
