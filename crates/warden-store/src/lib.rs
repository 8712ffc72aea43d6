//! # Warden Store
//!
//! Authoritative storage for access control entries. Provides a trait-based
//! interface with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The store module abstracts entry storage behind the [`EntryStore`] trait,
//! allowing the access-control facade to be storage-agnostic. The primary
//! implementation is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`EntryStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`StoredEntry`] - An entry with its version and timestamp
//! - [`ResourceKey`] - Resource type and id
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_core::AccessControlEntry;
//! use warden_store::{EntryStore, ResourceKey, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("entries.db").unwrap();
//!     let key = ResourceKey::new("document", "doc-1");
//!
//!     let stored = store
//!         .insert(&key, &AccessControlEntry::new_default("u1", None, false))
//!         .await
//!         .unwrap();
//!
//!     // Updates must name the version they were based on
//!     let shared = AccessControlEntry::private("u1", ["u2"]);
//!     store.update(&key, &shared, stored.version).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Never deleted**: entries are superseded, and every version is kept
//! - **Optimistic concurrency**: stale updates fail with `VersionConflict`
//! - **Validated on read**: stored JSON goes back through entry validation

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{EntryStore, EntryStoreExt, ResourceKey, StoredEntry};
