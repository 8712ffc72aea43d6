//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Entry serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No entry is registered for the resource.
    #[error("entry not found: {0}")]
    NotFound(String),

    /// An entry is already registered for the resource.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic concurrency check failed.
    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Stored entry failed validation.
    #[error("invalid entry: {0}")]
    Validation(#[from] warden_core::ValidationError),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking storage task panicked or was cancelled.
    #[error("storage task failed: {0}")]
    Task(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
