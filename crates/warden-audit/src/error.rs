//! Error types for the audit module.

use thiserror::Error;

/// Errors that can occur while writing or reading the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// A record could not be appended. Retried by the recorder, never
    /// surfaced to the caller of an evaluation.
    #[error("audit write failed: {0}")]
    WriteFailure(String),

    /// The record was appended but flushing it to disk failed. Not retried:
    /// appending again would duplicate the line.
    #[error("audit sync failed: {0}")]
    SyncFailure(String),

    /// The audit store cannot be read right now.
    #[error("audit storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Query parameters are out of range.
    #[error("invalid audit query: {0}")]
    InvalidQuery(String),

    /// Filesystem error from a segment file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The recorder needs a tokio runtime to start its worker.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

impl AuditError {
    /// Whether retrying the same operation may succeed.
    ///
    /// `SyncFailure` is excluded: the record is already in the segment.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuditError::WriteFailure(_) | AuditError::StorageUnavailable(_) | AuditError::Io(_)
        )
    }
}

/// Result type for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;
