//! Error types for the access-control facade.

use thiserror::Error;
use warden_audit::AuditError;
use warden_core::ValidationError;
use warden_store::{ResourceKey, StoreError};

/// Errors that can occur during facade operations.
///
/// Denials are not errors: they come back as a [`warden_core::Decision`].
#[derive(Debug, Error)]
pub enum WardenError {
    /// A submitted entry is malformed.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Entry storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Audit trail error (query, export, verification or retention).
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// The actor may not perform this change.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// No entry is registered for the resource.
    #[error("resource not found: {0}")]
    ResourceNotFound(ResourceKey),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl WardenError {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            WardenError::Audit(e) => e.is_retryable(),
            WardenError::Store(StoreError::VersionConflict { .. }) => true,
            _ => false,
        }
    }
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, WardenError>;
