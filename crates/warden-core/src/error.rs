//! Error types for Warden Core.

use thiserror::Error;

use crate::types::AccessLevel;

/// Validation errors raised when an access control entry is constructed or
/// updated. Evaluation itself never fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown access level: {0}")]
    UnknownAccessLevel(String),

    #[error("unknown data classification: {0}")]
    UnknownClassification(String),

    #[error("owner id must not be empty")]
    MissingOwner,

    #[error("sensitivity labels must not be blank")]
    BlankLabel,

    #[error("{field} is not meaningful for access level {level}")]
    InconsistentAuthorization {
        field: &'static str,
        level: AccessLevel,
    },

    #[error("malformed entry: {0}")]
    Malformed(String),
}

/// Result type for validation.
pub type Result<T> = std::result::Result<T, ValidationError>;
