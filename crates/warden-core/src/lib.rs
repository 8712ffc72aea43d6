//! # Warden Core
//!
//! Pure types for Warden: access control entries, principals, and decisions.
//!
//! This crate contains no I/O, no storage, no clocks. Everything here is a
//! value that the evaluator reads or produces.
//!
//! ## Key Types
//!
//! - [`AccessControlEntry`] - The authorization record attached to a resource
//! - [`EntryDraft`] - The loosely-typed wire form, validated into an entry
//! - [`Principal`] - The actor requesting access
//! - [`ResourceDescriptor`] - A resource together with its entry
//! - [`Decision`] - The outcome of one evaluation
//!
//! ## Validation
//!
//! Malformed entries are rejected when they are built, never when they are
//! evaluated. See [`validation`].

pub mod decision;
pub mod entry;
pub mod error;
pub mod principal;
pub mod types;
pub mod validation;

pub use decision::{Decision, DecisionReason};
pub use entry::{AccessControlEntry, EntryDraft, SYSTEM_SECURITY_GROUP};
pub use error::{Result, ValidationError};
pub use principal::{Principal, ResourceDescriptor};
pub use types::{AccessLevel, DataClassification, Permission, SensitivityLabel};
pub use validation::{normalize_entry, validate_draft};
