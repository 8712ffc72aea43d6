//! # Warden
//!
//! Resource access control with an append-only, tamper-evident audit trail.
//!
//! ## Overview
//!
//! Every protected resource carries an access control entry: an access level
//! (public, organization, security group or private), a data classification,
//! sensitivity labels and an optional expiry. [`AccessControl`] stores those
//! entries, evaluates principals against them and records each decision.
//!
//! - **Evaluation** is pure and synchronous; it never waits on I/O.
//! - **Denials** are [`Decision`] values with a stable machine-readable
//!   reason, not errors.
//! - **Auditing** happens in the background and never changes a decision.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden::{AccessControl, WardenConfig};
//! use warden::audit::RequestContext;
//! use warden::core::{Permission, Principal};
//! use warden::store::ResourceKey;
//!
//! async fn example() {
//!     let config = WardenConfig::load("warden.toml").unwrap();
//!     let control = AccessControl::open(config).unwrap();
//!
//!     let key = ResourceKey::new("document", "q3-report");
//!     control
//!         .register_resource(&key, "u1", None, false, None)
//!         .await
//!         .unwrap();
//!
//!     let decision = control
//!         .authorize(&Principal::new("u2"), &key, &Permission::Read, &RequestContext::new())
//!         .await
//!         .unwrap();
//!     assert!(!decision.allowed);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `warden::core` - Entries, principals, decisions
//! - `warden::policy` - The policy evaluator and classification gate
//! - `warden::store` - Entry storage (SQLite and in-memory)
//! - `warden::audit` - Audit recorder, stores and queries

pub mod access;
pub mod config;
pub mod error;

pub use warden_audit as audit;
pub use warden_core as core;
pub use warden_policy as policy;
pub use warden_store as store;

pub use access::AccessControl;
pub use config::{AuditConfig, BackpressureMode, StoreConfig, WardenConfig};
pub use error::{Result, WardenError};

pub use warden_core::{
    AccessControlEntry, AccessLevel, DataClassification, Decision, DecisionReason, EntryDraft,
    Permission, Principal, ResourceDescriptor, SensitivityLabel,
};
