//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: Ready-made principals, entries and an evaluation instant
//! - **Test doubles**: [`FailingAuditStore`] for exercising audit failure paths
//! - **Generators**: Proptest strategies for principals, entries and permissions
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_policy::PolicyEvaluator;
//! use warden_testkit::generators::{entry, instant, permission, principal};
//!
//! proptest! {
//!     #[test]
//!     fn evaluation_is_deterministic(p in principal(), e in entry(), perm in permission(), now in instant()) {
//!         let resource = warden_testkit::document("doc-1", e);
//!         let evaluator = PolicyEvaluator::new();
//!         prop_assert_eq!(
//!             evaluator.evaluate_at(&p, &resource, &perm, now),
//!             evaluator.evaluate_at(&p, &resource, &perm, now),
//!         );
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden_core::Permission;
//! use warden_policy::PolicyEvaluator;
//! use warden_testkit::{fixed_now, owner, private_doc_of};
//!
//! let decision = PolicyEvaluator::new().evaluate_at(
//!     &owner("u1"),
//!     &private_doc_of("u1"),
//!     &Permission::Read,
//!     fixed_now(),
//! );
//! assert!(decision.allowed);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{
    admin, document, editor, fixed_now, owner, private_doc_of, reader, seeded_audit_store,
    FailingAuditStore,
};
pub use generators::PrivateDraftParams;
