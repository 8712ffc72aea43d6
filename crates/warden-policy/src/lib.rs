//! # Warden Policy
//!
//! Deterministic authorization decisions.
//!
//! ## Overview
//!
//! Given a [`Principal`](warden_core::Principal), a
//! [`ResourceDescriptor`](warden_core::ResourceDescriptor) and a
//! [`Permission`](warden_core::Permission), the [`PolicyEvaluator`] produces a
//! [`Decision`](warden_core::Decision). Checks run in a fixed order and the
//! first one that settles the outcome wins:
//!
//! 1. Super-admin override
//! 2. Expiry (`now >= accessExpiresAt` is expired)
//! 3. Classification clearance
//! 4. Sensitivity labels (all of them)
//! 5. Base capability, unless the principal owns the resource
//! 6. The entry's access level
//! 7. Otherwise deny
//!
//! ## Usage
//!
//! ```rust
//! use warden_core::{AccessControlEntry, DataClassification, Permission, Principal, ResourceDescriptor};
//! use warden_policy::PolicyEvaluator;
//!
//! let evaluator = PolicyEvaluator::new();
//! let entry = AccessControlEntry::new_default("u1", None, false);
//! let resource = ResourceDescriptor::new("document", "doc-1", entry);
//! let owner = Principal::new("u1").with_clearance(DataClassification::Internal);
//!
//! let decision = evaluator.evaluate(&owner, &resource, &Permission::Read);
//! assert!(decision.allowed);
//! ```

pub mod evaluator;
pub mod gate;

pub use evaluator::PolicyEvaluator;
pub use gate::ClassificationGate;
