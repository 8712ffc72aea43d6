//! The policy evaluator.
//!
//! Evaluation is a pure function of the principal, the resource, the
//! permission and the current time. It takes no locks, performs no I/O and
//! cannot fail: every path ends in a [`Decision`].

use chrono::{DateTime, Utc};
use tracing::debug;

use warden_core::{
    AccessControlEntry, AccessLevel, Decision, DecisionReason, Permission, Principal,
    ResourceDescriptor,
};

use crate::gate::ClassificationGate;

/// Orchestrates expiry, governance gates and access-level resolution.
///
/// The evaluator holds no state, so one instance can be shared by every
/// request handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEvaluator {
    gate: ClassificationGate,
}

impl PolicyEvaluator {
    /// Create a new evaluator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate against the wall clock.
    pub fn evaluate(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
        permission: &Permission,
    ) -> Decision {
        self.evaluate_at(principal, resource, permission, Utc::now())
    }

    /// Evaluate as of `now`.
    pub fn evaluate_at(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
        permission: &Permission,
        now: DateTime<Utc>,
    ) -> Decision {
        let reason = self.resolve(principal, &resource.entry, permission, now);

        debug!(
            principal = %principal.id,
            resource_type = %resource.resource_type,
            resource_id = %resource.resource_id,
            permission = %permission,
            reason = %reason,
            "access evaluated"
        );

        Decision::new(reason, now)
    }

    fn resolve(
        &self,
        principal: &Principal,
        entry: &AccessControlEntry,
        permission: &Permission,
        now: DateTime<Utc>,
    ) -> DecisionReason {
        // 1. Super-admins bypass every check
        if principal.is_super_admin {
            return DecisionReason::AdminOverride;
        }

        // 2. Time-bounded access
        if entry.is_expired_at(now) {
            return DecisionReason::Expired;
        }

        // 3. Classification clearance
        if !self
            .gate
            .check_classification(principal, entry.data_classification())
        {
            return DecisionReason::InsufficientClassificationClearance;
        }

        // 4. Every sensitivity label must be granted
        if !self.gate.check_labels(principal, entry.sensitivity_labels()) {
            return DecisionReason::MissingLabelGrant;
        }

        // 5. Base capability from the role catalog
        let is_owner = entry.is_owner(&principal.id);
        if !is_owner && !principal.has_capability(permission) {
            return DecisionReason::MissingBasePermission;
        }

        // 6. Access level. Only the declared level's branch is consulted.
        self.resolve_level(principal, entry, is_owner)
            // 7. Least privilege
            .unwrap_or(DecisionReason::AccessLevelCheckFailed)
    }

    /// Ownership only counts inside the `PRIVATE` branch. An owner of an
    /// `ORGANIZATION` resource outside the listed organizations is denied.
    fn resolve_level(
        &self,
        principal: &Principal,
        entry: &AccessControlEntry,
        is_owner: bool,
    ) -> Option<DecisionReason> {
        match entry.access_level() {
            AccessLevel::Public => Some(DecisionReason::Public),
            AccessLevel::Organization => {
                let org = principal.organization_id.as_ref()?;
                entry
                    .authorized_organizations()?
                    .contains(org)
                    .then_some(DecisionReason::OrganizationMember)
            }
            AccessLevel::SecurityGroup => entry
                .authorized_security_groups()?
                .iter()
                .any(|group| principal.security_groups.contains(group))
                .then_some(DecisionReason::SecurityGroupMember),
            AccessLevel::Private => {
                if is_owner {
                    Some(DecisionReason::Owner)
                } else {
                    entry
                        .authorized_users()?
                        .contains(&principal.id)
                        .then_some(DecisionReason::ExplicitGrant)
                }
            }
        }
    }
}
