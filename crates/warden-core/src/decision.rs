//! Authorization decisions.
//!
//! A denial is an ordinary [`Decision`], not an error. The reason is a stable
//! machine-readable string so callers can render their own messaging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionReason {
    // Allow reasons.
    AdminOverride,
    Public,
    OrganizationMember,
    SecurityGroupMember,
    Owner,
    ExplicitGrant,

    // Deny reasons.
    Expired,
    InsufficientClassificationClearance,
    MissingLabelGrant,
    MissingBasePermission,
    AccessLevelCheckFailed,
}

impl DecisionReason {
    /// Stable wire string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::AdminOverride => "admin-override",
            DecisionReason::Public => "public",
            DecisionReason::OrganizationMember => "organization-member",
            DecisionReason::SecurityGroupMember => "security-group-member",
            DecisionReason::Owner => "owner",
            DecisionReason::ExplicitGrant => "explicit-grant",
            DecisionReason::Expired => "expired",
            DecisionReason::InsufficientClassificationClearance => {
                "insufficient-classification-clearance"
            }
            DecisionReason::MissingLabelGrant => "missing-label-grant",
            DecisionReason::MissingBasePermission => "missing-base-permission",
            DecisionReason::AccessLevelCheckFailed => "access-level-check-failed",
        }
    }

    /// Whether this reason accompanies a denial.
    pub const fn is_denial(&self) -> bool {
        matches!(
            self,
            DecisionReason::Expired
                | DecisionReason::InsufficientClassificationClearance
                | DecisionReason::MissingLabelGrant
                | DecisionReason::MissingBasePermission
                | DecisionReason::AccessLevelCheckFailed
        )
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The typed outcome of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub evaluated_at: DateTime<Utc>,
}

impl Decision {
    /// Build a decision; `allowed` is derived from the reason.
    pub fn new(reason: DecisionReason, evaluated_at: DateTime<Utc>) -> Self {
        Self {
            allowed: !reason.is_denial(),
            reason,
            evaluated_at,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_follows_reason() {
        let now = Utc::now();
        assert!(Decision::new(DecisionReason::Owner, now).allowed);
        assert!(!Decision::new(DecisionReason::Expired, now).allowed);
    }

    #[test]
    fn test_reason_wire_format() {
        let json = serde_json::to_string(&DecisionReason::InsufficientClassificationClearance)
            .unwrap();
        assert_eq!(json, "\"insufficient-classification-clearance\"");

        for reason in [
            DecisionReason::AdminOverride,
            DecisionReason::SecurityGroupMember,
            DecisionReason::AccessLevelCheckFailed,
        ] {
            let json = serde_json::to_string(&reason).unwrap();
            assert_eq!(json, format!("\"{}\"", reason.as_str()));
        }
    }

    #[test]
    fn test_decision_json_shape() {
        let decision = Decision::new(DecisionReason::Public, Utc::now());
        let value = serde_json::to_value(&decision).unwrap();

        assert_eq!(value["allowed"], true);
        assert_eq!(value["reason"], "public");
        assert!(value["evaluatedAt"].is_string());
    }
}
