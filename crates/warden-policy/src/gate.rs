//! Data-governance gates.
//!
//! These checks are orthogonal to the access level: a principal who can
//! reach a resource still needs clearance for its classification and a grant
//! for every one of its sensitivity labels.

use std::collections::BTreeSet;

use warden_core::{DataClassification, Principal, SensitivityLabel};

/// Classification and label checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationGate;

impl ClassificationGate {
    /// Check clearance for a classification.
    ///
    /// `PUBLIC` content needs no clearance. Everything else needs an explicit
    /// grant for that exact classification; holding a higher one does not
    /// imply the lower ones.
    pub fn check_classification(
        &self,
        principal: &Principal,
        classification: DataClassification,
    ) -> bool {
        if principal.is_super_admin {
            return true;
        }

        match classification {
            DataClassification::Public => true,
            DataClassification::Internal
            | DataClassification::Confidential
            | DataClassification::Restricted => {
                principal.granted_classifications.contains(&classification)
            }
        }
    }

    /// Check that every label on the resource is granted to the principal.
    pub fn check_labels(&self, principal: &Principal, labels: &BTreeSet<SensitivityLabel>) -> bool {
        principal.is_super_admin || labels.is_subset(&principal.granted_labels)
    }

    /// Labels the principal would still need.
    pub fn missing_labels<'a>(
        &self,
        principal: &'a Principal,
        labels: &'a BTreeSet<SensitivityLabel>,
    ) -> Vec<&'a SensitivityLabel> {
        if principal.is_super_admin {
            return Vec::new();
        }
        labels.difference(&principal.granted_labels).collect()
    }
}
