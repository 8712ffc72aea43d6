//! Principals and resource descriptors.
//!
//! Both are supplied by callers: the principal by the identity layer, the
//! descriptor by whatever owns the resource.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entry::AccessControlEntry;
use crate::types::{DataClassification, Permission, SensitivityLabel};

/// The authenticated actor requesting access.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    #[serde(default)]
    pub security_groups: BTreeSet<String>,

    #[serde(default)]
    pub granted_classifications: BTreeSet<DataClassification>,

    #[serde(default)]
    pub granted_labels: BTreeSet<SensitivityLabel>,

    /// Base capabilities resolved from the principal's roles.
    #[serde(default)]
    pub capabilities: BTreeSet<Permission>,

    #[serde(default)]
    pub is_super_admin: bool,
}

impl Principal {
    /// A principal with no grants at all.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn in_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.security_groups.insert(group.into());
        self
    }

    pub fn with_clearance(mut self, classification: DataClassification) -> Self {
        self.granted_classifications.insert(classification);
        self
    }

    pub fn with_label(mut self, label: impl Into<SensitivityLabel>) -> Self {
        self.granted_labels.insert(label.into());
        self
    }

    pub fn with_capability(mut self, permission: impl Into<Permission>) -> Self {
        self.capabilities.insert(permission.into());
        self
    }

    pub fn with_capabilities<I, P>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Permission>,
    {
        self.capabilities
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn super_admin(mut self) -> Self {
        self.is_super_admin = true;
        self
    }

    /// Whether the principal holds the base capability for `permission`.
    pub fn has_capability(&self, permission: &Permission) -> bool {
        self.capabilities.contains(permission)
    }
}

/// A protected resource as seen by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub resource_type: String,
    pub resource_id: String,
    pub entry: AccessControlEntry,
}

impl ResourceDescriptor {
    pub fn new(
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        entry: AccessControlEntry,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            entry,
        }
    }

    pub fn owner_id(&self) -> &str {
        self.entry.owner_id()
    }

    pub fn classification(&self) -> DataClassification {
        self.entry.data_classification()
    }

    pub fn labels(&self) -> &BTreeSet<SensitivityLabel> {
        self.entry.sensitivity_labels()
    }
}
