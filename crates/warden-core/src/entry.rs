//! Access control entries.
//!
//! An [`AccessControlEntry`] is attached to every protected resource. It is
//! created when the resource is registered, replaced wholesale when an owner
//! or administrator changes it, and never deleted.
//!
//! Entries can only be obtained through the typed constructors or through
//! validation of an [`EntryDraft`], so the following always hold:
//!
//! - authorization lists are either absent or non-empty;
//! - a `PRIVATE` entry lists its owner in `authorized_users`.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{AccessLevel, DataClassification, SensitivityLabel};
use crate::validation::{normalize_entry, normalize_set, validate_draft};

/// Security group authorized on system resources.
pub const SYSTEM_SECURITY_GROUP: &str = "system";

/// The authorization record attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntryDraft", into = "EntryDraft")]
pub struct AccessControlEntry {
    pub(crate) access_level: AccessLevel,
    pub(crate) owner_id: String,
    pub(crate) owner_tenant_id: Option<String>,
    pub(crate) authorized_organizations: Option<BTreeSet<String>>,
    pub(crate) authorized_security_groups: Option<BTreeSet<String>>,
    pub(crate) authorized_users: Option<BTreeSet<String>>,
    pub(crate) data_classification: DataClassification,
    pub(crate) sensitivity_labels: BTreeSet<SensitivityLabel>,
    pub(crate) access_expires_at: Option<DateTime<Utc>>,
    pub(crate) audit_enabled: bool,
}

impl AccessControlEntry {
    fn bare(access_level: AccessLevel, owner_id: impl Into<String>) -> Self {
        Self {
            access_level,
            owner_id: owner_id.into(),
            owner_tenant_id: None,
            authorized_organizations: None,
            authorized_security_groups: None,
            authorized_users: None,
            data_classification: DataClassification::default(),
            sensitivity_labels: BTreeSet::new(),
            access_expires_at: None,
            audit_enabled: true,
        }
    }

    /// The entry given to a resource registered without one.
    ///
    /// System resources are shared with [`SYSTEM_SECURITY_GROUP`]; everything
    /// else is private to its owner.
    pub fn new_default(
        owner_id: impl Into<String>,
        tenant_id: Option<String>,
        is_system_resource: bool,
    ) -> Self {
        let entry = if is_system_resource {
            Self::security_group(owner_id, [SYSTEM_SECURITY_GROUP])
        } else {
            Self::private(owner_id, Vec::<String>::new())
        };
        entry.with_tenant(tenant_id)
    }

    /// A public entry.
    pub fn public(owner_id: impl Into<String>) -> Self {
        Self::bare(AccessLevel::Public, owner_id)
    }

    /// An entry shared with members of the given organizations.
    pub fn organization<I, S>(owner_id: impl Into<String>, organizations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = Self::bare(AccessLevel::Organization, owner_id);
        entry.authorized_organizations = normalize_set(organizations);
        entry
    }

    /// An entry shared with members of the given security groups.
    pub fn security_group<I, S>(owner_id: impl Into<String>, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entry = Self::bare(AccessLevel::SecurityGroup, owner_id);
        entry.authorized_security_groups = normalize_set(groups);
        entry
    }

    /// A private entry. The owner is always added to the authorized users.
    pub fn private<I, S>(owner_id: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let owner_id = owner_id.into();
        let mut users: BTreeSet<String> = normalize_set(users).unwrap_or_default();
        users.insert(owner_id.clone());
        let mut entry = Self::bare(AccessLevel::Private, owner_id);
        entry.authorized_users = Some(users);
        entry
    }

    /// Parse and validate an entry from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let draft: EntryDraft = serde_json::from_str(json)
            .map_err(|e| crate::ValidationError::Malformed(e.to_string()))?;
        validate_draft(draft)
    }

    /// Re-validate a typed entry, e.g. before persisting an update.
    pub fn validate(self) -> Result<Self> {
        normalize_entry(self)
    }

    /// Set the owner's tenant.
    pub fn with_tenant(mut self, tenant_id: Option<String>) -> Self {
        self.owner_tenant_id = tenant_id;
        self
    }

    /// Set the data classification.
    pub fn with_classification(mut self, classification: DataClassification) -> Self {
        self.data_classification = classification;
        self
    }

    /// Add a sensitivity label. A blank label is ignored.
    pub fn with_label(mut self, label: impl Into<SensitivityLabel>) -> Self {
        let label = label.into();
        if !label.is_blank() {
            self.sensitivity_labels.insert(label);
        }
        self
    }

    /// Add several sensitivity labels, ignoring blank ones.
    pub fn with_labels<I, L>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<SensitivityLabel>,
    {
        labels
            .into_iter()
            .fold(self, |entry, label| entry.with_label(label))
    }

    /// Make access time-bounded.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.access_expires_at = Some(expires_at);
        self
    }

    /// Enable or disable audit recording for this resource.
    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    pub fn access_level(&self) -> AccessLevel {
        self.access_level
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn owner_tenant_id(&self) -> Option<&str> {
        self.owner_tenant_id.as_deref()
    }

    pub fn authorized_organizations(&self) -> Option<&BTreeSet<String>> {
        self.authorized_organizations.as_ref()
    }

    pub fn authorized_security_groups(&self) -> Option<&BTreeSet<String>> {
        self.authorized_security_groups.as_ref()
    }

    pub fn authorized_users(&self) -> Option<&BTreeSet<String>> {
        self.authorized_users.as_ref()
    }

    pub fn data_classification(&self) -> DataClassification {
        self.data_classification
    }

    pub fn sensitivity_labels(&self) -> &BTreeSet<SensitivityLabel> {
        &self.sensitivity_labels
    }

    pub fn access_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_expires_at
    }

    pub fn audit_enabled(&self) -> bool {
        self.audit_enabled
    }

    /// Whether time-bounded access has lapsed at `now`.
    ///
    /// The expiry instant itself counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_expires_at.is_some_and(|expires| now >= expires)
    }

    /// Whether `principal_id` owns the resource.
    pub fn is_owner(&self, principal_id: &str) -> bool {
        self.owner_id == principal_id
    }
}

/// Loosely-typed wire form of an entry.
///
/// Drafts are what upstream handlers deserialize from requests. They only
/// become entries through validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub access_level: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_organizations: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_security_groups: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_users: Option<Vec<String>>,

    #[serde(default = "default_classification")]
    pub data_classification: String,

    #[serde(default)]
    pub sensitivity_labels: Vec<String>,

    pub owner_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_tenant_id: Option<String>,

    #[serde(default = "default_audit_enabled")]
    pub access_log_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_expires_at: Option<DateTime<Utc>>,
}

fn default_classification() -> String {
    DataClassification::default().as_str().to_string()
}

fn default_audit_enabled() -> bool {
    true
}

impl EntryDraft {
    /// A draft with the given level and owner and every other field defaulted.
    pub fn new(access_level: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            access_level: access_level.into(),
            authorized_organizations: None,
            authorized_security_groups: None,
            authorized_users: None,
            data_classification: default_classification(),
            sensitivity_labels: Vec::new(),
            owner_id: owner_id.into(),
            owner_tenant_id: None,
            access_log_enabled: true,
            access_expires_at: None,
        }
    }
}

impl TryFrom<EntryDraft> for AccessControlEntry {
    type Error = crate::ValidationError;

    fn try_from(draft: EntryDraft) -> Result<Self> {
        validate_draft(draft)
    }
}

impl From<AccessControlEntry> for EntryDraft {
    fn from(entry: AccessControlEntry) -> Self {
        let to_vec = |set: Option<BTreeSet<String>>| set.map(|s| s.into_iter().collect());
        Self {
            access_level: entry.access_level.as_str().to_string(),
            authorized_organizations: to_vec(entry.authorized_organizations),
            authorized_security_groups: to_vec(entry.authorized_security_groups),
            authorized_users: to_vec(entry.authorized_users),
            data_classification: entry.data_classification.as_str().to_string(),
            sensitivity_labels: entry
                .sensitivity_labels
                .into_iter()
                .map(String::from)
                .collect(),
            owner_id: entry.owner_id,
            owner_tenant_id: entry.owner_tenant_id,
            access_log_enabled: entry.audit_enabled,
            access_expires_at: entry.access_expires_at,
        }
    }
}
