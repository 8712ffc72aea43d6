//! Entry validation and normalization.
//!
//! Both the wire path ([`validate_draft`]) and the typed path
//! ([`normalize_entry`]) end in the same checks, so an entry that passed
//! either one is safe to evaluate.

use std::collections::BTreeSet;

use crate::entry::{AccessControlEntry, EntryDraft};
use crate::error::{Result, ValidationError};
use crate::types::{AccessLevel, DataClassification, SensitivityLabel};

/// Validate a draft and turn it into an entry.
///
/// This performs:
/// - Enum parsing for level and classification
/// - Owner and label checks
/// - Empty-list normalization
/// - Level/list consistency
/// - Owner injection for `PRIVATE`
pub fn validate_draft(draft: EntryDraft) -> Result<AccessControlEntry> {
    let access_level: AccessLevel = draft.access_level.parse()?;
    let data_classification: DataClassification = draft.data_classification.parse()?;

    if draft.sensitivity_labels.iter().any(|l| l.trim().is_empty()) {
        return Err(ValidationError::BlankLabel);
    }

    let entry = AccessControlEntry {
        access_level,
        owner_id: draft.owner_id,
        owner_tenant_id: draft.owner_tenant_id,
        authorized_organizations: draft.authorized_organizations.and_then(normalize_set),
        authorized_security_groups: draft.authorized_security_groups.and_then(normalize_set),
        authorized_users: draft.authorized_users.and_then(normalize_set),
        data_classification,
        sensitivity_labels: draft
            .sensitivity_labels
            .into_iter()
            .map(SensitivityLabel::from)
            .collect(),
        access_expires_at: draft.access_expires_at,
        audit_enabled: draft.access_log_enabled,
    };

    normalize_entry(entry)
}

/// Check and normalize a typed entry.
pub fn normalize_entry(mut entry: AccessControlEntry) -> Result<AccessControlEntry> {
    entry.owner_id = entry.owner_id.trim().to_string();
    if entry.owner_id.is_empty() {
        return Err(ValidationError::MissingOwner);
    }

    if entry.sensitivity_labels.iter().any(SensitivityLabel::is_blank) {
        return Err(ValidationError::BlankLabel);
    }

    entry.owner_tenant_id = entry
        .owner_tenant_id
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    entry.authorized_organizations = entry.authorized_organizations.and_then(normalize_set);
    entry.authorized_security_groups = entry.authorized_security_groups.and_then(normalize_set);
    entry.authorized_users = entry.authorized_users.and_then(normalize_set);

    check_consistency(&entry)?;

    if entry.access_level == AccessLevel::Private {
        entry
            .authorized_users
            .get_or_insert_with(BTreeSet::new)
            .insert(entry.owner_id.clone());
    }

    Ok(entry)
}

/// Trim, drop blanks and deduplicate. An empty result is `None`.
pub(crate) fn normalize_set<I, S>(values: I) -> Option<BTreeSet<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let set: BTreeSet<String> = values
        .into_iter()
        .map(|v| v.into().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    (!set.is_empty()).then_some(set)
}

/// A list that belongs to a different level than the declared one is
/// ambiguous, so it is rejected rather than ignored.
fn check_consistency(entry: &AccessControlEntry) -> Result<()> {
    let level = entry.access_level;
    let lists = [
        (
            "authorizedOrganizations",
            AccessLevel::Organization,
            entry.authorized_organizations.is_some(),
        ),
        (
            "authorizedSecurityGroups",
            AccessLevel::SecurityGroup,
            entry.authorized_security_groups.is_some(),
        ),
        (
            "authorizedUsers",
            AccessLevel::Private,
            entry.authorized_users.is_some(),
        ),
    ];

    for (field, owning_level, present) in lists {
        if present && owning_level != level {
            return Err(ValidationError::InconsistentAuthorization { field, level });
        }
    }

    Ok(())
}
