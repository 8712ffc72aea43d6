//! Strong type definitions for Warden.
//!
//! Enumerations that appear on the wire are parsed from strings through
//! [`FromStr`] so that unknown values surface as [`ValidationError`]s at
//! construction time rather than as surprises during evaluation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Coarse-grained authorization tier of a resource.
///
/// Variants are declared in priority order, highest reach first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessLevel {
    /// Anyone passing the governance gates.
    Public,
    /// Members of one of the authorized organizations.
    Organization,
    /// Members of one of the authorized security groups.
    SecurityGroup,
    /// The owner and explicitly authorized users.
    Private,
}

impl AccessLevel {
    /// All levels in priority order.
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::Public,
        AccessLevel::Organization,
        AccessLevel::SecurityGroup,
        AccessLevel::Private,
    ];

    /// Wire name of the level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "PUBLIC",
            AccessLevel::Organization => "ORGANIZATION",
            AccessLevel::SecurityGroup => "SECURITY_GROUP",
            AccessLevel::Private => "PRIVATE",
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccessLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownAccessLevel(s.to_string()))
    }
}

/// Sensitivity tier of resource content.
///
/// The derived ordering follows sensitivity: `Public < Internal < Confidential < Restricted`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataClassification {
    Public,
    #[default]
    Internal,
    Confidential,
    Restricted,
}

impl DataClassification {
    /// All classifications from least to most sensitive.
    pub const ALL: [DataClassification; 4] = [
        DataClassification::Public,
        DataClassification::Internal,
        DataClassification::Confidential,
        DataClassification::Restricted,
    ];

    /// Wire name of the classification.
    pub const fn as_str(&self) -> &'static str {
        match self {
            DataClassification::Public => "PUBLIC",
            DataClassification::Internal => "INTERNAL",
            DataClassification::Confidential => "CONFIDENTIAL",
            DataClassification::Restricted => "RESTRICTED",
        }
    }
}

impl fmt::Display for DataClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataClassification {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataClassification::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownClassification(s.to_string()))
    }
}

/// A content tag that requires a matching principal grant.
///
/// The canonical tags are modelled as variants; anything else is kept
/// verbatim in [`SensitivityLabel::Custom`]. Parsing always prefers the
/// canonical variant, so `"pii"` and `"PII"` are the same label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SensitivityLabel {
    Pii,
    Phi,
    Financial,
    Ip,
    Customer,
    Proprietary,
    Custom(String),
}

impl SensitivityLabel {
    /// Canonical labels.
    pub const CANONICAL: [SensitivityLabel; 6] = [
        SensitivityLabel::Pii,
        SensitivityLabel::Phi,
        SensitivityLabel::Financial,
        SensitivityLabel::Ip,
        SensitivityLabel::Customer,
        SensitivityLabel::Proprietary,
    ];

    /// Wire name of the label.
    pub fn as_str(&self) -> &str {
        match self {
            SensitivityLabel::Pii => "PII",
            SensitivityLabel::Phi => "PHI",
            SensitivityLabel::Financial => "FINANCIAL",
            SensitivityLabel::Ip => "IP",
            SensitivityLabel::Customer => "CUSTOMER",
            SensitivityLabel::Proprietary => "PROPRIETARY",
            SensitivityLabel::Custom(tag) => tag,
        }
    }

    /// Whether this is one of the canonical labels.
    pub fn is_canonical(&self) -> bool {
        !matches!(self, SensitivityLabel::Custom(_))
    }

    /// Whether the label carries no usable tag.
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

impl From<&str> for SensitivityLabel {
    fn from(s: &str) -> Self {
        let tag = s.trim();
        SensitivityLabel::CANONICAL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(tag))
            .unwrap_or_else(|| SensitivityLabel::Custom(tag.to_string()))
    }
}

impl From<String> for SensitivityLabel {
    fn from(s: String) -> Self {
        SensitivityLabel::from(s.as_str())
    }
}

impl From<SensitivityLabel> for String {
    fn from(label: SensitivityLabel) -> Self {
        match label {
            SensitivityLabel::Custom(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for SensitivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation a principal asks to perform on a resource.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Permission {
    Read,
    Update,
    Delete,
    Download,
    Share,
    Admin,
    Custom(String),
}

impl Permission {
    const NAMED: [Permission; 6] = [
        Permission::Read,
        Permission::Update,
        Permission::Delete,
        Permission::Download,
        Permission::Share,
        Permission::Admin,
    ];

    /// Wire name of the permission.
    pub fn as_str(&self) -> &str {
        match self {
            Permission::Read => "read",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::Download => "download",
            Permission::Share => "share",
            Permission::Admin => "admin",
            Permission::Custom(name) => name,
        }
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        let name = s.trim();
        Permission::NAMED
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| Permission::Custom(name.to_string()))
    }
}

impl From<String> for Permission {
    fn from(s: String) -> Self {
        Permission::from(s.as_str())
    }
}

impl From<Permission> for String {
    fn from(permission: Permission) -> Self {
        match permission {
            Permission::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_level_parse() {
        assert_eq!("PUBLIC".parse::<AccessLevel>().unwrap(), AccessLevel::Public);
        assert_eq!(
            "security_group".parse::<AccessLevel>().unwrap(),
            AccessLevel::SecurityGroup
        );
        assert!(matches!(
            "EVERYONE".parse::<AccessLevel>(),
            Err(ValidationError::UnknownAccessLevel(v)) if v == "EVERYONE"
        ));
    }

    #[test]
    fn test_classification_ordering() {
        assert!(DataClassification::Public < DataClassification::Internal);
        assert!(DataClassification::Internal < DataClassification::Confidential);
        assert!(DataClassification::Confidential < DataClassification::Restricted);
        assert_eq!(DataClassification::default(), DataClassification::Internal);
    }

    #[test]
    fn test_classification_unknown() {
        assert!(matches!(
            "TOP_SECRET".parse::<DataClassification>(),
            Err(ValidationError::UnknownClassification(_))
        ));
    }

    #[test]
    fn test_label_canonicalization() {
        assert_eq!(SensitivityLabel::from("pii"), SensitivityLabel::Pii);
        assert_eq!(SensitivityLabel::from(" FINANCIAL "), SensitivityLabel::Financial);
        assert_eq!(
            SensitivityLabel::from("EXPORT_CONTROLLED"),
            SensitivityLabel::Custom("EXPORT_CONTROLLED".into())
        );
        assert!(!SensitivityLabel::from("EXPORT_CONTROLLED").is_canonical());
    }

    #[test]
    fn test_label_serde_as_string() {
        let labels = vec![SensitivityLabel::Phi, SensitivityLabel::Custom("Legal".into())];
        let json = serde_json::to_string(&labels).unwrap();
        assert_eq!(json, r#"["PHI","Legal"]"#);
    }

    #[test]
    fn test_permission_parse() {
        assert_eq!(Permission::from("READ"), Permission::Read);
        assert_eq!(Permission::from("export"), Permission::Custom("export".into()));
    }
}
