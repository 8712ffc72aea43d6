//! Audit records and categories.
//!
//! One [`AuditRecord`] is written per JSON line. Records are immutable once
//! written; the only field filled in by the store is `chain_hash`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_core::{
    AccessLevel, DataClassification, Decision, DecisionReason, Permission, Principal,
    ResourceDescriptor, SensitivityLabel,
};

/// Which log a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditCategory {
    /// Access decisions.
    Audit,
    /// Security-relevant events (entry changes, policy violations).
    Security,
    /// Background task events.
    Task,
}

impl AuditCategory {
    pub const ALL: [AuditCategory; 3] = [
        AuditCategory::Audit,
        AuditCategory::Security,
        AuditCategory::Task,
    ];

    /// Object-key prefix of the category's segments.
    pub const fn prefix(&self) -> &'static str {
        match self {
            AuditCategory::Audit => "audit",
            AuditCategory::Security => "system/security",
            AuditCategory::Task => "system/task",
        }
    }

    /// How far back a query looks when no start is given.
    pub const fn default_lookback_days(&self) -> i64 {
        match self {
            AuditCategory::Audit => 365,
            AuditCategory::Security | AuditCategory::Task => 90,
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditCategory::Audit => "audit",
            AuditCategory::Security => "security",
            AuditCategory::Task => "task",
        })
    }
}

/// Where a request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_address(mut self, address: impl Into<String>) -> Self {
        self.source_address = Some(address.into());
        self
    }

    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.client_agent = Some(agent.into());
        self
    }
}

/// Decision details carried by a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditDetails {
    pub reason: String,
    pub granted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_classification: Option<DataClassification>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensitivity_labels: Option<Vec<SensitivityLabel>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    /// Free-form context.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An immutable log entry capturing one evaluation or event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub principal_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    pub source_address: Option<String>,
    pub client_agent: Option<String>,
    pub details: AuditDetails,

    /// Link to the previous record of the same segment. Set by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_hash: Option<String>,
}

impl AuditRecord {
    /// Record an access decision.
    pub fn for_decision(
        principal: &Principal,
        resource: &ResourceDescriptor,
        permission: &Permission,
        decision: &Decision,
        ctx: &RequestContext,
    ) -> Self {
        let entry = &resource.entry;
        let labels: Vec<SensitivityLabel> = entry.sensitivity_labels().iter().cloned().collect();

        Self {
            principal_id: principal.id.clone(),
            action: permission.to_string(),
            resource_type: resource.resource_type.clone(),
            resource_id: resource.resource_id.clone(),
            timestamp: decision.evaluated_at,
            source_address: ctx.source_address.clone(),
            client_agent: ctx.client_agent.clone(),
            details: AuditDetails {
                reason: decision.reason.to_string(),
                granted: decision.allowed,
                access_level: Some(entry.access_level()),
                data_classification: Some(entry.data_classification()),
                sensitivity_labels: (!labels.is_empty()).then_some(labels),
                owner_id: Some(entry.owner_id().to_string()),
                extra: Map::new(),
            },
            chain_hash: None,
        }
    }

    /// Record a non-decision event (security or task log).
    pub fn event(
        principal_id: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        reason: impl Into<String>,
        granted: bool,
        ctx: &RequestContext,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            timestamp: Utc::now(),
            source_address: ctx.source_address.clone(),
            client_agent: ctx.client_agent.clone(),
            details: AuditDetails {
                reason: reason.into(),
                granted,
                access_level: None,
                data_classification: None,
                sensitivity_labels: None,
                owner_id: None,
                extra: Map::new(),
            },
            chain_hash: None,
        }
    }

    /// Attach a free-form detail.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.extra.insert(key.into(), value.into());
        self
    }

    /// Override the timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The decision this record captured, if it captured one.
    pub fn decision(&self) -> Option<Decision> {
        let reason: DecisionReason =
            serde_json::from_value(Value::String(self.details.reason.clone())).ok()?;
        Some(Decision {
            allowed: self.details.granted,
            reason,
            evaluated_at: self.timestamp,
        })
    }
}
