//! Export of audit records as JSON or CSV.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};
use crate::record::AuditRecord;

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// A single JSON array.
    Json,
    /// A header row followed by one row per record (RFC 4180).
    Csv,
}

impl ExportFormat {
    pub const fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(AuditError::InvalidQuery(format!(
                "unknown export format: {}",
                other
            ))),
        }
    }
}

const CSV_COLUMNS: [&str; 14] = [
    "timestamp",
    "principalId",
    "action",
    "resourceType",
    "resourceId",
    "granted",
    "reason",
    "accessLevel",
    "dataClassification",
    "sensitivityLabels",
    "ownerId",
    "sourceAddress",
    "clientAgent",
    "chainHash",
];

/// Render `records` in `format`.
pub fn render(records: &[AuditRecord], format: ExportFormat) -> Result<Bytes> {
    match format {
        ExportFormat::Json => Ok(Bytes::from(serde_json::to_vec(records)?)),
        ExportFormat::Csv => Ok(render_csv(records)),
    }
}

fn render_csv(records: &[AuditRecord]) -> Bytes {
    let mut out = BytesMut::new();
    write_row(&mut out, CSV_COLUMNS.iter().map(|c| c.to_string()));

    for r in records {
        let d = &r.details;
        let labels = d
            .sensitivity_labels
            .as_ref()
            .map(|labels| {
                labels
                    .iter()
                    .map(|l| l.as_str())
                    .collect::<Vec<_>>()
                    .join(";")
            })
            .unwrap_or_default();

        write_row(
            &mut out,
            [
                r.timestamp.to_rfc3339(),
                r.principal_id.clone(),
                r.action.clone(),
                r.resource_type.clone(),
                r.resource_id.clone(),
                d.granted.to_string(),
                d.reason.clone(),
                d.access_level.map(|l| l.to_string()).unwrap_or_default(),
                d.data_classification
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
                labels,
                d.owner_id.clone().unwrap_or_default(),
                r.source_address.clone().unwrap_or_default(),
                r.client_agent.clone().unwrap_or_default(),
                r.chain_hash.clone().unwrap_or_default(),
            ],
        );
    }

    out.freeze()
}

fn write_row(out: &mut BytesMut, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.put_u8(b',');
        }
        out.put_slice(quote(&field).as_bytes());
    }
    out.put_slice(b"\r\n");
}

/// Quote a CSV field if it contains a delimiter, quote or line break.
fn quote(field: &str) -> std::borrow::Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\"")).into()
    } else {
        field.into()
    }
}
