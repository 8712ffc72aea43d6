//! Storage trait for audit segments.
//!
//! Stores are append-only: a record, once written, is never rewritten. The
//! only destructive operation is retention, which removes whole day segments.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::partition::SegmentKey;
use crate::record::{AuditCategory, AuditRecord};

/// One line of a segment as read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEntry {
    /// A line that parsed as a record. `line` is 1-based.
    Record { line: usize, record: AuditRecord },
    /// A line that did not parse. Kept so verification can report it.
    Malformed { line: usize, error: String },
}

impl SegmentEntry {
    pub fn record(&self) -> Option<&AuditRecord> {
        match self {
            SegmentEntry::Record { record, .. } => Some(record),
            SegmentEntry::Malformed { .. } => None,
        }
    }
}

/// The contents of one day segment, in write order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub key: SegmentKey,
    pub entries: Vec<SegmentEntry>,
}

impl Segment {
    pub fn empty(key: SegmentKey) -> Self {
        Self {
            key,
            entries: Vec::new(),
        }
    }

    /// Parse JSON lines. Blank lines are skipped but still counted.
    pub fn parse<'a>(key: SegmentKey, lines: impl IntoIterator<Item = &'a str>) -> Self {
        let entries = lines
            .into_iter()
            .enumerate()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(idx, text)| match serde_json::from_str(text) {
                Ok(record) => SegmentEntry::Record {
                    line: idx + 1,
                    record,
                },
                Err(e) => SegmentEntry::Malformed {
                    line: idx + 1,
                    error: e.to_string(),
                },
            })
            .collect();

        Self { key, entries }
    }

    /// Records that parsed, in write order.
    pub fn records(&self) -> impl Iterator<Item = &AuditRecord> {
        self.entries.iter().filter_map(SegmentEntry::record)
    }

    /// Number of lines that did not parse.
    pub fn malformed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, SegmentEntry::Malformed { .. }))
            .count()
    }
}

/// The storage trait for the audit trail.
///
/// Implementations must be thread-safe (Send + Sync). `append` is called by
/// the recorder's single worker, but stores must still serialize appends to
/// the same segment themselves.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append a record to the segment for its timestamp's UTC day.
    ///
    /// Returns the record as written, with its chain hash filled in.
    async fn append(&self, category: AuditCategory, record: AuditRecord) -> Result<AuditRecord>;

    /// Read one segment. A segment that does not exist reads as empty.
    async fn read_segment(&self, key: &SegmentKey) -> Result<Segment>;

    /// Days that have a segment for `category`, oldest first.
    async fn list_segments(&self, category: AuditCategory) -> Result<Vec<NaiveDate>>;

    /// Remove every segment of `category` dated strictly before `cutoff`.
    ///
    /// Returns the number of segments removed.
    async fn prune_before(&self, category: AuditCategory, cutoff: NaiveDate) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_line_numbers() {
        let key = SegmentKey::new(
            AuditCategory::Task,
            NaiveDate::from_ymd_opt(2026, 4, 4).unwrap(),
        );
        let good = r#"{"principalId":"u1","action":"purge","resourceType":"job","resourceId":"j1","timestamp":"2026-04-04T00:00:00Z","sourceAddress":null,"clientAgent":null,"details":{"reason":"done","granted":true}}"#;
        let segment = Segment::parse(key, [good, "", "{not json", good]);

        assert_eq!(segment.entries.len(), 3);
        assert_eq!(segment.records().count(), 2);
        assert_eq!(segment.malformed_count(), 1);
        assert!(matches!(
            segment.entries[1],
            SegmentEntry::Malformed { line: 3, .. }
        ));
        assert!(matches!(segment.entries[2], SegmentEntry::Record { line: 4, .. }));
    }
}
