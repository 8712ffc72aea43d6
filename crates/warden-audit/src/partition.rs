//! Day partitioning of the audit trail.
//!
//! Records are stored in one segment per category and UTC day, at the
//! object key `{prefix}/YYYY/MM/DD.jsonl`.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::record::AuditCategory;

/// Identifies one day segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub category: AuditCategory,
    pub date: NaiveDate,
}

impl SegmentKey {
    pub fn new(category: AuditCategory, date: NaiveDate) -> Self {
        Self { category, date }
    }

    /// The segment a record with this timestamp lands in.
    pub fn for_timestamp(category: AuditCategory, timestamp: DateTime<Utc>) -> Self {
        Self::new(category, timestamp.date_naive())
    }

    /// Relative object key, always `/`-separated.
    pub fn object_key(&self) -> String {
        format!(
            "{}/{:04}/{:02}/{:02}.jsonl",
            self.category.prefix(),
            self.date.year(),
            self.date.month(),
            self.date.day()
        )
    }

    /// Location of the segment file under `root`.
    pub fn path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in self.category.prefix().split('/') {
            path.push(part);
        }
        path.push(format!("{:04}", self.date.year()));
        path.push(format!("{:02}", self.date.month()));
        path.push(format!("{:02}.jsonl", self.date.day()));
        path
    }

    /// Directory holding every segment of `category` under `root`.
    pub fn category_dir(category: AuditCategory, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for part in category.prefix().split('/') {
            path.push(part);
        }
        path
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_key())
    }
}
