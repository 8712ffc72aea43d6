//! In-memory implementation of the AuditStore trait.
//!
//! Segments are kept as raw JSON lines so tests can tamper with them the way
//! an attacker would tamper with a file.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::chain::{chain_hash, GENESIS_HASH};
use crate::error::{AuditError, Result};
use crate::partition::SegmentKey;
use crate::record::{AuditCategory, AuditRecord};
use crate::store::{AuditStore, Segment};

#[derive(Default)]
struct MemorySegment {
    lines: Vec<String>,
    last_hash: Option<String>,
}

/// In-memory audit store. All data is lost when the store is dropped.
#[derive(Default)]
pub struct MemoryAuditStore {
    segments: Mutex<BTreeMap<SegmentKey, MemorySegment>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of lines across every segment of `category`.
    pub fn len(&self, category: AuditCategory) -> usize {
        self.segments
            .lock()
            .map(|segments| {
                segments
                    .iter()
                    .filter(|(key, _)| key.category == category)
                    .map(|(_, segment)| segment.lines.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self, category: AuditCategory) -> bool {
        self.len(category) == 0
    }

    /// Every record of `category` in write order, oldest segment first.
    pub fn records(&self, category: AuditCategory) -> Vec<AuditRecord> {
        let Ok(segments) = self.segments.lock() else {
            return Vec::new();
        };
        segments
            .iter()
            .filter(|(key, _)| key.category == category)
            .flat_map(|(_, segment)| segment.lines.iter())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Overwrite one stored line (1-based). Returns false if it does not exist.
    pub fn replace_line(&self, key: &SegmentKey, line: usize, contents: impl Into<String>) -> bool {
        let Ok(mut segments) = self.segments.lock() else {
            return false;
        };
        match segments
            .get_mut(key)
            .and_then(|segment| segment.lines.get_mut(line.wrapping_sub(1)))
        {
            Some(slot) => {
                *slot = contents.into();
                true
            }
            None => false,
        }
    }
}

fn poisoned() -> AuditError {
    AuditError::StorageUnavailable("memory audit store lock poisoned".into())
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn append(&self, category: AuditCategory, mut record: AuditRecord) -> Result<AuditRecord> {
        let key = SegmentKey::for_timestamp(category, record.timestamp);
        let mut segments = self
            .segments
            .lock()
            .map_err(|_| AuditError::WriteFailure("memory audit store lock poisoned".into()))?;
        let segment = segments.entry(key).or_default();

        let prev = segment.last_hash.as_deref().unwrap_or(GENESIS_HASH);
        let hash = chain_hash(prev, &record)?;
        record.chain_hash = Some(hash.clone());

        segment.lines.push(serde_json::to_string(&record)?);
        segment.last_hash = Some(hash);

        Ok(record)
    }

    async fn read_segment(&self, key: &SegmentKey) -> Result<Segment> {
        let segments = self.segments.lock().map_err(|_| poisoned())?;
        Ok(match segments.get(key) {
            Some(segment) => Segment::parse(*key, segment.lines.iter().map(String::as_str)),
            None => Segment::empty(*key),
        })
    }

    async fn list_segments(&self, category: AuditCategory) -> Result<Vec<NaiveDate>> {
        let segments = self.segments.lock().map_err(|_| poisoned())?;
        Ok(segments
            .keys()
            .filter(|key| key.category == category)
            .map(|key| key.date)
            .collect())
    }

    async fn prune_before(&self, category: AuditCategory, cutoff: NaiveDate) -> Result<usize> {
        let mut segments = self.segments.lock().map_err(|_| poisoned())?;
        let before = segments.len();
        segments.retain(|key, _| key.category != category || key.date >= cutoff);
        Ok(before - segments.len())
    }
}
