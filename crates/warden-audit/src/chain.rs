//! Per-segment hash chain.
//!
//! Every record in a segment carries `chainHash = blake3(prev || body)`,
//! where `prev` is the previous record's chain hash (or [`GENESIS_HASH`] for
//! the first record of the day) and `body` is the record's JSON with
//! `chainHash` omitted. Editing, removing or reordering a line breaks every
//! hash after it.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::AuditRecord;
use crate::store::{Segment, SegmentEntry};

/// Chain value preceding the first record of a segment.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Compute the chain hash of `record` following `prev`.
///
/// Any `chain_hash` already on the record is ignored.
pub fn chain_hash(prev: &str, record: &AuditRecord) -> Result<String> {
    let body = if record.chain_hash.is_some() {
        let mut unchained = record.clone();
        unchained.chain_hash = None;
        serde_json::to_vec(&unchained)?
    } else {
        serde_json::to_vec(record)?
    };

    let mut hasher = blake3::Hasher::new();
    hasher.update(prev.as_bytes());
    hasher.update(&body);
    Ok(hex::encode(hasher.finalize().as_bytes()))
}

/// Outcome of verifying one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub segment: String,
    pub total_lines: usize,
    pub verified: usize,
    /// Lines that did not parse as records.
    pub malformed_lines: Vec<usize>,
    /// First line (1-based) whose hash does not follow from its predecessor.
    pub first_break_at: Option<usize>,
    pub intact: bool,
}

/// Walk a segment from genesis and report where the chain breaks.
pub fn verify_segment(segment: &Segment) -> Result<IntegrityReport> {
    let mut prev = GENESIS_HASH.to_string();
    let mut verified = 0;
    let mut malformed_lines = Vec::new();
    let mut first_break_at = None;

    for entry in &segment.entries {
        match entry {
            SegmentEntry::Malformed { line, .. } => {
                malformed_lines.push(*line);
                first_break_at.get_or_insert(*line);
            }
            SegmentEntry::Record { line, record } => {
                let expected = chain_hash(&prev, record)?;
                match record.chain_hash.as_deref() {
                    Some(actual) if actual == expected => verified += 1,
                    _ => {
                        first_break_at.get_or_insert(*line);
                    }
                }
                // Continue from the stored value so one bad line is reported once.
                prev = record.chain_hash.clone().unwrap_or(expected);
            }
        }
    }

    Ok(IntegrityReport {
        segment: segment.key.object_key(),
        total_lines: segment.entries.len(),
        verified,
        intact: first_break_at.is_none(),
        malformed_lines,
        first_break_at,
    })
}
