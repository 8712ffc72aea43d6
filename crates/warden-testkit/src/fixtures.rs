//! Test fixtures and helpers.
//!
//! Common principals, entries and audit test doubles for integration tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use warden_audit::{
    AuditCategory, AuditError, AuditRecord, AuditStore, MemoryAuditStore, Result, Segment,
    SegmentKey,
};
use warden_core::{
    AccessControlEntry, DataClassification, Permission, Principal, ResourceDescriptor,
};

/// A fixed evaluation instant, so expiry tests are reproducible.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53)
        .single()
        .unwrap_or_else(Utc::now)
}

/// A principal cleared for `INTERNAL` data holding the usual document
/// capabilities.
pub fn reader(id: &str) -> Principal {
    Principal::new(id)
        .with_clearance(DataClassification::Internal)
        .with_capability(Permission::Read)
}

/// Like [`reader`], with every owner-implicit capability.
pub fn editor(id: &str) -> Principal {
    reader(id).with_capabilities([
        Permission::Update,
        Permission::Delete,
        Permission::Download,
    ])
}

/// A principal with clearance but no capabilities at all.
pub fn owner(id: &str) -> Principal {
    Principal::new(id).with_clearance(DataClassification::Internal)
}

pub fn admin(id: &str) -> Principal {
    Principal::new(id).super_admin()
}

/// A `document` descriptor around `entry`.
pub fn document(id: &str, entry: AccessControlEntry) -> ResourceDescriptor {
    ResourceDescriptor::new("document", id, entry)
}

/// The end-to-end example: a private `INTERNAL` entry owned by `u1` with no
/// labels.
pub fn private_doc_of(owner_id: &str) -> ResourceDescriptor {
    document(
        "doc-1",
        AccessControlEntry::private(owner_id, Vec::<String>::new())
            .with_classification(DataClassification::Internal),
    )
}

/// An audit store whose appends always fail. Reads see an empty trail.
#[derive(Default)]
pub struct FailingAuditStore {
    attempts: AtomicU64,
    delay: Option<Duration>,
}

impl FailingAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait `delay` before failing each append, like a store that times out.
    pub fn slow(delay: Duration) -> Self {
        Self {
            attempts: AtomicU64::new(0),
            delay: Some(delay),
        }
    }

    /// Appends attempted so far, retries included.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuditStore for FailingAuditStore {
    async fn append(&self, _category: AuditCategory, _record: AuditRecord) -> Result<AuditRecord> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Err(AuditError::WriteFailure("audit sink unavailable".into()))
    }

    async fn read_segment(&self, key: &SegmentKey) -> Result<Segment> {
        Err(AuditError::StorageUnavailable(format!(
            "audit sink unavailable: {}",
            key
        )))
    }

    async fn list_segments(&self, _category: AuditCategory) -> Result<Vec<NaiveDate>> {
        Err(AuditError::StorageUnavailable("audit sink unavailable".into()))
    }

    async fn prune_before(&self, _category: AuditCategory, _cutoff: NaiveDate) -> Result<usize> {
        Err(AuditError::StorageUnavailable("audit sink unavailable".into()))
    }
}

/// A memory audit store pre-filled with `records`, appended in order.
pub async fn seeded_audit_store(
    category: AuditCategory,
    records: impl IntoIterator<Item = AuditRecord>,
) -> Result<MemoryAuditStore> {
    let store = MemoryAuditStore::new();
    for record in records {
        store.append(category, record).await?;
    }
    Ok(store)
}
