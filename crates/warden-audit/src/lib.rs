//! # Warden Audit
//!
//! Append-only audit trail for access decisions and security events.
//!
//! ## Overview
//!
//! Records are written off the request path by an [`AuditRecorder`], which
//! owns a bounded queue and a single background worker. The worker appends
//! each record to an [`AuditStore`], partitioned into one JSON-lines segment
//! per category and UTC day:
//!
//! ```text
//! audit/2026/03/07.jsonl
//! system/security/2026/03/07.jsonl
//! system/task/2026/03/07.jsonl
//! ```
//!
//! Within a segment every record carries a blake3 chain hash linking it to
//! its predecessor, so edits and deletions are detectable with
//! [`AuditQueryService::verify`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use warden_audit::{
//!     AuditCategory, AuditQuery, AuditQueryService, AuditRecorder, AuditRecord,
//!     FileAuditStore, RecorderConfig, RequestContext,
//! };
//!
//! async fn example() {
//!     let store = Arc::new(FileAuditStore::open("/var/lib/warden").unwrap());
//!     let recorder = AuditRecorder::spawn(store.clone(), RecorderConfig::default()).unwrap();
//!
//!     let event = AuditRecord::event(
//!         "u1", "rotate-keys", "tenant", "t1", "scheduled", true, &RequestContext::new(),
//!     );
//!     recorder.record(AuditCategory::Task, event);
//!     recorder.flush().await;
//!
//!     let page = AuditQueryService::new(store)
//!         .query(AuditCategory::Task, &AuditQuery::new().principal("u1"), None)
//!         .await
//!         .unwrap();
//!     assert_eq!(page.total, 1);
//! }
//! ```
//!
//! ## Failure Model
//!
//! Audit failures never reach the caller of an evaluation. Appends are
//! retried with backoff and then counted as failed; a full queue drops
//! records according to the [`BackpressurePolicy`]. Read-side failures are
//! reported as [`AuditError::StorageUnavailable`].

pub mod chain;
pub mod error;
pub mod export;
pub mod file;
pub mod memory;
pub mod partition;
pub mod query;
pub mod queue;
pub mod record;
pub mod recorder;
pub mod store;

pub use chain::{chain_hash, verify_segment, IntegrityReport, GENESIS_HASH};
pub use error::{AuditError, Result};
pub use export::ExportFormat;
pub use file::FileAuditStore;
pub use memory::MemoryAuditStore;
pub use partition::SegmentKey;
pub use query::{AuditQuery, AuditQueryService, QueryPage};
pub use record::{AuditCategory, AuditDetails, AuditRecord, RequestContext};
pub use recorder::{AuditRecorder, BackpressurePolicy, RecorderConfig, RecorderStats};
pub use store::{AuditStore, Segment, SegmentEntry};
