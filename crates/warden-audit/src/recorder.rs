//! Background audit recorder.
//!
//! [`AuditRecorder::record`] only enqueues. A single worker task owns every
//! append, so each segment is written in enqueue order, and a slow or
//! failing store never delays an access decision.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::{AuditError, Result};
use crate::queue::{Admission, BoundedQueue, PushError};
use crate::record::{AuditCategory, AuditRecord};
use crate::store::AuditStore;

/// What `record` does when the queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Evict the oldest queued record.
    #[default]
    DropOldest,
    /// Park the record behind the queue for up to the given time, then
    /// drop it. Parked records keep their call order.
    BlockWithTimeout(Duration),
}

/// Configuration for the recorder.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Records held in memory before backpressure applies.
    pub queue_capacity: usize,
    pub backpressure: BackpressurePolicy,
    /// Retries after the first failed append.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            backpressure: BackpressurePolicy::DropOldest,
            max_retries: 5,
            retry_base_delay: Duration::from_millis(50),
            retry_max_delay: Duration::from_secs(5),
        }
    }
}

/// Counters since the recorder started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecorderStats {
    /// Records accepted by `record`.
    pub enqueued: u64,
    /// Records appended to the store.
    pub written: u64,
    /// Records discarded by backpressure or after shutdown.
    pub dropped: u64,
    /// Records whose append failed after every retry.
    pub failed: u64,
    /// Records currently waiting in the queue.
    pub queued: usize,
}

type Job = (AuditCategory, AuditRecord);

struct Shared {
    queue: BoundedQueue<Job>,
    config: RecorderConfig,
    enqueued: AtomicU64,
    written: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    /// Records accepted and not yet written, failed or dropped.
    pending: AtomicU64,
    idle: Notify,
}

impl Shared {
    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }

    fn drop_record(&self, category: AuditCategory, record: &AuditRecord, why: &'static str) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            %category,
            principal = %record.principal_id,
            resource = %record.resource_id,
            reason = why,
            "audit record dropped"
        );
        self.settle();
    }

    fn drop_expired(&self) {
        for (category, record) in self.queue.take_expired() {
            self.drop_record(category, &record, "queue full after timeout");
        }
    }
}

/// Handle to the background audit writer. Cheap to clone.
#[derive(Clone)]
pub struct AuditRecorder {
    shared: Arc<Shared>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl AuditRecorder {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn AuditStore>, config: RecorderConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| AuditError::NoRuntime(e.to_string()))?;

        let shared = Arc::new(Shared {
            queue: BoundedQueue::new(config.queue_capacity),
            config,
            enqueued: AtomicU64::new(0),
            written: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            pending: AtomicU64::new(0),
            idle: Notify::new(),
        });

        let worker = runtime.spawn(run_worker(store, shared.clone()));
        tracing::info!(
            capacity = shared.queue.capacity(),
            policy = ?shared.config.backpressure,
            "audit recorder started"
        );

        Ok(Self {
            shared,
            worker: Arc::new(Mutex::new(Some(worker))),
        })
    }

    /// Enqueue a record for writing. Never blocks and never fails; records
    /// that cannot be queued are counted as dropped.
    pub fn record(&self, category: AuditCategory, record: AuditRecord) {
        let shared = &self.shared;
        shared.pending.fetch_add(1, Ordering::AcqRel);

        match shared.config.backpressure {
            BackpressurePolicy::DropOldest => match shared.queue.push_displacing((category, record)) {
                Ok(None) => {
                    shared.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Some((old_category, old_record))) => {
                    shared.enqueued.fetch_add(1, Ordering::Relaxed);
                    shared.drop_record(old_category, &old_record, "queue full");
                }
                Err(rejected) => {
                    let (category, record) = rejected.into_inner();
                    shared.drop_record(category, &record, "recorder shut down");
                }
            },
            BackpressurePolicy::BlockWithTimeout(timeout) => {
                match shared.queue.push_or_park((category, record), timeout) {
                    Ok(Admission::Queued) | Ok(Admission::Parked) => {
                        shared.enqueued.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(PushError::Full((category, record))) => {
                        shared.drop_record(category, &record, "queue full");
                    }
                    Err(PushError::Closed((category, record))) => {
                        shared.drop_record(category, &record, "recorder shut down");
                    }
                }
                shared.drop_expired();
            }
        }
    }

    /// Wait until every record accepted so far is written, failed or dropped.
    pub async fn flush(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop accepting records, drain the queue and wait for the worker.
    pub async fn shutdown(&self) {
        self.shared.queue.close();

        let worker = match self.worker.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::error!(error = %e, "audit recorder worker panicked");
            }
        }
    }

    pub fn stats(&self) -> RecorderStats {
        let shared = &self.shared;
        shared.drop_expired();
        RecorderStats {
            enqueued: shared.enqueued.load(Ordering::Relaxed),
            written: shared.written.load(Ordering::Relaxed),
            dropped: shared.dropped.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            queued: shared.queue.len(),
        }
    }
}

async fn run_worker(store: Arc<dyn AuditStore>, shared: Arc<Shared>) {
    while let Some((category, record)) = shared.queue.pop().await {
        shared.drop_expired();
        if write_with_retry(store.as_ref(), &shared.config, category, record).await {
            shared.written.fetch_add(1, Ordering::Relaxed);
        } else {
            shared.failed.fetch_add(1, Ordering::Relaxed);
        }
        shared.settle();
    }
    shared.drop_expired();
    tracing::info!("audit recorder stopped");
}

/// Append one record, retrying retryable failures. Returns whether it was
/// written.
async fn write_with_retry(
    store: &dyn AuditStore,
    config: &RecorderConfig,
    category: AuditCategory,
    record: AuditRecord,
) -> bool {
    let mut attempt = 0;
    loop {
        match store.append(category, record.clone()).await {
            Ok(_) => return true,
            Err(AuditError::SyncFailure(e)) => {
                tracing::error!(
                    %category,
                    principal = %record.principal_id,
                    resource = %record.resource_id,
                    error = %e,
                    "audit record written but not synced"
                );
                return true;
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt);
                tracing::warn!(
                    %category,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "audit append failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    %category,
                    principal = %record.principal_id,
                    resource_type = %record.resource_type,
                    resource = %record.resource_id,
                    action = %record.action,
                    attempts = attempt + 1,
                    error = %e,
                    "audit record lost"
                );
                return false;
            }
        }
    }
}

/// Exponential backoff capped at `retry_max_delay`, plus up to half again
/// of random jitter.
fn backoff_delay(config: &RecorderConfig, attempt: u32) -> Duration {
    let exp = config
        .retry_base_delay
        .saturating_mul(1u32 << attempt.min(16))
        .min(config.retry_max_delay);
    let half = (exp.as_millis() / 2) as u64;
    let jitter = if half == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..=half)
    };
    exp + Duration::from_millis(jitter)
}
