//! Reading the audit trail back: filtered queries, export, verification and
//! retention.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::chain::{verify_segment, IntegrityReport};
use crate::error::{AuditError, Result};
use crate::export::{render, ExportFormat};
use crate::partition::SegmentKey;
use crate::record::{AuditCategory, AuditRecord};
use crate::store::AuditStore;

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

/// Filters and pagination for a query. Unset filters match everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    #[serde(default)]
    pub principal_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub resource_id: Option<String>,
    #[serde(default)]
    pub decision_granted: Option<bool>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

impl Default for AuditQuery {
    fn default() -> Self {
        Self {
            principal_id: None,
            action: None,
            resource_type: None,
            resource_id: None,
            decision_granted: None,
            from: None,
            to: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl AuditQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn principal(mut self, id: impl Into<String>) -> Self {
        self.principal_id = Some(id.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn resource(mut self, resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    pub fn granted(mut self, granted: bool) -> Self {
        self.decision_granted = Some(granted);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Check limits and the time range.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(AuditError::InvalidQuery(format!(
                "limit must be between 1 and {}, got {}",
                MAX_LIMIT, self.limit
            )));
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(AuditError::InvalidQuery(format!(
                    "from ({}) is after to ({})",
                    from, to
                )));
            }
        }
        Ok(())
    }

    /// The `[from, to]` range searched, filling in the category's defaults.
    pub fn resolved_range(&self, category: AuditCategory, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let to = self.to.unwrap_or(now);
        let from = self.from.unwrap_or_else(|| {
            to.checked_sub_signed(Duration::days(category.default_lookback_days()))
                .unwrap_or(DateTime::<Utc>::MIN_UTC)
        });
        (from, to)
    }

    fn matches(&self, record: &AuditRecord, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().map_or(true, |f| f == value)
        }

        record.timestamp >= from
            && record.timestamp <= to
            && eq(&self.principal_id, &record.principal_id)
            && eq(&self.action, &record.action)
            && eq(&self.resource_type, &record.resource_type)
            && eq(&self.resource_id, &record.resource_id)
            && self
                .decision_granted
                .map_or(true, |g| g == record.details.granted)
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    /// Matching records, newest first.
    pub records: Vec<AuditRecord>,
    /// Matches before pagination, over the segments that were scanned.
    pub total: usize,
    /// The deadline was hit before every segment was scanned.
    pub truncated: bool,
}

struct Scan {
    matched: Vec<AuditRecord>,
    truncated: bool,
}

/// Read side of the audit trail.
#[derive(Clone)]
pub struct AuditQueryService {
    store: Arc<dyn AuditStore>,
}

impl AuditQueryService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Run a query. Hitting `deadline` stops scanning and returns what was
    /// found so far with `truncated` set.
    pub async fn query(
        &self,
        category: AuditCategory,
        query: &AuditQuery,
        deadline: Option<Instant>,
    ) -> Result<QueryPage> {
        query.validate()?;
        let scan = self.scan(category, query, deadline).await?;

        let total = scan.matched.len();
        let records = scan
            .matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(QueryPage {
            records,
            total,
            truncated: scan.truncated,
        })
    }

    /// Every matching record rendered in `format`, ignoring pagination.
    pub async fn export(
        &self,
        category: AuditCategory,
        query: &AuditQuery,
        format: ExportFormat,
    ) -> Result<Bytes> {
        query.validate()?;
        let scan = self.scan(category, query, None).await?;
        render(&scan.matched, format)
    }

    /// Replay the hash chain of one day segment.
    pub async fn verify(&self, category: AuditCategory, date: NaiveDate) -> Result<IntegrityReport> {
        let segment = self
            .store
            .read_segment(&SegmentKey::new(category, date))
            .await
            .map_err(unavailable)?;
        verify_segment(&segment)
    }

    /// Remove segments older than `retention_days` before `today` in every
    /// category. Returns the number of segments removed. A window reaching
    /// past the earliest representable date keeps everything.
    pub async fn enforce_retention(&self, retention_days: u32, today: NaiveDate) -> Result<usize> {
        let cutoff = today
            .checked_sub_signed(Duration::days(i64::from(retention_days)))
            .unwrap_or(NaiveDate::MIN);
        let mut removed = 0;
        for category in AuditCategory::ALL {
            removed += self
                .store
                .prune_before(category, cutoff)
                .await
                .map_err(unavailable)?;
        }
        Ok(removed)
    }

    async fn scan(
        &self,
        category: AuditCategory,
        query: &AuditQuery,
        deadline: Option<Instant>,
    ) -> Result<Scan> {
        let (from, to) = query.resolved_range(category, Utc::now());
        let (first_day, last_day) = (from.date_naive(), to.date_naive());

        let mut days: Vec<NaiveDate> = self
            .store
            .list_segments(category)
            .await
            .map_err(unavailable)?
            .into_iter()
            .filter(|d| *d >= first_day && *d <= last_day)
            .collect();
        days.sort_unstable_by(|a, b| b.cmp(a));

        let mut matched = Vec::new();
        let mut truncated = false;

        for day in days {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                truncated = true;
                break;
            }
            let key = SegmentKey::new(category, day);
            let read = self.store.read_segment(&key);
            let segment = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, read).await {
                    Ok(segment) => segment,
                    Err(_) => {
                        truncated = true;
                        break;
                    }
                },
                None => read.await,
            }
            .map_err(unavailable)?;

            if segment.malformed_count() > 0 {
                tracing::warn!(
                    segment = %key,
                    malformed = segment.malformed_count(),
                    "skipping malformed audit lines"
                );
            }
            matched.extend(
                segment
                    .records()
                    .filter(|r| query.matches(r, from, to))
                    .cloned(),
            );
        }

        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(Scan { matched, truncated })
    }
}

/// Read-side failures are reported as retryable unavailability.
fn unavailable(e: AuditError) -> AuditError {
    match e {
        AuditError::WriteFailure(msg) => AuditError::StorageUnavailable(msg),
        AuditError::Io(e) => AuditError::StorageUnavailable(e.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAuditStore;
    use crate::record::RequestContext;
    use chrono::TimeZone;

    fn event(principal: &str, granted: bool, at: DateTime<Utc>) -> AuditRecord {
        AuditRecord::event(
            principal,
            "read",
            "document",
            "doc-1",
            if granted { "public" } else { "expired" },
            granted,
            &RequestContext::new(),
        )
        .at(at)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, hour, 0, 0).unwrap()
    }

    async fn seeded() -> (Arc<MemoryAuditStore>, AuditQueryService) {
        let store = Arc::new(MemoryAuditStore::new());
        for (day, hour, principal, granted) in [
            (1, 9, "u1", true),
            (1, 10, "u2", false),
            (2, 8, "u1", true),
            (3, 7, "u3", true),
            (3, 12, "u1", false),
        ] {
            store
                .append(AuditCategory::Audit, event(principal, granted, at(day, hour)))
                .await
                .unwrap();
        }
        let service = AuditQueryService::new(store.clone());
        (store, service)
    }

    fn september() -> AuditQuery {
        AuditQuery::new().between(at(1, 0), at(30, 0))
    }

    #[tokio::test]
    async fn test_query_merges_days_newest_first() {
        let (_, service) = seeded().await;
        let page = service
            .query(AuditCategory::Audit, &september(), None)
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        assert!(!page.truncated);
        let times: Vec<_> = page.records.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            times,
            vec![at(3, 12), at(3, 7), at(2, 8), at(1, 10), at(1, 9)]
        );
    }

    #[tokio::test]
    async fn test_query_filters_and_paginates() {
        let (_, service) = seeded().await;

        let page = service
            .query(
                AuditCategory::Audit,
                &september().principal("u1").page(2, 0),
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].timestamp, at(3, 12));

        let next = service
            .query(
                AuditCategory::Audit,
                &september().principal("u1").page(2, 2),
                None,
            )
            .await
            .unwrap();
        assert_eq!(next.records.len(), 1);
        assert_eq!(next.records[0].timestamp, at(1, 9));

        let denied = service
            .query(AuditCategory::Audit, &september().granted(false), None)
            .await
            .unwrap();
        assert_eq!(denied.total, 2);
    }

    #[tokio::test]
    async fn test_time_range_is_inclusive() {
        let (_, service) = seeded().await;
        let page = service
            .query(
                AuditCategory::Audit,
                &AuditQuery::new().between(at(2, 8), at(3, 7)),
                None,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_expired_deadline_truncates() {
        let (_, service) = seeded().await;
        let deadline = Instant::now() - std::time::Duration::from_millis(1);

        let page = service
            .query(AuditCategory::Audit, &september(), Some(deadline))
            .await
            .unwrap();
        assert!(page.truncated);
    }

    #[tokio::test]
    async fn test_invalid_queries_rejected() {
        let (_, service) = seeded().await;

        for query in [
            september().page(0, 0),
            september().page(1001, 0),
            AuditQuery::new().between(at(3, 0), at(1, 0)),
        ] {
            let result = service.query(AuditCategory::Audit, &query, None).await;
            assert!(matches!(result, Err(AuditError::InvalidQuery(_))));
        }
    }

    #[test]
    fn test_default_lookback() {
        let now = at(30, 0);
        let (from, to) = AuditQuery::new().resolved_range(AuditCategory::Security, now);
        assert_eq!(to, now);
        assert_eq!(to - from, Duration::days(90));

        let (from, _) = AuditQuery::new().resolved_range(AuditCategory::Audit, now);
        assert_eq!(now - from, Duration::days(365));
    }

    #[test]
    fn test_query_params_deserialize() {
        let query: AuditQuery = serde_json::from_str(
            r#"{"principalId":"u1","decisionGranted":false,"from":"2026-09-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(query.principal_id.as_deref(), Some("u1"));
        assert_eq!(query.decision_granted, Some(false));
        assert_eq!(query.limit, DEFAULT_LIMIT);
        assert_eq!(query.offset, 0);
    }

    #[tokio::test]
    async fn test_export_ignores_pagination() {
        let (_, service) = seeded().await;
        let bytes = service
            .export(AuditCategory::Audit, &september().page(1, 3), ExportFormat::Json)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_verify_and_retention() {
        let (store, service) = seeded().await;
        let day = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();

        let report = service.verify(AuditCategory::Audit, day).await.unwrap();
        assert!(report.intact);
        assert_eq!(report.verified, 2);

        let today = NaiveDate::from_ymd_opt(2026, 9, 4).unwrap();
        let removed = service.enforce_retention(2, today).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.list_segments(AuditCategory::Audit).await.unwrap(),
            vec![
                NaiveDate::from_ymd_opt(2026, 9, 2).unwrap(),
                NaiveDate::from_ymd_opt(2026, 9, 3).unwrap()
            ]
        );
    }

    #[tokio::test]
    async fn test_retention_window_beyond_calendar_keeps_everything() {
        let (store, service) = seeded().await;
        let today = NaiveDate::from_ymd_opt(2026, 9, 4).unwrap();

        let removed = service.enforce_retention(u32::MAX, today).await.unwrap();
        assert_eq!(removed, 0);
        assert_eq!(store.list_segments(AuditCategory::Audit).await.unwrap().len(), 3);
    }

    #[test]
    fn test_lookback_clamps_at_earliest_time() {
        let early = DateTime::<Utc>::MIN_UTC + Duration::days(10);
        let query = AuditQuery::new().between(DateTime::<Utc>::MIN_UTC, early);
        let (from, _) = query.resolved_range(AuditCategory::Audit, at(1, 0));
        assert_eq!(from, DateTime::<Utc>::MIN_UTC);

        let open_start = AuditQuery {
            to: Some(early),
            ..AuditQuery::new()
        };
        let (from, to) = open_start.resolved_range(AuditCategory::Security, at(1, 0));
        assert_eq!(from, DateTime::<Utc>::MIN_UTC);
        assert_eq!(to, early);
    }
}
