//! The AccessControl facade: one object per process tying together the
//! evaluator, the entry store and the audit trail.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use tokio::time::Instant;

use warden_audit::{
    AuditCategory, AuditQuery, AuditQueryService, AuditRecord, AuditRecorder, AuditStore,
    ExportFormat, FileAuditStore, IntegrityReport, QueryPage, RecorderStats, RequestContext,
};
use warden_core::{
    validate_draft, AccessControlEntry, Decision, EntryDraft, Permission, Principal,
    ResourceDescriptor,
};
use warden_policy::PolicyEvaluator;
use warden_store::{EntryStore, ResourceKey, SqliteStore, StoredEntry};

use crate::config::WardenConfig;
use crate::error::{Result, WardenError};

/// Resource access control with an audit trail.
///
/// Construct once at startup and share by reference (or `Arc`) with request
/// handlers. Evaluation never waits on audit I/O: records are handed to the
/// [`AuditRecorder`] and written in the background.
pub struct AccessControl<S: EntryStore> {
    evaluator: PolicyEvaluator,
    store: Arc<S>,
    recorder: AuditRecorder,
    audit: AuditQueryService,
    config: WardenConfig,
}

impl AccessControl<SqliteStore> {
    /// Open the SQLite entry store and file audit store named by `config`,
    /// and start the recorder on the current tokio runtime.
    pub fn open(config: WardenConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.store.sqlite_path {
            Some(path) => SqliteStore::open(path)?,
            None => SqliteStore::open_memory()?,
        };
        let audit_store = FileAuditStore::open(&config.audit.root_dir)?
            .with_sync_writes(config.audit.sync_writes);

        Self::new(store, Arc::new(audit_store), config)
    }
}

impl<S: EntryStore> AccessControl<S> {
    /// Build the facade over `store` and `audit_store`, starting a recorder
    /// configured from `config`.
    pub fn new(store: S, audit_store: Arc<dyn AuditStore>, config: WardenConfig) -> Result<Self> {
        config.validate()?;
        let recorder = AuditRecorder::spawn(audit_store.clone(), config.audit.recorder_config())?;
        Ok(Self::with_recorder(store, recorder, audit_store, config))
    }

    /// Build the facade around an existing recorder.
    pub fn with_recorder(
        store: S,
        recorder: AuditRecorder,
        audit_store: Arc<dyn AuditStore>,
        config: WardenConfig,
    ) -> Self {
        Self {
            evaluator: PolicyEvaluator::new(),
            store: Arc::new(store),
            recorder,
            audit: AuditQueryService::new(audit_store),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn recorder(&self) -> &AuditRecorder {
        &self.recorder
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new resource.
    ///
    /// Without a draft the resource gets the default entry: private to its
    /// owner, or shared with the system group for system resources. A draft's
    /// owner is always replaced by `owner_id`.
    pub async fn register_resource(
        &self,
        key: &ResourceKey,
        owner_id: &str,
        tenant_id: Option<String>,
        is_system_resource: bool,
        draft: Option<EntryDraft>,
    ) -> Result<StoredEntry> {
        let entry = match draft {
            Some(mut draft) => {
                draft.owner_id = owner_id.to_string();
                if draft.owner_tenant_id.is_none() {
                    draft.owner_tenant_id = tenant_id;
                }
                validate_draft(draft)?
            }
            None => AccessControlEntry::new_default(owner_id, tenant_id, is_system_resource)
                .validate()?,
        };

        let stored = self.store.insert(key, &entry).await?;
        tracing::info!(resource = %key, owner = owner_id, level = %entry.access_level(), "resource registered");

        self.record_security_event(
            AuditRecord::event(
                owner_id,
                "register",
                &key.resource_type,
                &key.resource_id,
                "entry-created",
                true,
                &RequestContext::new(),
            )
            .with_detail("accessLevel", entry.access_level().as_str())
            .with_detail("version", stored.version),
        );

        Ok(stored)
    }

    /// Replace a resource's entry.
    ///
    /// Only the owner or a super-admin may update, and only a super-admin may
    /// change the owner. `expected_version` must match the stored version.
    pub async fn update_entry(
        &self,
        actor: &Principal,
        key: &ResourceKey,
        draft: EntryDraft,
        expected_version: u64,
        ctx: &RequestContext,
    ) -> Result<StoredEntry> {
        let current = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| WardenError::ResourceNotFound(key.clone()))?;

        if !actor.is_super_admin && !current.entry.is_owner(&actor.id) {
            self.reject_update(actor, key, "not-owner", ctx);
            return Err(WardenError::NotAuthorized(format!(
                "{} may not update the entry of {}",
                actor.id, key
            )));
        }

        let entry = validate_draft(draft)?;
        let owner_changed = entry.owner_id() != current.entry.owner_id();
        if owner_changed && !actor.is_super_admin {
            self.reject_update(actor, key, "owner-change-requires-admin", ctx);
            return Err(WardenError::NotAuthorized(format!(
                "only an administrator may change the owner of {}",
                key
            )));
        }

        let stored = self.store.update(key, &entry, expected_version).await?;

        let mut event = AuditRecord::event(
            &actor.id,
            "update",
            &key.resource_type,
            &key.resource_id,
            "entry-updated",
            true,
            ctx,
        )
        .with_detail("accessLevel", entry.access_level().as_str())
        .with_detail("version", stored.version);
        if owner_changed {
            event = event
                .with_detail("previousOwner", current.entry.owner_id())
                .with_detail("newOwner", entry.owner_id());
        }
        self.record_security_event(event);

        Ok(stored)
    }

    fn reject_update(&self, actor: &Principal, key: &ResourceKey, reason: &str, ctx: &RequestContext) {
        tracing::warn!(actor = %actor.id, resource = %key, reason, "entry update refused");
        self.record_security_event(AuditRecord::event(
            &actor.id,
            "update",
            &key.resource_type,
            &key.resource_id,
            reason,
            false,
            ctx,
        ));
    }

    /// The current entry of a resource.
    pub async fn entry(&self, key: &ResourceKey) -> Result<StoredEntry> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| WardenError::ResourceNotFound(key.clone()))
    }

    /// Every version of a resource's entry, oldest first.
    pub async fn entry_history(&self, key: &ResourceKey) -> Result<Vec<StoredEntry>> {
        Ok(self.store.history(key).await?)
    }

    /// Current entries of every resource owned by `owner_id`.
    pub async fn owned_by(&self, owner_id: &str) -> Result<Vec<StoredEntry>> {
        Ok(self.store.list_owned_by(owner_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Evaluation
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a resource's entry and decide whether `principal` may perform
    /// `permission` on it.
    ///
    /// Store failures and unknown resources are errors; the caller must treat
    /// them as a denial.
    pub async fn authorize(
        &self,
        principal: &Principal,
        key: &ResourceKey,
        permission: &Permission,
        ctx: &RequestContext,
    ) -> Result<Decision> {
        let stored = self
            .store
            .get(key)
            .await?
            .ok_or_else(|| WardenError::ResourceNotFound(key.clone()))?;

        Ok(self.check(principal, &stored.descriptor(), permission, ctx))
    }

    /// Decide against a descriptor the caller already holds.
    ///
    /// The decision is recorded in the audit log when the entry has auditing
    /// enabled. Recording only enqueues.
    pub fn check(
        &self,
        principal: &Principal,
        resource: &ResourceDescriptor,
        permission: &Permission,
        ctx: &RequestContext,
    ) -> Decision {
        let decision = self.evaluator.evaluate(principal, resource, permission);

        if resource.entry.audit_enabled() {
            self.recorder.record(
                AuditCategory::Audit,
                AuditRecord::for_decision(principal, resource, permission, &decision, ctx),
            );
        }

        decision
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a record for the security log.
    pub fn record_security_event(&self, record: AuditRecord) {
        self.recorder.record(AuditCategory::Security, record);
    }

    /// Queue a record for the task log.
    pub fn record_task_event(&self, record: AuditRecord) {
        self.recorder.record(AuditCategory::Task, record);
    }

    pub async fn query_audit(
        &self,
        category: AuditCategory,
        query: &AuditQuery,
        deadline: Option<Instant>,
    ) -> Result<QueryPage> {
        Ok(self.audit.query(category, query, deadline).await?)
    }

    pub async fn export_audit(
        &self,
        category: AuditCategory,
        query: &AuditQuery,
        format: ExportFormat,
    ) -> Result<Bytes> {
        Ok(self.audit.export(category, query, format).await?)
    }

    /// Check the hash chain of one day segment.
    pub async fn verify_audit(
        &self,
        category: AuditCategory,
        date: NaiveDate,
    ) -> Result<IntegrityReport> {
        Ok(self.audit.verify(category, date).await?)
    }

    /// Remove segments older than the configured retention window. Does
    /// nothing when no window is configured.
    pub async fn enforce_retention(&self) -> Result<usize> {
        let Some(days) = self.config.audit.retention_days else {
            return Ok(0);
        };
        let removed = self
            .audit
            .enforce_retention(days, Utc::now().date_naive())
            .await?;

        self.record_task_event(
            AuditRecord::event(
                "system",
                "retention",
                "audit-segment",
                "*",
                "retention-enforced",
                true,
                &RequestContext::new(),
            )
            .with_detail("retentionDays", days)
            .with_detail("segmentsRemoved", removed),
        );

        Ok(removed)
    }

    /// Wait until every queued audit record has been handled.
    pub async fn flush_audit(&self) {
        self.recorder.flush().await;
    }

    pub fn audit_stats(&self) -> RecorderStats {
        self.recorder.stats()
    }

    /// Drain the audit queue and stop the recorder.
    pub async fn shutdown(&self) {
        self.recorder.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_audit::MemoryAuditStore;
    use warden_core::{AccessLevel, DataClassification, DecisionReason};
    use warden_store::MemoryStore;

    fn facade() -> (AccessControl<MemoryStore>, Arc<MemoryAuditStore>) {
        let audit = Arc::new(MemoryAuditStore::new());
        let control =
            AccessControl::new(MemoryStore::new(), audit.clone(), WardenConfig::default()).unwrap();
        (control, audit)
    }

    fn doc(id: &str) -> ResourceKey {
        ResourceKey::new("document", id)
    }

    #[tokio::test]
    async fn test_register_default_entry() {
        let (control, audit) = facade();
        let stored = control
            .register_resource(&doc("d1"), "u1", None, false, None)
            .await
            .unwrap();

        assert_eq!(stored.version, 1);
        assert_eq!(stored.entry.access_level(), AccessLevel::Private);

        control.flush_audit().await;
        let events = audit.records(AuditCategory::Security);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details.reason, "entry-created");
    }

    #[tokio::test]
    async fn test_register_draft_takes_registering_owner() {
        let (control, _) = facade();
        let draft = EntryDraft::new("PUBLIC", "someone-else");

        let stored = control
            .register_resource(&doc("d1"), "u1", Some("t1".into()), false, Some(draft))
            .await
            .unwrap();

        assert_eq!(stored.entry.owner_id(), "u1");
        assert_eq!(stored.entry.owner_tenant_id(), Some("t1"));
    }

    #[tokio::test]
    async fn test_authorize_unknown_resource() {
        let (control, _) = facade();
        let result = control
            .authorize(
                &Principal::new("u1"),
                &doc("missing"),
                &Permission::Read,
                &RequestContext::new(),
            )
            .await;
        assert!(matches!(result, Err(WardenError::ResourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_non_owner_cannot_update() {
        let (control, audit) = facade();
        control
            .register_resource(&doc("d1"), "u1", None, false, None)
            .await
            .unwrap();

        let result = control
            .update_entry(
                &Principal::new("u2"),
                &doc("d1"),
                EntryDraft::new("PUBLIC", "u1"),
                1,
                &RequestContext::new(),
            )
            .await;
        assert!(matches!(result, Err(WardenError::NotAuthorized(_))));

        control.flush_audit().await;
        let refused = audit
            .records(AuditCategory::Security)
            .into_iter()
            .filter(|r| !r.details.granted)
            .count();
        assert_eq!(refused, 1);
    }

    #[tokio::test]
    async fn test_owner_transfer_requires_admin() {
        let (control, _) = facade();
        control
            .register_resource(&doc("d1"), "u1", None, false, None)
            .await
            .unwrap();

        let by_owner = control
            .update_entry(
                &Principal::new("u1"),
                &doc("d1"),
                EntryDraft::new("PRIVATE", "u2"),
                1,
                &RequestContext::new(),
            )
            .await;
        assert!(matches!(by_owner, Err(WardenError::NotAuthorized(_))));

        let by_admin = control
            .update_entry(
                &Principal::new("root").super_admin(),
                &doc("d1"),
                EntryDraft::new("PRIVATE", "u2"),
                1,
                &RequestContext::new(),
            )
            .await
            .unwrap();
        assert_eq!(by_admin.version, 2);
        assert_eq!(by_admin.entry.owner_id(), "u2");
    }

    #[tokio::test]
    async fn test_audit_disabled_entry_is_not_recorded() {
        let (control, audit) = facade();
        let reader = Principal::new("u2")
            .with_clearance(DataClassification::Internal)
            .with_capability(Permission::Read);

        let quiet = ResourceDescriptor::new(
            "document",
            "d1",
            AccessControlEntry::public("u1").with_audit(false),
        );
        let decision = control.check(&reader, &quiet, &Permission::Read, &RequestContext::new());
        assert!(decision.allowed);
        assert_eq!(decision.reason, DecisionReason::Public);

        control.flush_audit().await;
        assert!(audit.is_empty(AuditCategory::Audit));

        let logged = ResourceDescriptor::new("document", "d2", AccessControlEntry::public("u1"));
        control.check(&reader, &logged, &Permission::Read, &RequestContext::new());

        control.flush_audit().await;
        let records = audit.records(AuditCategory::Audit);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].resource_id, "d2");
    }

    #[tokio::test]
    async fn test_oversized_retention_is_rejected() {
        let mut config = WardenConfig::default();
        config.audit.retention_days = Some(4_000_000_000);

        let result = AccessControl::new(
            MemoryStore::new(),
            Arc::new(MemoryAuditStore::new()),
            config.clone(),
        );
        assert!(matches!(result, Err(WardenError::Config(_))));

        // Built around an existing recorder the config is not re-checked;
        // retention must still not fail.
        let audit = Arc::new(MemoryAuditStore::new());
        let recorder = AuditRecorder::spawn(audit.clone(), config.audit.recorder_config()).unwrap();
        let control = AccessControl::with_recorder(MemoryStore::new(), recorder, audit, config);
        assert_eq!(control.enforce_retention().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retention_without_window_is_noop() {
        let (control, _) = facade();
        assert_eq!(control.enforce_retention().await.unwrap(), 0);
    }
}
