//! End-to-end behaviour of the access-control facade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use warden::audit::{AuditCategory, AuditQuery, MemoryAuditStore, RequestContext};
use warden::store::{MemoryStore, ResourceKey, SqliteStore, StoreError};
use warden::{
    AccessControl, AccessControlEntry, DataClassification, DecisionReason, EntryDraft, Permission,
    Principal, SensitivityLabel, WardenConfig, WardenError,
};
use warden_testkit::{editor, owner, reader, FailingAuditStore};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn memory_control() -> (AccessControl<MemoryStore>, Arc<MemoryAuditStore>) {
    let audit = Arc::new(MemoryAuditStore::new());
    let control = AccessControl::new(MemoryStore::new(), audit.clone(), WardenConfig::default())
        .unwrap();
    (control, audit)
}

fn doc(id: &str) -> ResourceKey {
    ResourceKey::new("document", id)
}

fn ctx() -> RequestContext {
    RequestContext::new()
        .from_address("203.0.113.9")
        .with_agent("integration-test")
}

#[tokio::test]
async fn test_end_to_end_private_document() {
    init_tracing();
    let (control, audit) = memory_control();
    control
        .register_resource(&doc("d1"), "u1", None, false, None)
        .await
        .unwrap();

    let stranger = control
        .authorize(&reader("u2"), &doc("d1"), &Permission::Read, &ctx())
        .await
        .unwrap();
    assert!(!stranger.allowed);
    assert_eq!(stranger.reason, DecisionReason::AccessLevelCheckFailed);

    let owner_decision = control
        .authorize(&owner("u1"), &doc("d1"), &Permission::Read, &ctx())
        .await
        .unwrap();
    assert!(owner_decision.allowed);
    assert_eq!(owner_decision.reason, DecisionReason::Owner);

    control.flush_audit().await;
    let page = control
        .query_audit(AuditCategory::Audit, &AuditQuery::new(), None)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(audit.records(AuditCategory::Audit).len(), 2);

    let denial = page.records.iter().find(|r| r.principal_id == "u2").unwrap();
    assert_eq!(denial.details.reason, "access-level-check-failed");
    assert_eq!(denial.source_address.as_deref(), Some("203.0.113.9"));
    assert_eq!(denial.details.owner_id.as_deref(), Some("u1"));
}

#[tokio::test]
async fn test_default_entry_denies_everyone_but_owner() {
    let (control, _) = memory_control();
    control
        .register_resource(&doc("d1"), "owner1", Some("tenant".into()), false, None)
        .await
        .unwrap();

    for permission in [
        Permission::Read,
        Permission::Update,
        Permission::Delete,
        Permission::Download,
    ] {
        let by_owner = control
            .authorize(&owner("owner1"), &doc("d1"), &permission, &ctx())
            .await
            .unwrap();
        assert!(by_owner.allowed, "owner denied {}", permission);

        let by_other = control
            .authorize(&editor("someone"), &doc("d1"), &permission, &ctx())
            .await
            .unwrap();
        assert!(!by_other.allowed, "non-owner allowed {}", permission);
    }
}

#[tokio::test]
async fn test_system_resources_are_shared_with_system_group() {
    let (control, _) = memory_control();
    control
        .register_resource(&ResourceKey::new("job", "nightly"), "svc", None, true, None)
        .await
        .unwrap();

    let operator = reader("op").with_group("system");
    let decision = control
        .authorize(
            &operator,
            &ResourceKey::new("job", "nightly"),
            &Permission::Read,
            &ctx(),
        )
        .await
        .unwrap();
    assert_eq!(decision.reason, DecisionReason::SecurityGroupMember);
}

#[tokio::test]
async fn test_label_and_classification_gates() {
    let (control, _) = memory_control();
    let mut draft = EntryDraft::new("PUBLIC", "u1");
    draft.data_classification = "CONFIDENTIAL".into();
    draft.sensitivity_labels = vec!["PII".into(), "FINANCIAL".into()];
    control
        .register_resource(&doc("ledger"), "u1", None, false, Some(draft))
        .await
        .unwrap();

    let cleared = Principal::new("u2")
        .with_clearance(DataClassification::Confidential)
        .with_capability(Permission::Read);

    let pii_only = cleared.clone().with_label(SensitivityLabel::Pii);
    let decision = control
        .authorize(&pii_only, &doc("ledger"), &Permission::Read, &ctx())
        .await
        .unwrap();
    assert_eq!(decision.reason, DecisionReason::MissingLabelGrant);

    let both = pii_only.with_label(SensitivityLabel::Financial);
    let decision = control
        .authorize(&both, &doc("ledger"), &Permission::Read, &ctx())
        .await
        .unwrap();
    assert_eq!(decision.reason, DecisionReason::Public);

    let internal_only = reader("u3")
        .with_label(SensitivityLabel::Pii)
        .with_label(SensitivityLabel::Financial);
    let decision = control
        .authorize(&internal_only, &doc("ledger"), &Permission::Read, &ctx())
        .await
        .unwrap();
    assert_eq!(
        decision.reason,
        DecisionReason::InsufficientClassificationClearance
    );
}

#[tokio::test]
async fn test_concurrent_updates_one_wins() {
    let (control, _) = memory_control();
    control
        .register_resource(&doc("d1"), "u1", None, false, None)
        .await
        .unwrap();
    let actor = owner("u1");

    let mut share_with_u2 = EntryDraft::new("PRIVATE", "u1");
    share_with_u2.authorized_users = Some(vec!["u2".into()]);
    let make_public = EntryDraft::new("PUBLIC", "u1");

    let (key_a, key_b) = (doc("d1"), doc("d1"));
    let (ctx_a, ctx_b) = (ctx(), ctx());
    let (first, second) = tokio::join!(
        control.update_entry(&actor, &key_a, share_with_u2, 1, &ctx_a),
        control.update_entry(&actor, &key_b, make_public, 1, &ctx_b),
    );

    let outcomes = [first.is_ok(), second.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);

    let loser = if first.is_err() { first } else { second };
    let err = loser.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        WardenError::Store(StoreError::VersionConflict {
            expected: 1,
            actual: 2,
            ..
        })
    ));

    let history = control.entry_history(&doc("d1")).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(control.entry(&doc("d1")).await.unwrap().version, 2);
}

#[tokio::test]
async fn test_update_keeps_owner_in_private_users() {
    let (control, _) = memory_control();
    control
        .register_resource(&doc("d1"), "owner1", None, false, None)
        .await
        .unwrap();

    let mut draft = EntryDraft::new("PRIVATE", "owner1");
    draft.authorized_users = Some(vec!["someoneElse".into()]);
    let stored = control
        .update_entry(&owner("owner1"), &doc("d1"), draft, 1, &ctx())
        .await
        .unwrap();

    let users = stored.entry.authorized_users().unwrap();
    assert!(users.contains("owner1"));
    assert!(users.contains("someoneElse"));
}

#[tokio::test]
async fn test_invalid_draft_rejected() {
    let (control, _) = memory_control();
    let mut draft = EntryDraft::new("PUBLIC", "u1");
    draft.authorized_users = Some(vec!["u2".into()]);

    let result = control
        .register_resource(&doc("d1"), "u1", None, false, Some(draft))
        .await;
    assert!(matches!(result, Err(WardenError::Validation(_))));

    let unknown = EntryDraft::new("FRIENDS_ONLY", "u1");
    let result = control
        .register_resource(&doc("d2"), "u1", None, false, Some(unknown))
        .await;
    assert!(matches!(result, Err(WardenError::Validation(_))));
}

#[tokio::test]
async fn test_failing_audit_sink_does_not_change_decisions() {
    init_tracing();
    let failing = Arc::new(FailingAuditStore::slow(Duration::from_millis(50)));
    let mut config = WardenConfig::default();
    config.audit.queue_capacity = 4;
    config.audit.max_retries = 0;

    let control = AccessControl::new(MemoryStore::new(), failing.clone(), config).unwrap();
    let resource = warden_testkit::private_doc_of("u1");

    let started = Instant::now();
    for _ in 0..50 {
        let decision = control.check(&reader("u2"), &resource, &Permission::Read, &ctx());
        assert_eq!(decision.reason, DecisionReason::AccessLevelCheckFailed);
        let decision = control.check(&owner("u1"), &resource, &Permission::Read, &ctx());
        assert_eq!(decision.reason, DecisionReason::Owner);
    }
    // A hundred appends at 50ms each would take seconds if evaluation waited.
    assert!(started.elapsed() < Duration::from_secs(1));

    let query = control
        .query_audit(AuditCategory::Audit, &AuditQuery::new(), None)
        .await;
    assert!(matches!(query, Err(ref e) if e.is_retryable()));

    control.shutdown().await;
    let stats = control.audit_stats();
    assert_eq!(stats.written, 0);
    assert_eq!(stats.failed + stats.dropped, 100);
    assert!(failing.attempts() >= stats.failed);
}

#[tokio::test]
async fn test_entries_persist_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("entries.db");
    let audit = Arc::new(MemoryAuditStore::new());

    {
        let store = SqliteStore::open(&db).unwrap();
        let control = AccessControl::new(store, audit.clone(), WardenConfig::default()).unwrap();
        control
            .register_resource(
                &doc("d1"),
                "u1",
                None,
                false,
                Some(EntryDraft::new("PUBLIC", "u1")),
            )
            .await
            .unwrap();
        control.shutdown().await;
    }

    let store = SqliteStore::open(&db).unwrap();
    let control = AccessControl::new(store, audit, WardenConfig::default()).unwrap();
    let stored = control.entry(&doc("d1")).await.unwrap();
    assert_eq!(stored.entry, AccessControlEntry::public("u1"));

    let owned = control.owned_by("u1").await.unwrap();
    assert_eq!(owned.len(), 1);
}
