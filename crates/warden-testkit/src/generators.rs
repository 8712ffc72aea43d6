//! Proptest generators for property-based testing.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use warden_core::{
    AccessControlEntry, AccessLevel, DataClassification, EntryDraft, Permission, Principal,
    SensitivityLabel,
};

/// Generate an access level.
pub fn access_level() -> impl Strategy<Value = AccessLevel> {
    prop::sample::select(AccessLevel::ALL.to_vec())
}

/// Generate a data classification.
pub fn classification() -> impl Strategy<Value = DataClassification> {
    prop::sample::select(DataClassification::ALL.to_vec())
}

/// Generate a label, mostly canonical with the occasional custom tag.
pub fn label() -> impl Strategy<Value = SensitivityLabel> {
    prop_oneof![
        4 => prop::sample::select(SensitivityLabel::CANONICAL.to_vec()),
        1 => "[A-Z]{3,8}".prop_map(SensitivityLabel::from),
    ]
}

/// Generate a set of up to `max` labels.
pub fn labels(max: usize) -> impl Strategy<Value = Vec<SensitivityLabel>> {
    prop::collection::vec(label(), 0..=max)
}

/// Generate a permission.
pub fn permission() -> impl Strategy<Value = Permission> {
    prop_oneof![
        Just(Permission::Read),
        Just(Permission::Update),
        Just(Permission::Delete),
        Just(Permission::Download),
        Just(Permission::Share),
        Just(Permission::Admin),
        "[a-z]{4,10}".prop_map(|p| Permission::from(format!("custom-{}", p))),
    ]
}

/// Generate an identifier from a small pool so collisions are likely.
pub fn small_id(prefix: &'static str) -> impl Strategy<Value = String> {
    (0u8..6).prop_map(move |n| format!("{}{}", prefix, n))
}

/// Generate a reasonable evaluation instant.
pub fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..2_000_000_000i64).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
    })
}

/// Generate a principal drawing ids, groups and grants from small pools.
pub fn principal() -> impl Strategy<Value = Principal> {
    (
        small_id("u"),
        proptest::option::of(small_id("org")),
        prop::collection::btree_set(small_id("grp"), 0..3),
        prop::collection::btree_set(classification(), 0..4),
        labels(3),
        prop::collection::vec(permission(), 0..4),
    )
        .prop_map(|(id, org, groups, clearances, labels, caps)| {
            let mut principal = Principal::new(id).with_capabilities(caps);
            principal.organization_id = org;
            principal.security_groups = groups;
            principal.granted_classifications = clearances;
            principal.granted_labels = labels.into_iter().collect();
            principal
        })
}

/// Generate a valid entry for any level, without expiry.
pub fn entry() -> impl Strategy<Value = AccessControlEntry> {
    (
        access_level(),
        small_id("u"),
        prop::collection::vec(small_id("org"), 0..3),
        prop::collection::vec(small_id("grp"), 0..3),
        prop::collection::vec(small_id("u"), 0..3),
        classification(),
        labels(3),
    )
        .prop_map(|(level, owner, orgs, groups, users, class, labels)| {
            let entry = match level {
                AccessLevel::Public => AccessControlEntry::public(owner),
                AccessLevel::Organization => AccessControlEntry::organization(owner, orgs),
                AccessLevel::SecurityGroup => AccessControlEntry::security_group(owner, groups),
                AccessLevel::Private => AccessControlEntry::private(owner, users),
            };
            entry.with_classification(class).with_labels(labels)
        })
}

/// Parameters for a private draft whose user list may omit the owner.
#[derive(Debug, Clone)]
pub struct PrivateDraftParams {
    pub owner_id: String,
    pub users: Vec<String>,
    pub classification: DataClassification,
}

impl Arbitrary for PrivateDraftParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            small_id("owner"),
            prop::collection::vec(small_id("u"), 0..4),
            classification(),
        )
            .prop_map(|(owner_id, users, classification)| PrivateDraftParams {
                owner_id,
                users,
                classification,
            })
            .boxed()
    }
}

impl PrivateDraftParams {
    pub fn draft(&self) -> EntryDraft {
        let mut draft = EntryDraft::new("PRIVATE", self.owner_id.clone());
        draft.authorized_users = Some(self.users.clone());
        draft.data_classification = self.classification.as_str().to_string();
        draft
    }
}

/// An expiry `offset_secs` away from `now` (negative is in the past).
pub fn expiry_near(now: DateTime<Utc>, offset_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(offset_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{validate_draft, DecisionReason, ResourceDescriptor};
    use warden_policy::PolicyEvaluator;

    fn describe(entry: AccessControlEntry) -> ResourceDescriptor {
        ResourceDescriptor::new("document", "doc-1", entry)
    }

    proptest! {
        #[test]
        fn test_evaluation_is_deterministic(
            principal in principal(),
            entry in entry(),
            permission in permission(),
            now in instant(),
        ) {
            let evaluator = PolicyEvaluator::new();
            let resource = describe(entry);

            let first = evaluator.evaluate_at(&principal, &resource, &permission, now);
            let second = evaluator.evaluate_at(&principal, &resource, &permission, now);

            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_allowed_matches_reason(
            principal in principal(),
            entry in entry(),
            permission in permission(),
            now in instant(),
        ) {
            let decision = PolicyEvaluator::new()
                .evaluate_at(&principal, &describe(entry), &permission, now);
            prop_assert_eq!(decision.allowed, !decision.reason.is_denial());
        }

        #[test]
        fn test_private_owner_always_authorized(params: PrivateDraftParams) {
            let entry = validate_draft(params.draft()).unwrap();
            let users = entry.authorized_users().unwrap();

            prop_assert!(users.contains(&params.owner_id));
            for user in &params.users {
                prop_assert!(users.contains(user));
            }
        }

        #[test]
        fn test_labels_are_a_conjunction(
            required in labels(4),
            held in labels(4),
            now in instant(),
        ) {
            let entry = AccessControlEntry::public("owner")
                .with_classification(DataClassification::Public)
                .with_labels(required.clone());
            let principal = held
                .iter()
                .cloned()
                .fold(Principal::new("u1").with_capability(Permission::Read), |p, l| p.with_label(l));

            let decision = PolicyEvaluator::new()
                .evaluate_at(&principal, &describe(entry), &Permission::Read, now);

            let covered = required.iter().all(|l| held.contains(l));
            if covered {
                prop_assert_eq!(decision.reason, DecisionReason::Public);
            } else {
                prop_assert_eq!(decision.reason, DecisionReason::MissingLabelGrant);
            }
        }

        #[test]
        fn test_levels_do_not_leak(
            orgs in prop::collection::vec(small_id("org"), 0..3),
            principal_org in small_id("org"),
            now in instant(),
        ) {
            prop_assume!(!orgs.contains(&principal_org));

            let entry = AccessControlEntry::organization("owner", orgs);
            let principal = Principal::new("u1")
                .in_organization(principal_org)
                .with_clearance(DataClassification::Internal)
                .with_capability(Permission::Read);

            let decision = PolicyEvaluator::new()
                .evaluate_at(&principal, &describe(entry), &Permission::Read, now);
            prop_assert_eq!(decision.reason, DecisionReason::AccessLevelCheckFailed);
        }

        #[test]
        fn test_expiry_at_or_before_now_denies(
            entry in entry(),
            now in instant(),
            offset in -3600i64..=0,
        ) {
            let resource = describe(entry.with_expiry(expiry_near(now, offset)));
            let principal = Principal::new("u1").with_capability(Permission::Read);

            let decision = PolicyEvaluator::new()
                .evaluate_at(&principal, &resource, &Permission::Read, now);
            prop_assert_eq!(decision.reason, DecisionReason::Expired);
        }
    }
}
