//! Filtered reads for each identity shape.

use rowguard_core::context::{with_identity, with_super_identity};
use rowguard_core::Identity;
use rowguard_storage::{Column, Predicate};

use crate::common::{titles, Harness};

fn three_levels() -> Harness {
    let harness = Harness::new();
    harness.project("open", "public", None);
    harness.project("internal", "authorized", None);
    harness.project("secret", "restricted", Some(7));
    harness
}

fn visible_to(harness: &Harness, identity: Identity) -> Vec<String> {
    with_identity(identity, || {
        titles(&harness.control.objects("Project").unwrap().all().unwrap())
    })
}

#[test]
fn test_anonymous_sees_only_public() {
    let harness = three_levels();
    assert_eq!(visible_to(&harness, Identity::Anonymous), ["open"]);
}

#[test]
fn test_permitted_user_sees_everything() {
    let harness = three_levels();
    assert_eq!(
        visible_to(&harness, Identity::user(7)),
        ["open", "internal", "secret"]
    );
}

#[test]
fn test_other_user_misses_restricted() {
    let harness = three_levels();
    assert_eq!(visible_to(&harness, Identity::user(3)), ["open", "internal"]);
}

#[test]
fn test_super_sees_everything() {
    let harness = three_levels();
    assert_eq!(
        visible_to(&harness, Identity::Super),
        ["open", "internal", "secret"]
    );
}

#[test]
fn test_prefix_ids_do_not_match() {
    let harness = Harness::new();
    harness.project("secret", "restricted", Some(42));
    assert!(visible_to(&harness, Identity::user(4)).is_empty());
    assert!(visible_to(&harness, Identity::user(2)).is_empty());
    assert_eq!(visible_to(&harness, Identity::user(42)), ["secret"]);
}

#[test]
fn test_no_identity_falls_back_to_public() {
    let harness = three_levels();
    let projects = harness.control.objects("Project").unwrap();
    assert_eq!(titles(&projects.all().unwrap()), ["open"]);
}

#[test]
fn test_override_identity() {
    let harness = three_levels();
    with_super_identity(|| {
        let as_user = harness
            .control
            .objects("Project")
            .unwrap()
            .as_identity(Identity::user(3));
        assert_eq!(as_user.count().unwrap(), 2);
    });
}

#[test]
fn test_get_and_filter_are_gated() {
    let harness = three_levels();
    let secret = harness.raw(rowguard_core::RecordId::new(3));
    let projects = harness.control.objects("Project").unwrap();

    with_identity(Identity::user(3), || {
        assert!(projects.get(secret.id()).unwrap().is_none());
        let found = projects
            .filter(Predicate::eq(Column::field("title"), "secret"))
            .unwrap();
        assert!(found.is_empty());
    });
    with_identity(Identity::user(7), || {
        assert!(projects.get(secret.id()).unwrap().is_some());
    });
}

#[test]
fn test_uncontrolled_types_have_no_manager() {
    let harness = Harness::new();
    let err = harness.control.objects("Task").unwrap_err();
    assert!(matches!(err, rowguard_core::Error::BadManager { .. }));
    assert!(harness.control.objects("Nope").is_err());
}

#[test]
fn test_fixed_public_level() {
    let harness = Harness::new();
    let notices = harness.control.objects("Notice").unwrap();
    notices
        .create(
            rowguard_storage::Record::draft("Notice")
                .with("title", "hello")
                .unwrap(),
        )
        .unwrap();
    assert_eq!(notices.as_identity(Identity::Anonymous).count().unwrap(), 1);
}
