//! Cache updates triggered by relationship changes.

use rowguard_core::context::{with_identity, with_super_identity};
use rowguard_core::{AccessLevel, Identity, UserId};
use rowguard_storage::{InMemoryStore, Record, Store};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::common::{linked_schema, Harness};

#[test]
fn test_adding_member_updates_cache_without_save() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));
    let projects = harness.control.objects("Project").unwrap();

    with_identity(Identity::user(3), || {
        assert!(projects.get(project.id()).unwrap().is_none());
    });

    projects
        .add_members(project.id(), "members", &[UserId::new(3)])
        .unwrap();

    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":3:7:"));
    with_identity(Identity::user(3), || {
        assert!(projects.get(project.id()).unwrap().is_some());
    });
}

#[test]
fn test_removing_and_clearing_members() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(1));
    let projects = harness.control.objects("Project").unwrap();
    projects
        .set_members(project.id(), "members", &[UserId::new(2), UserId::new(3)])
        .unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":1:2:3:"));

    projects
        .remove_members(project.id(), "members", &[UserId::new(2)])
        .unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":1:3:"));

    harness
        .store
        .clear_members("Project", project.id(), "members")
        .unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":1:"));
}

#[test]
fn test_set_members_replaces_collection() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(9));
    let projects = harness.control.objects("Project").unwrap();
    projects
        .set_members(project.id(), "members", &[UserId::new(4), UserId::new(5)])
        .unwrap();
    projects
        .set_members(project.id(), "members", &[UserId::new(5), UserId::new(6)])
        .unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":5:6:9:"));
}

#[test]
fn test_saving_entity_recomputes_level() {
    let harness = Harness::new();
    let mut project = harness.project("p", "authorized", Some(7));
    assert_eq!(project.access().level(), AccessLevel::Authorized);

    project.set("visibility", "public").unwrap();
    harness
        .control
        .objects("Project")
        .unwrap()
        .save(&mut project)
        .unwrap();
    assert_eq!(project.access().level(), AccessLevel::Public);
}

#[test]
fn test_changing_owner_recomputes_allow_list() {
    let harness = Harness::new();
    let mut project = harness.project("p", "restricted", Some(7));
    project.set("owner", UserId::new(8)).unwrap();
    harness.store.save(&project).unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":8:"));
}

#[test]
fn test_custom_association_save_reconciles_owner() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));

    harness.review(project.id(), 5);
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":5:7:"));

    let projects = harness.control.objects("Project").unwrap();
    with_identity(Identity::user(5), || {
        assert_eq!(projects.count().unwrap(), 1);
    });
}

#[test]
fn test_custom_association_update_and_delete() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));
    let mut review = harness.review(project.id(), 5);

    review.set("reviewer", UserId::new(6)).unwrap();
    harness.store.save(&review).unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":6:7:"));

    harness.store.delete("Review", review.id()).unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":7:"));
}

#[test]
fn test_repointed_association_reconciles_both_owners() {
    let harness = Harness::new();
    let first = harness.project("first", "restricted", Some(7));
    let second = harness.project("second", "restricted", Some(8));
    let mut review = harness.review(first.id(), 5);
    assert_eq!(harness.permitted(first.id()).as_deref(), Some(":5:7:"));

    review.set("project", second.id()).unwrap();
    harness.store.save(&review).unwrap();

    assert_eq!(harness.permitted(first.id()).as_deref(), Some(":7:"));
    assert_eq!(harness.permitted(second.id()).as_deref(), Some(":5:8:"));
    let projects = harness.control.objects("Project").unwrap();
    with_identity(Identity::user(5), || {
        assert!(projects.get(first.id()).unwrap().is_none());
        assert!(projects.get(second.id()).unwrap().is_some());
    });
}

#[test]
fn test_failed_link_delete_keeps_every_target_cache() {
    let store = Arc::new(InMemoryStore::new(linked_schema()).unwrap());
    let harness = Harness::with_store(store.clone());
    let create = |entity_type: &str| {
        harness
            .control
            .objects(entity_type)
            .unwrap()
            .create(Record::draft(entity_type).with("visibility", "authorized").unwrap())
            .unwrap()
    };
    let mut folder = create("Folder");
    let board = create("Board");
    let link = store
        .insert(
            Record::draft("Link")
                .with("folder", folder.id())
                .unwrap()
                .with("board", board.id())
                .unwrap()
                .with("user", UserId::new(5))
                .unwrap(),
        )
        .unwrap();
    folder.set("visibility", "restricted").unwrap();
    store.save(&folder).unwrap();

    // The board is reconciled first; user 5 is the folder's only user.
    let err = store.delete("Link", link.id()).unwrap_err();
    assert!(matches!(err, rowguard_core::Error::AccessData { .. }));

    assert_eq!(
        store.members("Board", board.id(), "linked").unwrap(),
        BTreeSet::from([UserId::new(5)])
    );
    let board = store.require("Board", board.id()).unwrap();
    assert_eq!(board.access().level(), AccessLevel::Authorized);
    assert_eq!(
        board.access().permitted_users().map(|list| list.as_str()),
        Some(":5:")
    );
    let folder = store.require("Folder", folder.id()).unwrap();
    assert_eq!(folder.access().level(), AccessLevel::Restricted);
    assert_eq!(
        folder.access().permitted_users().map(|list| list.as_str()),
        Some(":5:")
    );
}

#[test]
fn test_association_to_deleted_owner_is_skipped() {
    let harness = Harness::new();
    let project = harness.project("p", "authorized", Some(7));
    with_super_identity(|| {
        harness
            .control
            .objects("Project")
            .unwrap()
            .delete(project.id())
            .unwrap();
    });

    let review = harness.review(project.id(), 5);
    assert!(harness.store.delete("Review", review.id()).unwrap().is_some());
}

#[test]
fn test_unrelated_writes_leave_cache_alone() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));
    harness
        .store
        .insert(
            Record::draft("Task")
                .with("project", project.id())
                .unwrap()
                .with("assignee", UserId::new(3))
                .unwrap(),
        )
        .unwrap();
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":7:"));
}

#[test]
fn test_removing_last_user_of_restricted_record_is_refused() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(1));
    let mut project = harness.raw(project.id());
    project.set("owner", rowguard_storage::Value::Null).unwrap();

    let err = harness.store.save(&project).unwrap_err();
    assert!(matches!(err, rowguard_core::Error::AccessData { .. }));
    assert_eq!(harness.raw(project.id()).user("owner"), Some(UserId::new(1)));
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":1:"));
}
