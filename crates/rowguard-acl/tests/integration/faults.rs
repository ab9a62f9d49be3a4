//! The error taxonomy as seen from callers.

use rowguard_core::context::{with_identity, with_super_identity};
use rowguard_core::{AccessLevel, Error, Identity, RecordId, UserId};
use rowguard_storage::{AccessFields, CacheField, InMemoryStore, Record, Snapshot, Store};
use std::sync::Arc;

use crate::common::{tracker_schema, Harness};

#[test]
fn test_unwired_store_refuses_controlled_writes() {
    let store = InMemoryStore::new(tracker_schema()).unwrap();
    let err = store.insert(Record::draft("Project")).unwrap_err();
    assert!(matches!(err, Error::BadManager { ref entity_type } if entity_type == "Project"));
    assert!(err.is_fault());

    // Plain types are unaffected.
    store.insert(Record::draft("Task")).unwrap();
}

#[test]
fn test_delete_requires_access() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));
    let projects = harness.control.objects("Project").unwrap();

    let err = with_identity(Identity::user(3), || projects.delete(project.id())).unwrap_err();
    assert!(matches!(
        err,
        Error::AccessDenied { identity, .. } if identity == Identity::user(3)
    ));
    assert!(!err.is_fault());

    let err = projects
        .clone()
        .as_identity(Identity::Anonymous)
        .delete(project.id())
        .unwrap_err();
    assert!(matches!(err, Error::AccessDenied { .. }));

    let deleted = with_identity(Identity::user(7), || projects.delete(project.id())).unwrap();
    assert_eq!(deleted.id(), project.id());
    assert!(harness.store.get("Project", project.id()).unwrap().is_none());
}

#[test]
fn test_delete_of_public_record_is_open() {
    let harness = Harness::new();
    let project = harness.project("p", "public", None);
    let projects = harness.control.objects("Project").unwrap();
    with_identity(Identity::Anonymous, || projects.delete(project.id())).unwrap();
}

fn broken_snapshot() -> Snapshot {
    let mut project = Record::new("Project", RecordId::new(1))
        .with("visibility", "restricted")
        .unwrap()
        .with("owner", UserId::new(7))
        .unwrap();
    project.store_access_cache(AccessFields::new(AccessLevel::Restricted, None));
    Snapshot {
        schema: tracker_schema(),
        records: vec![project],
        members: Vec::new(),
    }
}

#[test]
fn test_broken_cache_surfaces_as_access_data() {
    let store = Arc::new(InMemoryStore::from_snapshot(broken_snapshot()).unwrap());
    let harness = Harness::with_store(store);
    let projects = harness.control.objects("Project").unwrap();

    let err = with_identity(Identity::user(7), || projects.delete(RecordId::new(1))).unwrap_err();
    assert!(matches!(err, Error::AccessData { .. }));

    // Reads filter it out for users rather than failing.
    with_identity(Identity::user(7), || {
        assert_eq!(projects.count().unwrap(), 0);
    });

    // A reconcile repairs it.
    let mut record = harness.raw(RecordId::new(1));
    harness.control.reconcile(&mut record).unwrap();
    with_identity(Identity::user(7), || {
        assert_eq!(projects.count().unwrap(), 1);
    });
}

#[test]
fn test_cache_writes_need_super() {
    let harness = Harness::new();
    let project = harness.project("p", "authorized", Some(7));
    let public = AccessFields::new(AccessLevel::Public, None);

    let err = with_identity(Identity::user(7), || {
        harness.store.update_access_fields(
            "Project",
            project.id(),
            &public,
            &[CacheField::AccessLevel],
        )
    })
    .unwrap_err();
    assert!(matches!(err, Error::PrivilegeRequired(_)));

    with_super_identity(|| {
        harness.store.update_access_fields(
            "Project",
            project.id(),
            &public,
            &[CacheField::AccessLevel],
        )
    })
    .unwrap();
    assert_eq!(harness.raw(project.id()).access().level(), AccessLevel::Public);
}

#[test]
fn test_cache_columns_are_read_only() {
    let harness = Harness::new();
    let project = harness.project("p", "authorized", Some(7));
    let err = harness
        .store
        .update_fields(
            "Project",
            project.id(),
            &[("access_permitted_users_cache".into(), ":1:".into())],
        )
        .unwrap_err();
    assert!(matches!(err, Error::ReadOnlyField(_)));

    let mut record = harness.raw(project.id());
    assert!(record.set("access_level_cache", "public").is_err());
}

#[test]
fn test_manager_rejects_foreign_records() {
    let harness = Harness::new();
    let err = harness
        .control
        .objects("Project")
        .unwrap()
        .create(Record::draft("Notice"))
        .unwrap_err();
    assert!(matches!(err, Error::Schema { .. }));
}
