//! Reconciliation semantics: deltas, idempotence and the pre-persist hook.

use rowguard_acl::{AccessControl, AccessRegistry, SchemaPolicy, VisibilityPolicy};
use rowguard_core::{AccessLevel, Error, Result, UserId};
use rowguard_storage::{CacheField, EntitySchema, InMemoryStore, Record, Store, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::common::{tracker_schema, Harness};

#[test]
fn test_reconcile_is_idempotent() {
    let harness = Harness::new();
    let project = harness.project("p", "restricted", Some(7));

    harness
        .store
        .update_fields("Project", project.id(), &[("visibility".into(), "public".into())])
        .unwrap();
    // Direct updates emit no events, so the cache is stale until reconciled.
    assert_eq!(harness.raw(project.id()).access().level(), AccessLevel::Restricted);

    let mut record = harness.raw(project.id());
    let changed = harness.control.reconcile(&mut record).unwrap();
    assert_eq!(changed, vec![CacheField::AccessLevel]);
    assert_eq!(record.access().level(), AccessLevel::Public);

    let again = harness.control.reconcile(&mut record).unwrap();
    assert!(again.is_empty());
    assert_eq!(harness.raw(project.id()).access(), record.access());
}

#[test]
fn test_reconcile_reports_each_changed_field() {
    let harness = Harness::new();
    let project = harness.project("p", "authorized", Some(7));
    harness
        .store
        .update_fields(
            "Project",
            project.id(),
            &[
                ("visibility".into(), "restricted".into()),
                ("owner".into(), Value::from(UserId::new(8))),
            ],
        )
        .unwrap();
    let mut record = harness.raw(project.id());
    assert_eq!(
        harness.control.reconcile(&mut record).unwrap(),
        vec![CacheField::AccessLevel, CacheField::PermittedUsers]
    );
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":8:"));
}

#[test]
fn test_allow_list_is_kept_for_unrestricted_levels() {
    let harness = Harness::new();
    let project = harness.project("p", "public", Some(7));
    assert_eq!(harness.permitted(project.id()).as_deref(), Some(":7:"));
    assert_eq!(project.access().level(), AccessLevel::Public);
}

#[derive(Default)]
struct Audited {
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<CacheField>>>,
    veto: bool,
}

impl VisibilityPolicy for Audited {
    fn access_level(&self, record: &Record, entity: &EntitySchema) -> AccessLevel {
        SchemaPolicy.access_level(record, entity)
    }

    fn before_access_save(&self, record: &mut Record, changed: &[CacheField]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(changed.to_vec());
        if self.veto {
            return Err(Error::config(format!("{record} is frozen")));
        }
        Ok(())
    }
}

fn audited_control(policy: Arc<Audited>) -> AccessControl {
    let schema = tracker_schema();
    let registry = AccessRegistry::builder()
        .policy("Project", policy)
        .build(&schema)
        .unwrap();
    AccessControl::install(Arc::new(InMemoryStore::new(schema).unwrap()), registry)
}

#[test]
fn test_pre_persist_hook_runs_only_on_change() {
    let policy = Arc::new(Audited::default());
    let control = audited_control(policy.clone());
    let projects = control.objects("Project").unwrap();

    let mut project = projects
        .create(
            Record::draft("Project")
                .with("owner", UserId::new(1))
                .unwrap(),
        )
        .unwrap();
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        policy.seen.lock().unwrap()[0],
        vec![CacheField::PermittedUsers]
    );

    // A save that changes nothing access-related does not reach the hook.
    project.set("title", "renamed").unwrap();
    projects.save(&mut project).unwrap();
    assert_eq!(policy.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_pre_persist_hook_can_abort() {
    let policy = Arc::new(Audited {
        veto: true,
        ..Audited::default()
    });
    let control = audited_control(policy.clone());
    let err = control
        .objects("Project")
        .unwrap()
        .create(
            Record::draft("Project")
                .with("owner", UserId::new(1))
                .unwrap(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("frozen"));
    assert_eq!(control.store().fetch(&rowguard_storage::Query::all("Project")).unwrap().len(), 0);
}

struct OwnerPlusAuditors;

impl VisibilityPolicy for OwnerPlusAuditors {
    fn access_level(&self, _: &Record, _: &EntitySchema) -> AccessLevel {
        AccessLevel::Restricted
    }

    fn allowed_users(
        &self,
        record: &Record,
        entity: &EntitySchema,
        store: &dyn Store,
    ) -> Result<BTreeSet<UserId>> {
        let mut users = rowguard_acl::policy::restricted_users(record, entity, store)?;
        users.insert(UserId::new(1000));
        Ok(users)
    }
}

#[test]
fn test_custom_allowed_users() {
    let schema = tracker_schema();
    let registry = AccessRegistry::builder()
        .policy("Project", Arc::new(OwnerPlusAuditors))
        .build(&schema)
        .unwrap();
    let control = AccessControl::install(Arc::new(InMemoryStore::new(schema).unwrap()), registry);
    let project = control
        .objects("Project")
        .unwrap()
        .create(Record::draft("Project"))
        .unwrap();
    assert_eq!(
        project.access().permitted_users().map(|l| l.as_str()),
        Some(":1000:")
    );
}
