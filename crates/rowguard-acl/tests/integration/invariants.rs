//! Property tests over random relational histories.

use proptest::prelude::*;
use rowguard_core::context::with_super_identity;
use rowguard_core::{AccessLevel, RecordId, UserId};
use rowguard_storage::{InMemoryStore, Query, Record, Store};
use std::sync::Arc;

use crate::common::{linked_schema, Harness};

#[derive(Clone, Debug)]
enum Op {
    Create { visibility: usize, owner: Option<i64> },
    SetVisibility { project: usize, visibility: usize },
    SetOwner { project: usize, owner: Option<i64> },
    AddMember { project: usize, user: i64 },
    RemoveMember { project: usize, user: i64 },
    ClearMembers { project: usize },
    AddReview { project: usize, user: i64 },
    DeleteReview { review: usize },
    MoveReview { review: usize, project: usize },
}

const VISIBILITY: [&str; 4] = ["public", "authorized", "restricted", "bogus"];

fn op() -> impl Strategy<Value = Op> {
    let user = 1i64..6;
    prop_oneof![
        (0..VISIBILITY.len(), prop::option::of(user.clone()))
            .prop_map(|(visibility, owner)| Op::Create { visibility, owner }),
        (0..8usize, 0..VISIBILITY.len())
            .prop_map(|(project, visibility)| Op::SetVisibility { project, visibility }),
        (0..8usize, prop::option::of(user.clone()))
            .prop_map(|(project, owner)| Op::SetOwner { project, owner }),
        (0..8usize, user.clone()).prop_map(|(project, user)| Op::AddMember { project, user }),
        (0..8usize, user.clone()).prop_map(|(project, user)| Op::RemoveMember { project, user }),
        (0..8usize).prop_map(|project| Op::ClearMembers { project }),
        (0..8usize, user).prop_map(|(project, user)| Op::AddReview { project, user }),
        (0..8usize).prop_map(|review| Op::DeleteReview { review }),
        (0..8usize, 0..8usize).prop_map(|(review, project)| Op::MoveReview { review, project }),
    ]
}

fn nth(harness: &Harness, entity_type: &str, index: usize) -> Option<Record> {
    let all = harness.store.fetch(&Query::all(entity_type)).ok()?;
    if all.is_empty() {
        None
    } else {
        Some(all[index % all.len()].clone())
    }
}

/// Applies `op`, ignoring the failures the engine is allowed to produce.
fn apply(harness: &Harness, op: &Op) {
    let store = &harness.store;
    let _ = with_super_identity(|| -> rowguard_core::Result<()> {
        match op {
            Op::Create { visibility, owner } => {
                let mut record = Record::draft("Project").with("visibility", VISIBILITY[*visibility])?;
                if let Some(owner) = owner {
                    record.set("owner", UserId::new(*owner))?;
                }
                store.insert(record)?;
            }
            Op::SetVisibility { project, visibility } => {
                if let Some(mut record) = nth(harness, "Project", *project) {
                    record.set("visibility", VISIBILITY[*visibility])?;
                    store.save(&record)?;
                }
            }
            Op::SetOwner { project, owner } => {
                if let Some(mut record) = nth(harness, "Project", *project) {
                    record.set("owner", owner.map(UserId::new))?;
                    store.save(&record)?;
                }
            }
            Op::AddMember { project, user } => {
                if let Some(record) = nth(harness, "Project", *project) {
                    store.add_members("Project", record.id(), "members", &[UserId::new(*user)])?;
                }
            }
            Op::RemoveMember { project, user } => {
                if let Some(record) = nth(harness, "Project", *project) {
                    store.remove_members("Project", record.id(), "members", &[UserId::new(*user)])?;
                }
            }
            Op::ClearMembers { project } => {
                if let Some(record) = nth(harness, "Project", *project) {
                    store.clear_members("Project", record.id(), "members")?;
                }
            }
            Op::AddReview { project, user } => {
                if let Some(record) = nth(harness, "Project", *project) {
                    store.insert(
                        Record::draft("Review")
                            .with("project", record.id())?
                            .with("reviewer", UserId::new(*user))?,
                    )?;
                }
            }
            Op::DeleteReview { review } => {
                if let Some(record) = nth(harness, "Review", *review) {
                    store.delete("Review", record.id())?;
                }
            }
            Op::MoveReview { review, project } => {
                if let (Some(mut record), Some(target)) = (
                    nth(harness, "Review", *review),
                    nth(harness, "Project", *project),
                ) {
                    record.set("project", target.id())?;
                    store.save(&record)?;
                }
            }
        }
        Ok(())
    });
}

/// History steps over the folder/board schema, where one link row feeds two
/// controlled records.
#[derive(Clone, Debug)]
enum LinkOp {
    Create { board: bool, visibility: usize },
    SetVisibility { board: bool, index: usize, visibility: usize },
    AddLink { folder: usize, board: usize, user: i64 },
    MoveLink { link: usize, folder: usize, board: usize },
    SetLinkUser { link: usize, user: i64 },
    DeleteLink { link: usize },
}

fn link_op() -> impl Strategy<Value = LinkOp> {
    let user = 1i64..5;
    prop_oneof![
        (any::<bool>(), 0..VISIBILITY.len())
            .prop_map(|(board, visibility)| LinkOp::Create { board, visibility }),
        (any::<bool>(), 0..6usize, 0..VISIBILITY.len()).prop_map(|(board, index, visibility)| {
            LinkOp::SetVisibility { board, index, visibility }
        }),
        (0..6usize, 0..6usize, user.clone())
            .prop_map(|(folder, board, user)| LinkOp::AddLink { folder, board, user }),
        (0..6usize, 0..6usize, 0..6usize)
            .prop_map(|(link, folder, board)| LinkOp::MoveLink { link, folder, board }),
        (0..6usize, user).prop_map(|(link, user)| LinkOp::SetLinkUser { link, user }),
        (0..6usize).prop_map(|link| LinkOp::DeleteLink { link }),
    ]
}

fn apply_link(harness: &Harness, op: &LinkOp) {
    let store = &harness.store;
    let kind = |board: bool| if board { "Board" } else { "Folder" };
    let _ = with_super_identity(|| -> rowguard_core::Result<()> {
        match op {
            LinkOp::Create { board, visibility } => {
                store.insert(Record::draft(kind(*board)).with("visibility", VISIBILITY[*visibility])?)?;
            }
            LinkOp::SetVisibility { board, index, visibility } => {
                if let Some(mut record) = nth(harness, kind(*board), *index) {
                    record.set("visibility", VISIBILITY[*visibility])?;
                    store.save(&record)?;
                }
            }
            LinkOp::AddLink { folder, board, user } => {
                if let (Some(folder), Some(board)) =
                    (nth(harness, "Folder", *folder), nth(harness, "Board", *board))
                {
                    store.insert(
                        Record::draft("Link")
                            .with("folder", folder.id())?
                            .with("board", board.id())?
                            .with("user", UserId::new(*user))?,
                    )?;
                }
            }
            LinkOp::MoveLink { link, folder, board } => {
                if let (Some(mut record), Some(folder), Some(board)) = (
                    nth(harness, "Link", *link),
                    nth(harness, "Folder", *folder),
                    nth(harness, "Board", *board),
                ) {
                    record.set("folder", folder.id())?;
                    record.set("board", board.id())?;
                    store.save(&record)?;
                }
            }
            LinkOp::SetLinkUser { link, user } => {
                if let Some(mut record) = nth(harness, "Link", *link) {
                    record.set("user", UserId::new(*user))?;
                    store.save(&record)?;
                }
            }
            LinkOp::DeleteLink { link } => {
                if let Some(record) = nth(harness, "Link", *link) {
                    store.delete("Link", record.id())?;
                }
            }
        }
        Ok(())
    });
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_restricted_always_has_allow_list(ops in prop::collection::vec(op(), 1..40)) {
        let harness = Harness::new();
        for op in &ops {
            apply(&harness, op);
        }
        for record in harness.store.fetch(&Query::all("Project")).unwrap() {
            prop_assert!(
                record.access().is_consistent(),
                "{record} cached as RESTRICTED without users"
            );
        }
    }

    #[test]
    fn test_caches_track_relational_state(ops in prop::collection::vec(op(), 1..40)) {
        let harness = Harness::new();
        for op in &ops {
            apply(&harness, op);
        }
        for record in harness.store.fetch(&Query::all("Project")).unwrap() {
            let intended = harness.control.registry().intended(harness.store.as_ref(), &record).unwrap();
            prop_assert_eq!(record.access(), &intended);
            let mut copy = record.clone();
            prop_assert!(harness.control.reconcile(&mut copy).unwrap().is_empty());
        }
    }

    #[test]
    fn test_shared_links_keep_every_target_current(ops in prop::collection::vec(link_op(), 1..40)) {
        let harness = Harness::with_store(Arc::new(InMemoryStore::new(linked_schema()).unwrap()));
        for op in &ops {
            apply_link(&harness, op);
        }
        for entity_type in ["Folder", "Board"] {
            for record in harness.store.fetch(&Query::all(entity_type)).unwrap() {
                prop_assert!(record.access().is_consistent());
                let intended = harness.control.registry().intended(harness.store.as_ref(), &record).unwrap();
                prop_assert_eq!(record.access(), &intended);
            }
        }
    }

    #[test]
    fn test_restricted_members_are_exactly_the_audience(
        owner in 1i64..50,
        members in prop::collection::btree_set(1i64..50, 0..6),
        candidate in 1i64..50,
    ) {
        let harness = Harness::new();
        let project = harness.project("p", "restricted", Some(owner));
        let users: Vec<UserId> = members.iter().copied().map(UserId::new).collect();
        harness.control.objects("Project").unwrap()
            .set_members(project.id(), "members", &users).unwrap();

        let visible = harness
            .control
            .objects("Project")
            .unwrap()
            .as_identity(rowguard_core::Identity::user(candidate))
            .get(RecordId::new(1))
            .unwrap()
            .is_some();
        prop_assert_eq!(visible, candidate == owner || members.contains(&candidate));
        prop_assert_eq!(harness.raw(project.id()).access().level(), AccessLevel::Restricted);
    }
}
