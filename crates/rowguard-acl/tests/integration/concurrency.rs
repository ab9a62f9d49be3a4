//! Concurrent operations with distinct acting identities.

use rowguard_core::context::{established_identity, scope_identity, with_identity};
use rowguard_core::Identity;
use std::sync::Arc;

use crate::common::Harness;

fn shared() -> Arc<Harness> {
    let harness = Harness::new();
    harness.project("open", "public", None);
    harness.project("internal", "authorized", None);
    for owner in 1..=4 {
        harness.project(&format!("secret-{owner}"), "restricted", Some(owner));
    }
    Arc::new(harness)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tasks_filter_for_their_own_identity() {
    let harness = shared();
    let mut tasks = Vec::new();
    for owner in 1..=4i64 {
        let harness = harness.clone();
        tasks.push(tokio::spawn(scope_identity(
            Identity::user(owner),
            async move {
                let mut counts = Vec::new();
                for _ in 0..10 {
                    let projects = harness.control.objects("Project").unwrap();
                    counts.push((established_identity(), projects.count().unwrap()));
                    tokio::task::yield_now().await;
                }
                (owner, counts)
            },
        )));
    }
    let anonymous = {
        let harness = harness.clone();
        tokio::spawn(scope_identity(Identity::Anonymous, async move {
            harness.control.objects("Project").unwrap().count().unwrap()
        }))
    };

    for task in tasks {
        let (owner, counts) = task.await.unwrap();
        for (identity, count) in counts {
            assert_eq!(identity, Some(Identity::user(owner)));
            assert_eq!(count, 3);
        }
    }
    assert_eq!(anonymous.await.unwrap(), 1);
}

#[test]
fn test_threads_filter_for_their_own_identity() {
    let harness = shared();
    let handles: Vec<_> = [Identity::Super, Identity::user(2), Identity::Anonymous]
        .into_iter()
        .map(|identity| {
            let harness = harness.clone();
            std::thread::spawn(move || {
                with_identity(identity, || {
                    harness.control.objects("Project").unwrap().count().unwrap()
                })
            })
        })
        .collect();
    let counts: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(counts, vec![6, 3, 1]);
}
