//! Lease handle behavior: use after release, drop-driven release and
//! scoped borrows.

mod common;

use common::{Tracked, eventually, key, pool};
use keel_resource::{Error, Lifecycle, PoolEvent};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn get_after_release_is_an_error() {
    let pool = pool(Tracked::new());
    let mut lease = pool.borrow(key("a")).await.unwrap();
    assert_eq!(lease.get().unwrap().key, "a");

    lease.release().await.unwrap();
    let err = lease.get().unwrap_err();
    assert!(matches!(err, Error::UseAfterRelease { ref key } if key == "\"a\""));
    assert_eq!(err.to_string(), "Lease for '\"a\"' used after release");
}

#[tokio::test]
#[should_panic(expected = "used after release")]
async fn deref_after_release_panics() {
    let pool = pool(Tracked::new());
    let mut lease = pool.borrow(key("a")).await.unwrap();
    lease.release().await.unwrap();
    let generation = lease.generation;
    assert_eq!(generation, 0);
}

#[tokio::test]
async fn released_lease_keeps_its_identity() {
    let pool = pool(Tracked::new());
    let mut lease = pool.borrow(key("id")).await.unwrap();
    let entry = lease.entry_id();
    lease.release().await.unwrap();

    assert!(lease.is_released());
    assert_eq!(lease.entry_id(), entry);
    assert_eq!(lease.key(), "id");
}

#[tokio::test]
async fn dropping_a_lease_releases_it() {
    let pool = pool(Tracked::new());
    let mut events = pool.subscribe();

    let lease = pool.borrow(key("d")).await.unwrap();
    drop(lease);

    eventually(|| pool.state(&key("d")) == Lifecycle::Absent).await;
    assert_eq!(pool.resource().teardowns(), 1);

    let mut torn_down = false;
    while let Ok(event) = events.recv().await {
        if matches!(event, PoolEvent::TornDown { .. }) {
            torn_down = true;
            break;
        }
    }
    assert!(torn_down);
}

#[tokio::test]
async fn dropping_one_of_many_leases_only_decrements() {
    let pool = pool(Tracked::new());
    let kept = pool.borrow(key("m")).await.unwrap();
    let dropped = pool.borrow(key("m")).await.unwrap();
    drop(dropped);

    eventually(|| pool.borrow_count(&key("m")) == Some(1)).await;
    assert_eq!(pool.resource().teardowns(), 0);
    assert_eq!(kept.get().unwrap().key, "m");
}

#[test]
fn lease_dropped_outside_a_runtime_is_still_torn_down() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let pool = pool(Tracked::new());
    let lease = runtime.block_on(pool.borrow(key("offline"))).unwrap();
    let mut events = pool.subscribe();

    drop(lease);

    assert_eq!(pool.state(&key("offline")), Lifecycle::Absent);
    assert_eq!(pool.closing_count(), 0);
    assert_eq!(pool.resource().teardowns_for("offline"), 1);
    let stats = pool.stats();
    assert_eq!(stats.releases, 1);
    assert_eq!(stats.torn_down, 1);
    assert_eq!(stats.teardown_failures, 0);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.as_slice(), [
        PoolEvent::Released { remaining: 0, .. },
        PoolEvent::Closing { .. },
        PoolEvent::TornDown { .. },
    ]));
}

#[tokio::test]
async fn scoped_returns_the_closure_output_and_releases() {
    let pool = pool(Tracked::new());
    let generation = pool
        .scoped(key("s"), |lease| Box::pin(async move { lease.get().unwrap().generation }))
        .await
        .unwrap();

    assert_eq!(generation, 0);
    assert_eq!(pool.state(&key("s")), Lifecycle::Absent);
    assert_eq!(pool.resource().teardowns_for("s"), 1);
}

#[tokio::test]
async fn nested_scopes_share_one_instance() {
    let pool = pool(Tracked::new());
    let outer = pool.clone();
    let (outer_generation, inner_generation) = outer
        .scoped(key("n"), |lease| {
            Box::pin(async move {
                let inner = pool
                    .scoped(key("n"), |inner| Box::pin(async move { inner.generation }))
                    .await
                    .unwrap();
                (lease.generation, inner)
            })
        })
        .await
        .unwrap();

    assert_eq!(outer_generation, inner_generation);
    assert_eq!(outer.resource().creates(), 1);
    assert_eq!(outer.resource().teardowns(), 1);
}

#[tokio::test]
async fn scoped_reports_teardown_failure() {
    let pool = pool(Tracked::new());
    pool.resource().fail_teardowns();

    let result = pool
        .scoped(key("f"), |lease| Box::pin(async move { lease.generation }))
        .await;
    assert!(matches!(result, Err(Error::TeardownFailed { .. })));
    assert_eq!(pool.state(&key("f")), Lifecycle::Absent);
}

#[tokio::test]
async fn scoped_releases_when_the_body_panics() {
    let pool = pool(Tracked::new());
    let task_pool = pool.clone();

    let joined = tokio::spawn(async move {
        task_pool
            .scoped(key("p"), |lease| {
                Box::pin(async move {
                    let generation = lease.get().map(|handle| handle.generation).unwrap_or_default();
                    assert!(generation > 100, "scoped body failed");
                    generation
                })
            })
            .await
    })
    .await;
    assert!(joined.unwrap_err().is_panic());

    eventually(|| pool.state(&key("p")) == Lifecycle::Absent).await;
    assert_eq!(pool.resource().teardowns_for("p"), 1);
}
