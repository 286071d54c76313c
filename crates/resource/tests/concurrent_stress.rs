//! Concurrent stress test for the keyed pool.
//!
//! Many tasks borrow and release a handful of keys at random. Afterwards
//! nothing may be live or closing, and every creation must be matched by
//! exactly one teardown.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use common::{Tracked, key, pool};
use keel_resource::Lifecycle;
use tokio::task::JoinSet;

const KEYS: [&str; 3] = ["alpha", "beta", "gamma"];

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_50_tasks_random_borrow_release() {
    let pool = pool(Tracked::new());
    let success_count = Arc::new(AtomicU64::new(0));
    let mut set = JoinSet::new();

    for task in 0..50_usize {
        let pool = pool.clone();
        let success_count = Arc::clone(&success_count);
        set.spawn(async move {
            // Each task does 20 borrow/release cycles
            for cycle in 0..20_usize {
                let name = KEYS[(task + cycle) % KEYS.len()];
                let mut lease = pool.borrow(key(name)).await.expect("task should borrow");
                assert_eq!(lease.get().expect("lease is live").key, name);
                if cycle % 3 == 0 {
                    tokio::time::sleep(Duration::from_micros(200)).await;
                }
                if cycle % 2 == 0 {
                    lease.release().await.expect("teardown should succeed");
                } else {
                    drop(lease);
                }
                tokio::task::yield_now().await;
            }
            success_count.fetch_add(1, Ordering::SeqCst);
        });
    }

    // Timeout as a safety net against deadlock
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    while let Some(result) = tokio::time::timeout_at(deadline, set.join_next())
        .await
        .expect("stress test should not deadlock (30s timeout)")
    {
        result.expect("task should not panic");
    }
    assert_eq!(success_count.load(Ordering::SeqCst), 50);

    // Dropped leases release in the background.
    common::eventually(|| {
        let stats = pool.stats();
        stats.releases == 1000 && stats.live_entries == 0 && stats.closing_entries == 0
    })
    .await;

    let stats = pool.stats();
    assert_eq!(stats.borrows, 1000);
    assert_eq!(stats.releases, stats.borrows);
    assert_eq!(stats.created, stats.torn_down);
    assert_eq!(stats.teardown_failures, 0);
    assert_eq!(pool.resource().creates() as u64, stats.created);
    assert_eq!(pool.resource().teardowns() as u64, stats.torn_down);
    for name in KEYS {
        assert_eq!(pool.state(&key(name)), Lifecycle::Absent);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_holders_keep_one_instance_alive() {
    let pool = pool(Tracked::new());
    let anchor = pool.borrow(key("shared")).await.unwrap();

    let mut set = JoinSet::new();
    for _ in 0..32 {
        let pool = pool.clone();
        set.spawn(async move {
            for _ in 0..10 {
                let mut lease = pool.borrow(key("shared")).await.unwrap();
                lease.release().await.unwrap();
            }
        });
    }
    while let Some(result) = set.join_next().await {
        result.expect("task should not panic");
    }

    // The anchor held the entry the whole time.
    assert_eq!(pool.resource().creates(), 1);
    assert_eq!(pool.resource().teardowns(), 0);
    assert_eq!(pool.borrow_count(&key("shared")), Some(1));
    drop(anchor);
}
