//! Concurrent invariant tests (spec §8 "Invariants").
//!
//! Grounded on the reference crate's `concurrent_stress_tests.rs` (many threads hammering a
//! shared cache, asserting on aggregate invariants rather than per-op ordering), adapted from
//! its per-algorithm `Concurrent*Cache` types to this crate's single sharded `Cache`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use cache_rs::config::EvictionPolicyKind;
use cache_rs::{Builder, Cache};

const NUM_THREADS: usize = 16;
const OPS_PER_THREAD: u64 = 2_000;

/// Invariant 1: `size() <= maximumSize` holds throughout concurrent puts, for every policy.
#[test]
fn size_never_exceeds_maximum_size_under_concurrent_puts() {
    for policy in [
        EvictionPolicyKind::Lru,
        EvictionPolicyKind::Lfu,
        EvictionPolicyKind::Fifo,
        EvictionPolicyKind::Lifo,
        EvictionPolicyKind::WindowTinyLfu,
    ] {
        let cache: Cache<u64, u64> = Builder::new()
            .maximum_size(100)
            .eviction_policy(policy)
            .concurrency_level(8)
            .build()
            .unwrap();

        thread::scope(|scope| {
            for t in 0..NUM_THREADS as u64 {
                let cache = cache.clone();
                scope.spawn(move || {
                    for i in 0..OPS_PER_THREAD {
                        let key = t * OPS_PER_THREAD + i;
                        cache.put(key, key).unwrap();
                    }
                });
            }
        });

        assert!(
            cache.size() <= 100,
            "{policy:?}: size {} exceeded maximumSize 100",
            cache.size()
        );
    }
}

/// Invariant 2: aggregate weight never exceeds `maximumWeight` under concurrent puts.
#[test]
fn aggregate_weight_never_exceeds_maximum_weight_under_concurrent_puts() {
    let cache: Cache<u64, Vec<u8>> = Builder::new()
        .maximum_weight(1000)
        .weigher(|_: &u64, v: &Vec<u8>| v.len() as u64)
        .concurrency_level(8)
        .build()
        .unwrap();

    thread::scope(|scope| {
        for t in 0..NUM_THREADS as u64 {
            let cache = cache.clone();
            scope.spawn(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = t * OPS_PER_THREAD + i;
                    cache.put(key, vec![0u8; 5]).unwrap();
                }
            });
        }
    });

    let total_weight: u64 = cache.stats().eviction_weight;
    let _ = total_weight; // evictions happened; the authoritative check is the shard sum below.
    // Re-derive aggregate weight directly rather than trusting only the eviction counter.
    let mut observed_weight = 0u64;
    for key in 0..(NUM_THREADS as u64 * OPS_PER_THREAD) {
        if let Some(v) = cache.get(&key) {
            observed_weight += v.len() as u64;
        }
    }
    assert!(
        observed_weight <= 1000,
        "observed aggregate weight {observed_weight} exceeds maximumWeight 1000"
    );
}

/// Invariant 3 (single-flight): concurrent `get_with` calls for the same key invoke the loader
/// exactly once, even with many distinct keys contended simultaneously.
#[test]
fn single_flight_holds_across_many_distinct_keys_concurrently() {
    let cache: Cache<u64, u64, _, std::convert::Infallible> =
        Builder::new().maximum_size(1000).record_stats(true).build().unwrap();
    let load_calls = Arc::new(AtomicUsize::new(0));

    thread::scope(|scope| {
        for _ in 0..NUM_THREADS {
            let cache = cache.clone();
            let load_calls = Arc::clone(&load_calls);
            scope.spawn(move || {
                for key in 0..50u64 {
                    let load_calls = Arc::clone(&load_calls);
                    cache
                        .get_with(key, move || {
                            load_calls.fetch_add(1, Ordering::SeqCst);
                            Ok(key)
                        })
                        .unwrap();
                }
            });
        }
    });

    // Every key is loaded at most once per miss epoch; with 50 keys and no expiration, that is
    // exactly 50 loader invocations total across every thread.
    assert_eq!(load_calls.load(Ordering::SeqCst), 50);
    assert_eq!(cache.stats().load_success_count, 50);
}

/// Invariant 7: removing a key removes it from both the map and the policy before `remove`
/// returns — observable here as "no get ever resurrects a removed key".
#[test]
fn concurrent_put_remove_never_resurrects_a_key() {
    let cache: Cache<u64, u64> = Builder::new().maximum_size(100).concurrency_level(4).build().unwrap();

    thread::scope(|scope| {
        for _ in 0..NUM_THREADS {
            let cache = cache.clone();
            scope.spawn(move || {
                for _ in 0..OPS_PER_THREAD {
                    cache.put(1, 1).unwrap();
                    cache.remove(&1);
                }
            });
        }
    });

    // After every thread has finished, the key is either absent or holds its only ever-written
    // value -- never a torn or stale read.
    if let Some(value) = cache.get(&1) {
        assert_eq!(value, 1);
    }
}
