//! End-to-end scenarios from the specification (§8 "Concrete end-to-end scenarios").
//!
//! Each test is named after its scenario id so a failure maps directly back to the section
//! that describes the expected behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cache_rs::config::EvictionPolicyKind;
use cache_rs::{Builder, Cache};

/// S1 — Basic TTL: an entry becomes unobservable once `expireAfterWrite` has elapsed.
#[test]
fn s1_basic_ttl() {
    let cache: Cache<&str, i32> = Builder::new()
        .maximum_size(2)
        .expire_after_write(Duration::from_millis(50))
        .build()
        .unwrap();

    cache.put("a", 1).unwrap();
    cache.put("b", 2).unwrap();
    assert_eq!(cache.get(&"a"), Some(1));

    thread::sleep(Duration::from_millis(60));
    assert_eq!(cache.get(&"a"), None);
}

/// S2 — LRU eviction: the least recently used key is evicted to admit a third entry.
#[test]
fn s2_lru_eviction() {
    let cache: Cache<&str, i32> = Builder::new()
        .maximum_size(2)
        .eviction_policy(EvictionPolicyKind::Lru)
        .concurrency_level(1)
        .build()
        .unwrap();

    cache.put("a", 1).unwrap();
    cache.put("b", 2).unwrap();
    cache.get(&"a");
    cache.put("c", 3).unwrap();

    assert_eq!(cache.get(&"b"), None);
    assert_eq!(cache.get(&"a"), Some(1));
    assert_eq!(cache.get(&"c"), Some(3));
}

/// S3 — Single-flight load: 100 concurrent callers for the same missing key see the loader
/// invoked exactly once and all observe its result.
#[test]
fn s3_single_flight_load() {
    let cache: Cache<&str, usize, _, std::convert::Infallible> =
        Builder::new().maximum_size(10).record_stats(true).build().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let cache = cache.clone();
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                cache
                    .get_with("hello", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(100));
                        Ok("hello".len())
                    })
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 5);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().load_success_count, 1);
}

/// S4 — Weight-based admission: aggregate weight never exceeds `maximumWeight` once entries
/// have been evicted to fit.
#[test]
fn s4_weight_based_admission() {
    let cache: Cache<&str, &str> = Builder::new()
        .maximum_weight(10)
        .weigher(|_: &&str, v: &&str| v.len() as u64)
        .concurrency_level(1)
        .build()
        .unwrap();

    cache.put("a", "xxxxx").unwrap();
    cache.put("b", "xxxx").unwrap();
    cache.put("c", "xxx").unwrap();

    let total_weight: u64 = [("a", "xxxxx"), ("b", "xxxx"), ("c", "xxx")]
        .iter()
        .filter_map(|(k, v)| cache.get(k).map(|_| v.len() as u64))
        .sum();
    assert!(total_weight <= 10, "aggregate weight {total_weight} exceeds maximumWeight");
}

/// S5 — Window-TinyLFU admission: a cold one-off candidate does not displace a warmed-up
/// working set of equally-sized hot keys.
#[test]
fn s5_window_tinylfu_admission() {
    let cache: Cache<String, i32> = Builder::new()
        .maximum_size(10)
        .eviction_policy(EvictionPolicyKind::WindowTinyLfu)
        .frequency_sketch(cache_rs::SketchKind::Basic)
        .concurrency_level(1)
        .build()
        .unwrap();

    let hot_keys: Vec<String> = (0..10).map(|i| format!("hot{i}")).collect();
    for key in &hot_keys {
        cache.put(key.clone(), 1).unwrap();
    }
    for _ in 0..100 {
        for key in &hot_keys {
            cache.get(key);
        }
    }

    cache.put("cold".to_string(), 1).unwrap();

    let hot_present = hot_keys.iter().filter(|k| cache.get(*k).is_some()).count();
    assert!(
        hot_present >= hot_keys.len() - 1,
        "expected nearly all warmed-up hot keys to survive a single cold insert, saw {hot_present}/{}",
        hot_keys.len()
    );
}

/// S6 — Refresh-after-write: a stale value is served immediately while a reload runs in the
/// background, and a subsequent read observes the refreshed value.
#[test]
fn s6_refresh_after_write() {
    let counter = Arc::new(AtomicUsize::new(0));
    let loader_counter = Arc::clone(&counter);
    let cache: Cache<&str, i32, _, std::convert::Infallible> = Builder::new()
        .maximum_size(10)
        .refresh_after_write(Duration::from_millis(20))
        .loader(move |_: &&str| {
            let n = loader_counter.fetch_add(1, Ordering::SeqCst) as i32 + 1;
            Ok(n)
        })
        .build()
        .unwrap();

    cache.put("k", 0).unwrap();
    thread::sleep(Duration::from_millis(25));
    // The stale value is still returned immediately; this call also kicks off a reload.
    assert_eq!(cache.get(&"k"), Some(0));

    thread::sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&"k"), Some(1));
}
