//! Atomic hit/miss/load/eviction counters and the rates derived from them.
//!
//! Grounded on the reference crate's `metrics/mod.rs` (`CoreCacheMetrics`), which snapshots
//! counters into a `BTreeMap<String, f64>` for deterministic reporting. That snapshot shape is
//! kept ([`StatsSnapshot::as_btreemap`]), but the counters themselves move from plain `u64`
//! fields (meant for single-threaded segments) to atomics, since a [`StatisticsRecorder`] is
//! shared across every shard of a concurrent cache.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live, atomically-updated counters backing a cache's statistics (spec §4.6).
///
/// Individual counters are each internally consistent, but a snapshot taken across multiple
/// counters is not atomic as a whole — two fields read a moment apart may describe slightly
/// different points in time. This mirrors Caffeine/Guava's documented behavior for the same
/// reason: making the whole snapshot atomic would require serializing every recorded
/// operation behind one lock, defeating the point of per-shard counters.
#[derive(Debug, Default)]
pub struct StatisticsRecorder {
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    load_success_count: AtomicU64,
    load_failure_count: AtomicU64,
    total_load_time_nanos: AtomicU64,
    eviction_count: AtomicU64,
    eviction_weight: AtomicU64,
    enabled: bool,
}

/// A point-in-time read of every counter, plus the rates derived from them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub hit_count: u64,
    pub miss_count: u64,
    pub load_success_count: u64,
    pub load_failure_count: u64,
    pub total_load_time_nanos: u64,
    pub eviction_count: u64,
    pub eviction_weight: u64,
}

impl StatsSnapshot {
    /// `hitCount + missCount`.
    pub fn request_count(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    /// `hitCount / requestCount`, or `1.0` with no requests recorded yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.request_count();
        if total == 0 {
            1.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }

    /// `missCount / requestCount`, or `0.0` with no requests recorded yet.
    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }

    /// `loadFailureCount / (loadSuccessCount + loadFailureCount)`, or `0.0` if nothing loaded.
    pub fn load_failure_rate(&self) -> f64 {
        let total = self.load_success_count + self.load_failure_count;
        if total == 0 {
            0.0
        } else {
            self.load_failure_count as f64 / total as f64
        }
    }

    /// Mean nanoseconds spent per load attempt (success or failure).
    pub fn average_load_penalty(&self) -> f64 {
        let total = self.load_success_count + self.load_failure_count;
        if total == 0 {
            0.0
        } else {
            self.total_load_time_nanos as f64 / total as f64
        }
    }

    /// Renders the snapshot as a `BTreeMap` for deterministic, order-stable reporting — the
    /// same shape the reference crate's `CoreCacheMetrics::to_btreemap` produces.
    pub fn as_btreemap(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("hit_count".to_string(), self.hit_count as f64);
        map.insert("miss_count".to_string(), self.miss_count as f64);
        map.insert("request_count".to_string(), self.request_count() as f64);
        map.insert("hit_rate".to_string(), self.hit_rate());
        map.insert("miss_rate".to_string(), self.miss_rate());
        map.insert(
            "load_success_count".to_string(),
            self.load_success_count as f64,
        );
        map.insert(
            "load_failure_count".to_string(),
            self.load_failure_count as f64,
        );
        map.insert("load_failure_rate".to_string(), self.load_failure_rate());
        map.insert(
            "average_load_penalty_nanos".to_string(),
            self.average_load_penalty(),
        );
        map.insert("eviction_count".to_string(), self.eviction_count as f64);
        map.insert("eviction_weight".to_string(), self.eviction_weight as f64);
        map
    }
}

impl StatisticsRecorder {
    /// Creates a recorder. When `enabled` is `false`, every `record_*` call is a no-op — set by
    /// the builder's `recordStats` option.
    pub fn new(enabled: bool) -> Self {
        StatisticsRecorder {
            enabled,
            ..Default::default()
        }
    }

    pub fn record_hit(&self) {
        if self.enabled {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_miss(&self) {
        if self.enabled {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_load_success(&self, nanos: u64) {
        if self.enabled {
            self.load_success_count.fetch_add(1, Ordering::Relaxed);
            self.total_load_time_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    pub fn record_load_failure(&self, nanos: u64) {
        if self.enabled {
            self.load_failure_count.fetch_add(1, Ordering::Relaxed);
            self.total_load_time_nanos.fetch_add(nanos, Ordering::Relaxed);
        }
    }

    pub fn record_eviction(&self, weight: u64) {
        if self.enabled {
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
            self.eviction_weight.fetch_add(weight, Ordering::Relaxed);
        }
    }

    /// Takes a consistent-per-field snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            load_success_count: self.load_success_count.load(Ordering::Relaxed),
            load_failure_count: self.load_failure_count.load(Ordering::Relaxed),
            total_load_time_nanos: self.total_load_time_nanos.load(Ordering::Relaxed),
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            eviction_weight: self.eviction_weight.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_recorder_ignores_all_records() {
        let stats = StatisticsRecorder::new(false);
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.hit_count, 0);
        assert_eq!(snap.miss_count, 0);
    }

    #[test]
    fn hit_rate_reflects_recorded_counts() {
        let stats = StatisticsRecorder::new(true);
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot();
        assert_eq!(snap.request_count(), 4);
        assert!((snap.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn load_failure_rate_ignores_hits_and_misses() {
        let stats = StatisticsRecorder::new(true);
        stats.record_hit();
        stats.record_load_success(100);
        stats.record_load_failure(50);
        let snap = stats.snapshot();
        assert!((snap.load_failure_rate() - 0.5).abs() < f64::EPSILON);
        assert!((snap.average_load_penalty() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn counters_never_appear_to_decrease() {
        let stats = StatisticsRecorder::new(true);
        for _ in 0..100 {
            stats.record_eviction(2);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.eviction_count, 100);
        assert_eq!(snap.eviction_weight, 200);
    }

    #[test]
    fn as_btreemap_is_stably_ordered() {
        let stats = StatisticsRecorder::new(true);
        stats.record_hit();
        let map = stats.snapshot().as_btreemap();
        let keys: Vec<_> = map.keys().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
