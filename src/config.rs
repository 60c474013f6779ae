//! Shared configuration types consumed by [`crate::builder::Builder`].
//!
//! Earlier cache libraries in this lineage gave every eviction algorithm its own
//! configuration struct (`LruCacheConfig`, `LfuCacheConfig`, ...). This crate instead has one
//! algorithm-agnostic cache, selected by [`EvictionPolicyKind`], so there is one validated
//! configuration type: [`CacheConfig`]. The "single validated entry point" philosophy is kept
//! — [`crate::builder::Builder`] is still the only place construction can fail.

use std::fmt;
use std::time::Duration;

use crate::sketch::SketchKind;

/// Which eviction algorithm a cache uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicyKind {
    /// Evicts the least recently used entry.
    #[default]
    Lru,
    /// Evicts the least frequently used entry (ties broken by recency).
    Lfu,
    /// Evicts the entry that has been in the cache the longest, regardless of access pattern.
    Fifo,
    /// Evicts the most recently inserted entry first.
    Lifo,
    /// Window-TinyLFU: a small LRU window admits candidates into a segmented main cache,
    /// gated by a [`FrequencySketch`](crate::sketch::FrequencySketch) comparison.
    WindowTinyLfu,
}

/// Computes the weight of a value for weight-bounded eviction.
///
/// The default weigher assigns every entry weight `1`, making `maximumWeight` behave like
/// `maximumSize`.
pub trait Weigher<K, V>: Send + Sync {
    /// Returns the weight to charge a newly inserted `(key, value)` pair.
    fn weigh(&self, key: &K, value: &V) -> u64;
}

impl<K, V, F> Weigher<K, V> for F
where
    F: Fn(&K, &V) -> u64 + Send + Sync,
{
    fn weigh(&self, key: &K, value: &V) -> u64 {
        self(key, value)
    }
}

/// The default weigher: every entry costs `1`.
pub struct UnitWeigher;

impl<K, V> Weigher<K, V> for UnitWeigher {
    fn weigh(&self, _key: &K, _value: &V) -> u64 {
        1
    }
}

/// Expiration and refresh durations, independently optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationConfig {
    /// Entries become invalid `duration` after being written.
    pub expire_after_write: Option<Duration>,
    /// Entries become invalid `duration` after their last read or write.
    pub expire_after_access: Option<Duration>,
    /// Entries trigger an asynchronous reload `duration` after being written, while still
    /// serving the stale value to readers until the reload completes.
    pub refresh_after_write: Option<Duration>,
}

/// Validated configuration for a [`crate::cache::Cache`].
///
/// Always constructed through [`crate::builder::Builder`]; never built directly so that every
/// field combination seen by the cache implementation has already been checked.
#[derive(Clone)]
pub struct CacheConfig {
    pub(crate) maximum_size: Option<u64>,
    pub(crate) maximum_weight: Option<u64>,
    pub(crate) initial_capacity: usize,
    pub(crate) concurrency_level: usize,
    pub(crate) policy: EvictionPolicyKind,
    pub(crate) sketch: SketchKind,
    pub(crate) expiration: ExpirationConfig,
    pub(crate) soft_values: bool,
    pub(crate) record_stats: bool,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("maximum_size", &self.maximum_size)
            .field("maximum_weight", &self.maximum_weight)
            .field("initial_capacity", &self.initial_capacity)
            .field("concurrency_level", &self.concurrency_level)
            .field("policy", &self.policy)
            .field("sketch", &self.sketch)
            .field("expire_after_write", &self.expiration.expire_after_write)
            .field("expire_after_access", &self.expiration.expire_after_access)
            .field("refresh_after_write", &self.expiration.refresh_after_write)
            .field("soft_values", &self.soft_values)
            .field("record_stats", &self.record_stats)
            .finish()
    }
}

impl CacheConfig {
    /// Number of shards (a power of two) the map should use.
    ///
    /// Requesting more shards than `maximum_size`/`maximum_weight` allows would force
    /// [`CacheConfig::per_shard_capacity`]/[`CacheConfig::per_shard_weight`] to round each
    /// shard's floor-divided share up to `1`, pushing the *global* bound to `shard_count` rather
    /// than the configured limit (e.g. `maximum_size(5)` at the default 16 shards would hold up
    /// to 16 entries). Shard count is therefore capped at the largest power of two that does not
    /// exceed the smallest configured limit, so `per_shard_capacity() * shard_count() <=
    /// maximum_size` (and likewise for weight) always holds.
    pub(crate) fn shard_count(&self) -> usize {
        let requested = self.concurrency_level.next_power_of_two().max(1);
        let limit = [self.maximum_size, self.maximum_weight]
            .into_iter()
            .flatten()
            .min();
        match limit {
            Some(limit) => requested.min(largest_power_of_two_leq(limit)),
            None => requested,
        }
    }

    /// Per-shard entry-count bound, dividing `maximum_size` across shards as evenly as the
    /// reference crate's `ConcurrentLruCache::init` divides its own capacity.
    pub(crate) fn per_shard_capacity(&self) -> Option<u64> {
        self.maximum_size
            .map(|n| (n / self.shard_count() as u64).max(1))
    }

    /// Per-shard weight bound, mirroring [`CacheConfig::per_shard_capacity`].
    pub(crate) fn per_shard_weight(&self) -> Option<u64> {
        self.maximum_weight
            .map(|w| (w / self.shard_count() as u64).max(1))
    }
}

/// Largest power of two `<= n`. `n` is always `>= 1` here (the Builder rejects non-positive
/// `maximumSize`/`maximumWeight` before a `CacheConfig` ever exists).
fn largest_power_of_two_leq(n: u64) -> usize {
    let n = n.max(1);
    (1u64 << (63 - n.leading_zeros())) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_count_rounds_up_to_power_of_two() {
        let cfg = CacheConfig {
            maximum_size: Some(1000),
            maximum_weight: None,
            initial_capacity: 16,
            concurrency_level: 10,
            policy: EvictionPolicyKind::Lru,
            sketch: SketchKind::None,
            expiration: ExpirationConfig::default(),
            soft_values: false,
            record_stats: false,
        };
        assert_eq!(cfg.shard_count(), 16);
    }

    #[test]
    fn per_shard_capacity_divides_total() {
        let cfg = CacheConfig {
            maximum_size: Some(1600),
            maximum_weight: None,
            initial_capacity: 16,
            concurrency_level: 16,
            policy: EvictionPolicyKind::Lru,
            sketch: SketchKind::None,
            expiration: ExpirationConfig::default(),
            soft_values: false,
            record_stats: false,
        };
        assert_eq!(cfg.per_shard_capacity(), Some(100));
    }

    #[test]
    fn unit_weigher_always_returns_one() {
        let w = UnitWeigher;
        assert_eq!(Weigher::<&str, i32>::weigh(&w, &"k", &1), 1);
    }

    #[test]
    fn shard_count_is_clamped_so_the_global_bound_never_exceeds_maximum_size() {
        let cfg = CacheConfig {
            maximum_size: Some(5),
            maximum_weight: None,
            initial_capacity: 16,
            concurrency_level: 16,
            policy: EvictionPolicyKind::Lru,
            sketch: SketchKind::None,
            expiration: ExpirationConfig::default(),
            soft_values: false,
            record_stats: false,
        };
        assert_eq!(cfg.shard_count(), 4);
        assert_eq!(cfg.per_shard_capacity().unwrap() * cfg.shard_count() as u64, 4);
    }

    #[test]
    fn shard_count_is_clamped_by_whichever_of_size_or_weight_is_smaller() {
        let cfg = CacheConfig {
            maximum_size: Some(1000),
            maximum_weight: Some(3),
            initial_capacity: 16,
            concurrency_level: 16,
            policy: EvictionPolicyKind::Lru,
            sketch: SketchKind::None,
            expiration: ExpirationConfig::default(),
            soft_values: false,
            record_stats: false,
        };
        assert_eq!(cfg.shard_count(), 2);
    }
}
