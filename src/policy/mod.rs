//! Eviction policies.
//!
//! A policy owns both the ordering bookkeeping *and* the entry storage for one shard — the
//! same shape as the reference crate's `LruSegment`/`LfuSegment`, generalized to a closed set
//! of variants dispatched through [`Policy`] rather than growing a new top-level cache type
//! per algorithm. Tagged-variant dispatch is used instead of a trait object because eviction
//! runs on every write; see §9 Design Notes ("tagged variant... preferable to virtual dispatch
//! if dispatch is hot").

pub mod fifo;
pub mod lfu;
pub mod lifo;
pub mod lru;
pub mod tlfu;

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use crate::config::EvictionPolicyKind;
use crate::entry::CacheEntry;
use crate::sketch::SketchKind;

#[cfg(feature = "hashbrown")]
pub(crate) use hashbrown::hash_map::DefaultHashBuilder;
#[cfg(feature = "hashbrown")]
pub(crate) use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
pub(crate) use std::collections::hash_map::RandomState as DefaultHashBuilder;
#[cfg(not(feature = "hashbrown"))]
pub(crate) use std::collections::HashMap;

/// An entry that left the policy's custody, reported back to the shard so it can update
/// aggregate counters and emit an eviction event.
#[derive(Debug)]
pub struct Evicted<K, V> {
    /// The evicted key.
    pub key: K,
    /// The evicted value.
    pub value: V,
    /// The weight the entry was charged at insertion.
    pub weight: u64,
}

/// Capability set every eviction algorithm variant implements (spec §4.3).
///
/// All operations are expected to be amortized O(1). `K` must be `Clone` because policies that
/// reorder entries across internal sub-structures (LFU's frequency buckets, W-TinyLFU's
/// window/main segments) need to carry the key alongside the moved value.
pub enum Policy<K, V, S = DefaultHashBuilder> {
    /// Least Recently Used.
    Lru(lru::LruPolicy<K, V, S>),
    /// Least Frequently Used, ties broken by recency.
    Lfu(lfu::LfuPolicy<K, V, S>),
    /// First-In-First-Out.
    Fifo(fifo::FifoPolicy<K, V, S>),
    /// Last-In-First-Out.
    Lifo(lifo::LifoPolicy<K, V, S>),
    /// Window-TinyLFU.
    WindowTinyLfu(tlfu::WindowTinyLfuPolicy<K, V, S>),
}

impl<K, V, S> Policy<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Default,
{
    /// Builds the policy named by `kind`, bounded to `capacity` entries.
    ///
    /// Goes through each policy's `with_hasher` constructor rather than its `new` — `new` is
    /// only inherent on `S = DefaultHashBuilder`, which does not unify with a generic `S` here.
    pub fn new(kind: EvictionPolicyKind, capacity: NonZeroUsize, sketch: SketchKind) -> Self {
        match kind {
            EvictionPolicyKind::Lru => {
                Policy::Lru(lru::LruPolicy::with_hasher(capacity, S::default()))
            }
            EvictionPolicyKind::Lfu => {
                Policy::Lfu(lfu::LfuPolicy::with_hasher(capacity, S::default()))
            }
            EvictionPolicyKind::Fifo => {
                Policy::Fifo(fifo::FifoPolicy::with_hasher(capacity, S::default()))
            }
            EvictionPolicyKind::Lifo => {
                Policy::Lifo(lifo::LifoPolicy::with_hasher(capacity, S::default()))
            }
            EvictionPolicyKind::WindowTinyLfu => Policy::WindowTinyLfu(
                tlfu::WindowTinyLfuPolicy::with_hasher(capacity, sketch, S::default()),
            ),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        match self {
            Policy::Lru(p) => p.len(),
            Policy::Lfu(p) => p.len(),
            Policy::Fifo(p) => p.len(),
            Policy::Lifo(p) => p.len(),
            Policy::WindowTinyLfu(p) => p.len(),
        }
    }

    /// Returns `true` if no entries are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total weight of all entries currently held.
    pub fn current_weight(&self) -> u64 {
        match self {
            Policy::Lru(p) => p.current_weight(),
            Policy::Lfu(p) => p.current_weight(),
            Policy::Fifo(p) => p.current_weight(),
            Policy::Lifo(p) => p.current_weight(),
            Policy::WindowTinyLfu(p) => p.current_weight(),
        }
    }

    /// Looks up `key`, recording the access (`onAccess`) on a hit.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self {
            Policy::Lru(p) => p.get(key),
            Policy::Lfu(p) => p.get(key),
            Policy::Fifo(p) => p.get(key),
            Policy::Lifo(p) => p.get(key),
            Policy::WindowTinyLfu(p) => p.get(key),
        }
    }

    /// Inserts or replaces `key`, evicting (possibly repeatedly) until both the entry-count and
    /// weight bounds are satisfied. Returns whatever was evicted to make room, plus the
    /// previous value at `key` if this was a replacement.
    pub fn put(&mut self, key: K, value: V, weight: u64) -> (Option<V>, Vec<Evicted<K, V>>) {
        match self {
            Policy::Lru(p) => p.put(key, value, weight),
            Policy::Lfu(p) => p.put(key, value, weight),
            Policy::Fifo(p) => p.put(key, value, weight),
            Policy::Lifo(p) => p.put(key, value, weight),
            Policy::WindowTinyLfu(p) => p.put(key, value, weight),
        }
    }

    /// Removes `key` without touching any other entry (`onRemove`).
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self {
            Policy::Lru(p) => p.remove(key),
            Policy::Lfu(p) => p.remove(key),
            Policy::Fifo(p) => p.remove(key),
            Policy::Lifo(p) => p.remove(key),
            Policy::WindowTinyLfu(p) => p.remove(key),
        }
    }

    /// Evicts a single entry per the policy's normal eviction order, independent of whether the
    /// entry-count capacity has been reached. Used to enforce a weight bound (spec §4.3,
    /// "maximumWeight") that is tighter than the entry-count bound the policy itself watches.
    pub fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        match self {
            Policy::Lru(p) => p.evict_one(),
            Policy::Lfu(p) => p.evict_one(),
            Policy::Fifo(p) => p.evict_one(),
            Policy::Lifo(p) => p.evict_one(),
            Policy::WindowTinyLfu(p) => p.evict_one(),
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        match self {
            Policy::Lru(p) => p.clear(),
            Policy::Lfu(p) => p.clear(),
            Policy::Fifo(p) => p.clear(),
            Policy::Lifo(p) => p.clear(),
            Policy::WindowTinyLfu(p) => p.clear(),
        }
    }

    /// Looks up the live entry for `key` without affecting its policy position or frequency.
    /// Used by the expiration engine, which needs an entry's raw timestamps but must not count
    /// an expiration check itself as an access.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self {
            Policy::Lru(p) => p.peek(key),
            Policy::Lfu(p) => p.peek(key),
            Policy::Fifo(p) => p.peek(key),
            Policy::Lifo(p) => p.peek(key),
            Policy::WindowTinyLfu(p) => p.peek(key),
        }
    }

    /// Iterates live entries without affecting their policy state. Used by the expiration
    /// sweep, which must be able to enumerate entries without promoting them.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &CacheEntry<K, V>> + '_> {
        match self {
            Policy::Lru(p) => Box::new(p.iter()),
            Policy::Lfu(p) => Box::new(p.iter()),
            Policy::Fifo(p) => Box::new(p.iter()),
            Policy::Lifo(p) => Box::new(p.iter()),
            Policy::WindowTinyLfu(p) => Box::new(p.iter()),
        }
    }
}
