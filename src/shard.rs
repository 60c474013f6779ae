//! One stripe of the concurrent map: a lock guarding a single [`Policy`] instance.
//!
//! Grounded on the reference crate's `concurrent/lru.rs` (`LruSegment` behind a `Mutex`, struck
//! at `hash % segment_count`) and on `Borislavv-rs-adv-cache`'s `storage/map/map.rs` shard-index
//! idiom (`hash & SHARD_MASK`, shard count a power of two). This crate generalizes the
//! reference's single hard-coded LRU segment into one holding any [`Policy`] variant, and
//! generalizes Borislavv's bitmask indexing (which assumes the shard count is a power of two —
//! [`CacheConfig::shard_count`](crate::config::CacheConfig::shard_count) guarantees that) to work
//! for whichever policy the builder selected.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::config::EvictionPolicyKind;
use crate::entry::CacheEntry;
use crate::policy::{DefaultHashBuilder, Evicted, Policy};
use crate::sketch::SketchKind;

/// A single lock-protected partition of the cache's key space.
pub struct Shard<K, V, S = DefaultHashBuilder> {
    inner: Mutex<Policy<K, V, S>>,
    len: AtomicU64,
}

impl<K, V, S> Shard<K, V, S>
where
    K: Hash + Eq + Clone,
    V: Clone,
    S: BuildHasher + Default,
{
    pub fn new(kind: EvictionPolicyKind, capacity: NonZeroUsize, sketch: SketchKind) -> Self {
        Shard {
            inner: Mutex::new(Policy::new(kind, capacity, sketch)),
            len: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed) as usize
    }

    pub fn current_weight(&self) -> u64 {
        self.inner.lock().current_weight()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: Clone,
    {
        self.inner.lock().get(key).cloned()
    }

    /// Runs `f` against the live entry for `key`, if present, under the shard lock. Used by the
    /// expiration engine, which needs the entry's raw timestamps rather than a cloned value.
    pub fn with_entry<Q, R>(&self, key: &Q, f: impl FnOnce(&CacheEntry<K, V>) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.inner.lock().peek(key).map(f)
    }

    /// Inserts `key`, evicting per the policy's entry-count bound and then, if `max_weight` is
    /// given, evicting further (oldest-by-policy-order first) until the shard's total weight
    /// fits within it.
    pub fn put(
        &self,
        key: K,
        value: V,
        weight: u64,
        max_weight: Option<u64>,
    ) -> (Option<V>, Vec<Evicted<K, V>>) {
        let mut guard = self.inner.lock();
        let existed = guard.peek(&key).is_some();
        let (old, mut evicted) = guard.put(key, value, weight);
        if let Some(max_weight) = max_weight {
            while guard.current_weight() > max_weight {
                let Some(victim) = guard.evict_one() else {
                    break;
                };
                evicted.push(victim);
            }
        }
        drop(guard);
        if !existed {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        if !evicted.is_empty() {
            self.len.fetch_sub(evicted.len() as u64, Ordering::Relaxed);
        }
        (old, evicted)
    }

    /// Inserts `key` only if it is not already present, atomically with the presence check —
    /// unlike a `get` followed by a `put`, no other caller can observe or fill the gap in
    /// between. Returns the existing value if `key` was already present (in which case `value`
    /// was not inserted), or `None` alongside whatever eviction the insertion caused.
    pub fn put_if_absent(
        &self,
        key: K,
        value: V,
        weight: u64,
        max_weight: Option<u64>,
    ) -> (Option<V>, Vec<Evicted<K, V>>) {
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.peek(&key).map(|e| e.value.clone()) {
            return (Some(existing), Vec::new());
        }
        let (_, mut evicted) = guard.put(key, value, weight);
        if let Some(max_weight) = max_weight {
            while guard.current_weight() > max_weight {
                let Some(victim) = guard.evict_one() else {
                    break;
                };
                evicted.push(victim);
            }
        }
        drop(guard);
        self.len.fetch_add(1, Ordering::Relaxed);
        if !evicted.is_empty() {
            self.len.fetch_sub(evicted.len() as u64, Ordering::Relaxed);
        }
        (None, evicted)
    }

    /// Updates `key`'s value only if it is already present, atomically with the presence check.
    /// Returns the replaced value, or `None` if `key` was absent (in which case `value` was not
    /// inserted).
    pub fn replace(
        &self,
        key: K,
        value: V,
        weight: u64,
        max_weight: Option<u64>,
    ) -> (Option<V>, Vec<Evicted<K, V>>) {
        let mut guard = self.inner.lock();
        if guard.peek(&key).is_none() {
            return (None, Vec::new());
        }
        let (old, mut evicted) = guard.put(key, value, weight);
        if let Some(max_weight) = max_weight {
            while guard.current_weight() > max_weight {
                let Some(victim) = guard.evict_one() else {
                    break;
                };
                evicted.push(victim);
            }
        }
        drop(guard);
        if !evicted.is_empty() {
            self.len.fetch_sub(evicted.len() as u64, Ordering::Relaxed);
        }
        (old, evicted)
    }

    /// Atomically swaps `key`'s value for `new` only if its current value equals `expected` —
    /// the compare-and-swap primitive behind [`crate::cache::Cache::replace`]. Returns `true`
    /// iff the swap happened.
    pub fn compare_and_swap(
        &self,
        key: &K,
        expected: &V,
        new: V,
        weight: u64,
        max_weight: Option<u64>,
    ) -> (bool, Vec<Evicted<K, V>>)
    where
        V: PartialEq,
    {
        let mut guard = self.inner.lock();
        match guard.peek(key) {
            Some(current) if &current.value == expected => {}
            _ => return (false, Vec::new()),
        }
        let (_, mut evicted) = guard.put(key.clone(), new, weight);
        if let Some(max_weight) = max_weight {
            while guard.current_weight() > max_weight {
                let Some(victim) = guard.evict_one() else {
                    break;
                };
                evicted.push(victim);
            }
        }
        drop(guard);
        if !evicted.is_empty() {
            self.len.fetch_sub(evicted.len() as u64, Ordering::Relaxed);
        }
        (true, evicted)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let removed = self.inner.lock().remove(key);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    /// Removes `key` only if its current value equals `expected`, atomically with the check.
    pub fn remove_if<Q>(&self, key: &Q, expected: &V) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        V: PartialEq,
    {
        let mut guard = self.inner.lock();
        match guard.peek(key) {
            Some(current) if &current.value == expected => {}
            _ => return None,
        }
        let removed = guard.remove(key);
        drop(guard);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
        self.len.store(0, Ordering::Relaxed);
    }

    pub fn for_each(&self, mut f: impl FnMut(&CacheEntry<K, V>)) {
        let guard = self.inner.lock();
        for entry in guard.iter() {
            f(entry);
        }
    }
}

/// Computes which shard owns `key`, given `shard_count` (always a power of two — see
/// [`CacheConfig::shard_count`](crate::config::CacheConfig::shard_count)).
pub fn shard_index<K, S>(key: &K, hasher: &S, shard_count: usize) -> usize
where
    K: Hash + ?Sized,
    S: BuildHasher,
{
    let mut h = hasher.build_hasher();
    key.hash(&mut h);
    (h.finish() as usize) & (shard_count - 1)
}
