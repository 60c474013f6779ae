//! Least Frequently Used eviction, ties broken by recency within the tied frequency.
//!
//! Grounded on the reference crate's `lfu.rs`: a hash map from key to its current frequency
//! bucket, a `BTreeMap<frequency, List<entry>>` of buckets, and a tracked `min_frequency` for
//! O(1) victim selection. The reference crate moved nodes between per-frequency lists with
//! `attach_from_other_list` on raw pointers; here the arena [`List`] lets a bucket transfer
//! just be an ordinary `remove` from one list followed by a `push_front` into another, with
//! ownership passing through the return value instead of a pointer.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use super::{DefaultHashBuilder, Evicted, HashMap};
use crate::entry::CacheEntry;
use crate::list::List;

pub struct LfuPolicy<K, V, S = DefaultHashBuilder> {
    capacity: NonZeroUsize,
    min_frequency: u64,
    map: HashMap<K, u64, S>,
    buckets: BTreeMap<u64, List<CacheEntry<K, V>>>,
    len: usize,
    current_weight: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LfuPolicy<K, V, DefaultHashBuilder> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> LfuPolicy<K, V, S> {
    pub fn with_hasher(capacity: NonZeroUsize, hash_builder: S) -> Self {
        LfuPolicy {
            capacity,
            min_frequency: 1,
            map: HashMap::with_hasher(hash_builder),
            buckets: BTreeMap::new(),
            len: 0,
            current_weight: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn current_weight(&self) -> u64 {
        self.current_weight
    }

    /// Moves the entry for `key`, currently at `freq`, into the `freq + 1` bucket, returning a
    /// reference to the value at its new position.
    fn promote<Q>(&mut self, key: &Q, freq: u64) -> Option<&V>
    where
        K: Borrow<Q> + Clone,
        Q: ?Sized + Hash + Eq,
    {
        let bucket = self.buckets.get_mut(&freq)?;
        let found = find_handle(bucket, key)?;
        let entry = bucket.remove(found)?;
        if bucket.is_empty() && freq == self.min_frequency {
            self.min_frequency = freq + 1;
        }
        entry.touch();
        let new_freq = freq + 1;
        let new_bucket = self
            .buckets
            .entry(new_freq)
            .or_insert_with(|| List::new(self.capacity));
        let owned_key = entry.key.clone();
        let new_handle = new_bucket.push_front_unchecked(entry);
        self.map.insert(owned_key, new_freq);
        self.buckets.get(&new_freq)?.get(new_handle).map(|e| &e.value)
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q> + Clone,
        Q: ?Sized + Hash + Eq,
    {
        let freq = *self.map.get(key)?;
        self.promote(key, freq)
    }

    /// Evicts the entry in the lowest-frequency bucket, if any, independent of whether the
    /// policy is at its entry-count capacity. Used to enforce a weight bound tighter than the
    /// entry-count one.
    pub fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let bucket = self.buckets.get_mut(&self.min_frequency)?;
        let (_, victim) = bucket.pop_back()?;
        self.len -= 1;
        self.map.remove(&victim.key);
        self.current_weight -= victim.weight;
        if bucket.is_empty() {
            self.min_frequency = self
                .buckets
                .iter()
                .find(|(&f, list)| f > self.min_frequency && !list.is_empty())
                .map(|(&f, _)| f)
                .unwrap_or(1);
        }
        Some(Evicted {
            key: victim.key,
            value: victim.value,
            weight: victim.weight,
        })
    }

    pub fn put(&mut self, key: K, value: V, weight: u64) -> (Option<V>, Vec<Evicted<K, V>>) {
        if let Some(&freq) = self.map.get(&key) {
            let bucket = self.buckets.get_mut(&freq).expect("bucket for tracked key");
            if let Some(handle) = find_handle(bucket, &key) {
                let old_weight = bucket.get(handle).map(|e| e.weight).unwrap_or(0);
                let old = bucket
                    .replace(handle, CacheEntry::new(key, value, weight))
                    .map(|e| e.value);
                self.current_weight = self.current_weight - old_weight + weight;
                return (old, Vec::new());
            }
        }

        let mut evicted = Vec::new();
        while self.len >= self.capacity.get() {
            let Some(victim) = self.evict_one() else {
                break;
            };
            evicted.push(victim);
        }

        self.min_frequency = 1;
        let bucket = self
            .buckets
            .entry(1)
            .or_insert_with(|| List::new(self.capacity));
        let entry = CacheEntry::new(key.clone(), value, weight);
        if bucket.push_front(entry).is_some() {
            self.map.insert(key, 1);
            self.len += 1;
            self.current_weight += weight;
        }
        (None, evicted)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let freq = self.map.remove(key)?;
        let bucket = self.buckets.get_mut(&freq)?;
        let handle = find_handle(bucket, key)?;
        let entry = bucket.remove(handle)?;
        self.len -= 1;
        self.current_weight -= entry.weight;
        if bucket.is_empty() && freq == self.min_frequency {
            self.min_frequency = self
                .buckets
                .iter()
                .find(|(&f, list)| f > freq && !list.is_empty())
                .map(|(&f, _)| f)
                .unwrap_or(1);
        }
        Some(entry.value)
    }

    /// Looks up the live entry for `key` without affecting its frequency bucket.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let freq = *self.map.get(key)?;
        let bucket = self.buckets.get(&freq)?;
        let handle = find_handle(bucket, key)?;
        bucket.get(handle)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.buckets.clear();
        self.min_frequency = 1;
        self.len = 0;
        self.current_weight = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<K, V>> {
        self.buckets.values().flat_map(|list| list.iter())
    }
}

/// Linear scan for the handle of `key` within a single frequency bucket. Buckets are expected
/// to stay small relative to total capacity (most keys cluster at low frequencies), so this
/// stays cheap in practice despite being O(bucket size) rather than O(1).
fn find_handle<K, V, Q>(bucket: &List<CacheEntry<K, V>>, key: &Q) -> Option<crate::list::Handle>
where
    K: Borrow<Q>,
    Q: ?Sized + Hash + Eq,
{
    bucket
        .handles()
        .find(|&h| bucket.get(h).map(|e| e.key.borrow() == key).unwrap_or(false))
}
