//! Last-In-First-Out eviction: the most recently inserted entry is the first one evicted.
//!
//! Shares [`crate::policy::fifo::FifoPolicy`]'s ordered-list structure; the only difference is
//! which end of the list eviction pops from.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use super::{DefaultHashBuilder, Evicted, HashMap};
use crate::entry::CacheEntry;
use crate::list::{Handle, List};

pub struct LifoPolicy<K, V, S = DefaultHashBuilder> {
    capacity: NonZeroUsize,
    map: HashMap<K, Handle, S>,
    order: List<CacheEntry<K, V>>,
    current_weight: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LifoPolicy<K, V, DefaultHashBuilder> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> LifoPolicy<K, V, S> {
    pub fn with_hasher(capacity: NonZeroUsize, hash_builder: S) -> Self {
        LifoPolicy {
            capacity,
            map: HashMap::with_hasher(hash_builder),
            order: List::new(capacity),
            current_weight: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn current_weight(&self) -> u64 {
        self.current_weight
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = *self.map.get(key)?;
        let entry = self.order.get(handle)?;
        entry.touch();
        Some(&entry.value)
    }

    /// Looks up the live entry for `key` without affecting its position or frequency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = *self.map.get(key)?;
        self.order.get(handle)
    }

    /// Evicts the most recently inserted entry, if any, independent of whether the list is at
    /// its entry-count capacity. Used to enforce a weight bound tighter than the entry-count one.
    pub fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        // The front of the list holds the most recently inserted entry — that is the LIFO
        // victim, unlike LRU/FIFO which evict from the back.
        let (_, victim) = self.order.pop_front()?;
        self.map.remove(&victim.key);
        self.current_weight -= victim.weight;
        Some(Evicted {
            key: victim.key,
            value: victim.value,
            weight: victim.weight,
        })
    }

    pub fn put(&mut self, key: K, value: V, weight: u64) -> (Option<V>, Vec<Evicted<K, V>>) {
        if let Some(&handle) = self.map.get(&key) {
            let old_weight = self.order.get(handle).map(|e| e.weight).unwrap_or(0);
            let old = self
                .order
                .replace(handle, CacheEntry::new(key, value, weight))
                .map(|e| e.value);
            self.current_weight = self.current_weight - old_weight + weight;
            return (old, Vec::new());
        }

        let mut evicted = Vec::new();
        while self.order.len() >= self.capacity.get() {
            let Some(victim) = self.evict_one() else {
                break;
            };
            evicted.push(victim);
        }

        let entry = CacheEntry::new(key.clone(), value, weight);
        if let Some(handle) = self.order.push_front(entry) {
            self.map.insert(key, handle);
            self.current_weight += weight;
        }
        (None, evicted)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.map.remove(key)?;
        let entry = self.order.remove(handle)?;
        self.current_weight -= entry.weight;
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.current_weight = 0;
    }

    pub fn iter(&self) -> crate::list::Iter<'_, CacheEntry<K, V>> {
        self.order.iter()
    }
}
