//! Least Recently Used eviction.
//!
//! Grounded directly on the reference crate's `lru.rs`: a hash map from key to a handle into an
//! ordered list, promote-on-access, evict-from-the-back-on-overflow. The raw-pointer list has
//! been replaced by the arena-backed [`crate::list::List`] (see `DESIGN.md`), so there is no
//! `unsafe` left in this file.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use super::{DefaultHashBuilder, Evicted, HashMap};
use crate::entry::CacheEntry;
use crate::list::{Handle, List};

pub struct LruPolicy<K, V, S = DefaultHashBuilder> {
    capacity: NonZeroUsize,
    map: HashMap<K, Handle, S>,
    order: List<CacheEntry<K, V>>,
    current_weight: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LruPolicy<K, V, DefaultHashBuilder> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> LruPolicy<K, V, S> {
    pub fn with_hasher(capacity: NonZeroUsize, hash_builder: S) -> Self {
        LruPolicy {
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
        self.order.move_to_front(handle);
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

    /// Evicts the current least-recently-used entry, if any, independent of whether the list
    /// is at its entry-count capacity. Used to enforce a weight bound that is tighter than the
    /// entry-count one.
    pub fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let (_, victim) = self.order.pop_back()?;
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
            self.order.move_to_front(handle);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut lru = LruPolicy::new(cap(2));
        lru.put("a", 1, 1);
        lru.put("b", 2, 1);
        assert_eq!(lru.get(&"a"), Some(&1));
        let (_, evicted) = lru.put("c", 3, 1);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].key, "b");
        assert_eq!(lru.get(&"a"), Some(&1));
        assert_eq!(lru.get(&"c"), Some(&3));
    }

    #[test]
    fn put_on_existing_key_replaces_value_and_adjusts_weight() {
        let mut lru = LruPolicy::new(cap(2));
        lru.put("a", 1, 2);
        let (old, evicted) = lru.put("a", 2, 5);
        assert_eq!(old, Some(1));
        assert!(evicted.is_empty());
        assert_eq!(lru.current_weight(), 5);
    }

    #[test]
    fn remove_drops_entry_and_updates_weight() {
        let mut lru = LruPolicy::new(cap(2));
        lru.put("a", 1, 3);
        assert_eq!(lru.remove(&"a"), Some(1));
        assert_eq!(lru.current_weight(), 0);
        assert_eq!(lru.len(), 0);
    }
}
