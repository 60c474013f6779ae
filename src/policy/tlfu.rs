//! Window-TinyLFU: a small LRU "window" admits candidates into a larger "main" LRU, gated by a
//! [`FrequencySketch`] comparison so that a recently-arrived candidate does not evict a
//! consistently popular main entry just because it happened to be accessed a moment ago.
//!
//! Net new relative to the reference crate (which has no frequency-sketch-gated admission at
//! all); grounded on the TinyLFU admission rule as implemented in `ccache`'s `tlfu`/`swtlfu`
//! modules and moka's frequency-sketch-backed admission, adapted to this crate's arena list and
//! [`crate::sketch::FrequencySketch`] (itself ported from Caffeine — see `sketch.rs`).
//!
//! The main segment is itself split into a small protected list and a larger probationary
//! list, matching the SLRU structure the admission literature assumes: an entry that survives
//! a second access while probationary is promoted to protected; protected entries simply move
//! to the front on access, the same as plain LRU.

use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;

use super::{DefaultHashBuilder, Evicted, HashMap};
use crate::entry::CacheEntry;
use crate::list::List;
use crate::sketch::{FrequencySketch, SketchKind};

/// Which of the three internal lists an entry currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Window,
    Probationary,
    Protected,
}

pub struct WindowTinyLfuPolicy<K, V, S = DefaultHashBuilder> {
    capacity: NonZeroUsize,
    window: List<CacheEntry<K, V>>,
    probationary: List<CacheEntry<K, V>>,
    protected: List<CacheEntry<K, V>>,
    location: HashMap<K, Region, S>,
    sketch: FrequencySketch,
    current_weight: u64,
}

/// Window capacity as a fraction of total capacity, matching the ~1% figure used by the
/// published TinyLFU admission policy (spec §3, "a small 'window' LRU (≈1% of capacity)").
fn window_size(total: usize) -> usize {
    (total / 100).max(1)
}

impl<K: Hash + Eq + Clone, V: Clone> WindowTinyLfuPolicy<K, V, DefaultHashBuilder> {
    pub fn new(capacity: NonZeroUsize, sketch_kind: SketchKind) -> Self {
        Self::with_hasher(capacity, sketch_kind, DefaultHashBuilder::default())
    }
}

impl<K: Hash + Eq + Clone, V: Clone, S: BuildHasher> WindowTinyLfuPolicy<K, V, S> {
    pub fn with_hasher(capacity: NonZeroUsize, sketch_kind: SketchKind, hash_builder: S) -> Self {
        let window_cap = window_size(capacity.get());
        let main_cap = capacity.get().saturating_sub(window_cap).max(1);
        let protected_cap = (main_cap / 5).max(1); // 80/20 probationary/protected split.
        let probationary_cap = main_cap.saturating_sub(protected_cap).max(1);

        WindowTinyLfuPolicy {
            capacity,
            window: List::new(NonZeroUsize::new(window_cap).unwrap()),
            probationary: List::new(NonZeroUsize::new(probationary_cap).unwrap()),
            protected: List::new(NonZeroUsize::new(protected_cap).unwrap()),
            location: HashMap::with_hasher(hash_builder),
            sketch: FrequencySketch::with_capacity(sketch_kind, capacity.get()),
            current_weight: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.location.len()
    }

    pub fn current_weight(&self) -> u64 {
        self.current_weight
    }

    fn hash_of<Q: Hash + ?Sized>(key: &Q) -> u64 {
        use std::hash::Hasher;
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn list_for(&mut self, region: Region) -> &mut List<CacheEntry<K, V>> {
        match region {
            Region::Window => &mut self.window,
            Region::Probationary => &mut self.probationary,
            Region::Protected => &mut self.protected,
        }
    }

    fn list_for_ref(&self, region: Region) -> &List<CacheEntry<K, V>> {
        match region {
            Region::Window => &self.window,
            Region::Probationary => &self.probationary,
            Region::Protected => &self.protected,
        }
    }

    /// Looks up the live entry for `key` without affecting its region or position.
    pub fn peek<Q>(&self, key: &Q) -> Option<&CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let region = *self.location.get(key)?;
        let list = self.list_for_ref(region);
        let handle = list
            .handles()
            .find(|&h| list.get(h).map(|e| e.key.borrow() == key).unwrap_or(false))?;
        list.get(handle)
    }

    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let region = *self.location.get(key)?;
        self.sketch.increment(Self::hash_of(key));

        let handle = {
            let list = self.list_for(region);
            list.handles()
                .find(|&h| list.get(h).map(|e| e.key.borrow() == key).unwrap_or(false))?
        };

        match region {
            Region::Window => {
                self.window.move_to_front(handle);
            }
            Region::Protected => {
                self.protected.move_to_front(handle);
            }
            Region::Probationary => {
                // A second access promotes a probationary entry into the protected segment.
                let entry = self.probationary.remove(handle)?;
                let owned_key = entry.key.clone();
                if self.protected.is_full() {
                    if let Some((_, demoted)) = self.protected.pop_back() {
                        self.location.insert(demoted.key.clone(), Region::Probationary);
                        self.probationary.push_front_unchecked(demoted);
                    }
                }
                self.protected.push_front_unchecked(entry);
                self.location.insert(owned_key, Region::Protected);
            }
        }

        let list = self.list_for(match region {
            Region::Window => Region::Window,
            Region::Protected | Region::Probationary => Region::Protected,
        });
        let handle = list
            .handles()
            .find(|&h| list.get(h).map(|e| e.key.borrow() == key).unwrap_or(false))?;
        let entry = list.get(handle)?;
        entry.touch();
        Some(&entry.value)
    }

    /// Admits a candidate evicted from the window into the main segment, applying the
    /// TinyLFU comparison (spec §4.3): the candidate is only admitted if its estimated
    /// frequency exceeds the current probationary victim's. A tie admits the candidate.
    fn admit_to_main(&mut self, candidate: CacheEntry<K, V>) -> Option<Evicted<K, V>> {
        if !self.probationary.is_full() {
            let key = candidate.key.clone();
            self.probationary.push_front_unchecked(candidate);
            self.location.insert(key, Region::Probationary);
            return None;
        }

        let Some((victim_handle, victim)) = self.probationary.back().and_then(|h| {
            self.probationary
                .get(h)
                .map(|e| (h, (e.key.clone(), Self::hash_of(&e.key))))
        }) else {
            let key = candidate.key.clone();
            self.probationary.push_front_unchecked(candidate);
            self.location.insert(key, Region::Probationary);
            return None;
        };

        let candidate_freq = self.sketch.frequency(Self::hash_of(&candidate.key));
        let victim_freq = self.sketch.frequency(victim.1);

        if candidate_freq > victim_freq {
            let evicted = self.probationary.remove(victim_handle)?;
            self.location.remove(&evicted.key);
            let key = candidate.key.clone();
            self.probationary.push_front_unchecked(candidate);
            self.location.insert(key, Region::Probationary);
            self.current_weight -= evicted.weight;
            Some(Evicted {
                key: evicted.key,
                value: evicted.value,
                weight: evicted.weight,
            })
        } else {
            // Candidate loses the comparison: it is evicted instead of the incumbent.
            self.current_weight -= candidate.weight;
            Some(Evicted {
                key: candidate.key,
                value: candidate.value,
                weight: candidate.weight,
            })
        }
    }

    /// Evicts the current probationary-tail victim, if the probationary segment holds any
    /// entries, independent of whether the policy is at its entry-count capacity. Used to
    /// enforce a weight bound tighter than the entry-count one.
    ///
    /// Like [`WindowTinyLfuPolicy::put`]'s own capacity-spill loop, this only considers the
    /// probationary segment; window and protected entries are not candidates for a weight-only
    /// eviction. In practice the probationary segment holds the bulk of main-cache entries, so
    /// this is not expected to starve under normal admission pressure.
    pub fn evict_one(&mut self) -> Option<Evicted<K, V>> {
        let (_, victim) = self.probationary.pop_back()?;
        self.location.remove(&victim.key);
        self.current_weight -= victim.weight;
        Some(Evicted {
            key: victim.key,
            value: victim.value,
            weight: victim.weight,
        })
    }

    pub fn put(&mut self, key: K, value: V, weight: u64) -> (Option<V>, Vec<Evicted<K, V>>) {
        self.sketch.increment(Self::hash_of(&key));

        if let Some(&region) = self.location.get(&key) {
            let list = self.list_for(region);
            let handle = list
                .handles()
                .find(|&h| list.get(h).map(|e| e.key == key).unwrap_or(false));
            if let Some(handle) = handle {
                let old_weight = list.get(handle).map(|e| e.weight).unwrap_or(0);
                let old = list
                    .replace(handle, CacheEntry::new(key, value, weight))
                    .map(|e| e.value);
                self.current_weight = self.current_weight - old_weight + weight;
                return (old, Vec::new());
            }
        }

        let mut evicted = Vec::new();
        let entry = CacheEntry::new(key.clone(), value, weight);

        if let Some(handle) = self.window.push_front(entry) {
            self.location.insert(key, Region::Window);
            self.current_weight += weight;
            let _ = handle;
        } else {
            // Window is full: evict its tail and decide whether it is admitted into main.
            if let Some((_, window_victim)) = self.window.pop_back() {
                self.location.remove(&window_victim.key);
                if let Some(e) = self.admit_to_main(window_victim) {
                    evicted.push(e);
                }
            }
            let entry = CacheEntry::new(key.clone(), value, weight);
            let handle = self.window.push_front_unchecked(entry);
            self.location.insert(key, Region::Window);
            self.current_weight += weight;
            let _ = handle;
        }

        // Enforce the total capacity bound across all three segments: if admission into main
        // pushed the combined size past capacity, spill from the probationary tail.
        while self.location.len() > self.capacity.get() {
            let Some((_, victim)) = self.probationary.pop_back() else {
                break;
            };
            self.location.remove(&victim.key);
            self.current_weight -= victim.weight;
            evicted.push(Evicted {
                key: victim.key,
                value: victim.value,
                weight: victim.weight,
            });
        }

        (None, evicted)
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let region = self.location.remove(key)?;
        let list = self.list_for(region);
        let handle = list
            .handles()
            .find(|&h| list.get(h).map(|e| e.key.borrow() == key).unwrap_or(false))?;
        let entry = list.remove(handle)?;
        self.current_weight -= entry.weight;
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.probationary.clear();
        self.protected.clear();
        self.location.clear();
        self.current_weight = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry<K, V>> {
        self.window
            .iter()
            .chain(self.probationary.iter())
            .chain(self.protected.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn warmed_up_keys_survive_a_single_cold_insertion() {
        let mut tlfu = WindowTinyLfuPolicy::new(cap(20), SketchKind::Basic);
        for i in 0..10 {
            let k = format!("hot{i}");
            tlfu.put(k.clone(), i, 1);
        }
        // Warm the sketch heavily for the hot keys.
        for _ in 0..50 {
            for i in 0..10 {
                let k = format!("hot{i}");
                tlfu.get(&k);
            }
        }
        tlfu.put("cold".to_string(), 999, 1);
        // At least some of the hot keys (more heavily warmed than "cold") should remain.
        let remaining = (0..10)
            .filter(|i| tlfu.get(&format!("hot{i}")).is_some())
            .count();
        assert!(remaining > 0);
    }

    #[test]
    fn basic_put_get_roundtrip() {
        let mut tlfu = WindowTinyLfuPolicy::new(cap(10), SketchKind::Basic);
        tlfu.put("a", 1, 1);
        assert_eq!(tlfu.get(&"a"), Some(&1));
    }

    #[test]
    fn remove_drops_entry_from_whichever_region_it_is_in() {
        let mut tlfu = WindowTinyLfuPolicy::new(cap(10), SketchKind::Basic);
        tlfu.put("a", 1, 1);
        assert_eq!(tlfu.remove(&"a"), Some(1));
        assert_eq!(tlfu.get(&"a"), None);
    }
}
