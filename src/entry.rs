//! Per-entry state: the value plus everything the eviction, expiration and statistics
//! subsystems need to know about it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current time as nanoseconds since the Unix epoch.
///
/// Centralized so every timestamp in the crate (write time, access time, aging epochs)
/// is taken the same way.
#[inline]
pub(crate) fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// A cached value together with its bookkeeping state.
///
/// `write_time`, `last_accessed` and `frequency` are atomics rather than plain fields: a reader
/// that only holds a shared reference to the entry (e.g. while a policy decides whether to
/// evict it) still needs to record an access without taking the shard's write lock twice.
pub struct CacheEntry<K, V> {
    /// The key, kept alongside the value so eviction callbacks can report what left the cache
    /// without a second map lookup.
    pub key: K,
    /// The cached value.
    pub value: V,
    /// Weight assigned by the configured weigher at insertion time (default 1 per entry).
    pub weight: u64,
    write_time: AtomicU64,
    last_accessed: AtomicU64,
    /// Access-frequency counter, incremented on every read. Distinct from the
    /// [`crate::sketch::FrequencySketch`]'s estimate: this is an exact per-entry count used by
    /// the LFU policy.
    frequency: AtomicU64,
    /// Set when the entry has been logically removed but a concurrent reader may still hold a
    /// handle to it. Readers must treat a tombstoned entry as absent.
    tombstone: AtomicBool,
}

impl<K, V> CacheEntry<K, V> {
    /// Creates a new entry with `weight` and timestamps set to now.
    pub fn new(key: K, value: V, weight: u64) -> Self {
        let now = now_nanos();
        CacheEntry {
            key,
            value,
            weight,
            write_time: AtomicU64::new(now),
            last_accessed: AtomicU64::new(now),
            frequency: AtomicU64::new(0),
            tombstone: AtomicBool::new(false),
        }
    }

    /// Records a read: bumps `last_accessed` to now and increments the frequency counter.
    pub fn touch(&self) {
        self.last_accessed.store(now_nanos(), Ordering::Relaxed);
        self.frequency.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a write without touching the frequency counter (used on replace/refresh).
    pub fn mark_written(&self) {
        let now = now_nanos();
        self.write_time.store(now, Ordering::Relaxed);
        self.last_accessed.store(now, Ordering::Relaxed);
    }

    /// Nanosecond timestamp (since Unix epoch) of the entry's creation or last replacement.
    pub fn write_time(&self) -> u64 {
        self.write_time.load(Ordering::Relaxed)
    }

    /// Nanosecond timestamp (since Unix epoch) of the entry's last read or write.
    pub fn last_accessed(&self) -> u64 {
        self.last_accessed.load(Ordering::Relaxed)
    }

    /// Number of reads recorded since creation.
    pub fn frequency(&self) -> u64 {
        self.frequency.load(Ordering::Relaxed)
    }

    /// Nanoseconds elapsed since the entry was written.
    pub fn age_nanos(&self) -> u64 {
        now_nanos().saturating_sub(self.write_time())
    }

    /// Nanoseconds elapsed since the entry was last read.
    pub fn idle_nanos(&self) -> u64 {
        now_nanos().saturating_sub(self.last_accessed())
    }

    /// Marks the entry as logically removed. A racing reader that already fetched a handle to
    /// this entry must check [`CacheEntry::is_tombstoned`] before returning its value.
    pub fn tombstone(&self) {
        self.tombstone.store(true, Ordering::Release);
    }

    /// Returns `true` if [`CacheEntry::tombstone`] has been called on this entry.
    pub fn is_tombstoned(&self) -> bool {
        self.tombstone.load(Ordering::Acquire)
    }
}

impl<K: Clone, V: Clone> Clone for CacheEntry<K, V> {
    fn clone(&self) -> Self {
        CacheEntry {
            key: self.key.clone(),
            value: self.value.clone(),
            weight: self.weight,
            write_time: AtomicU64::new(self.write_time()),
            last_accessed: AtomicU64::new(self.last_accessed()),
            frequency: AtomicU64::new(self.frequency()),
            tombstone: AtomicBool::new(self.is_tombstoned()),
        }
    }
}

impl<K: std::fmt::Debug, V: std::fmt::Debug> std::fmt::Debug for CacheEntry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("weight", &self.weight)
            .field("write_time", &self.write_time())
            .field("last_accessed", &self.last_accessed())
            .field("frequency", &self.frequency())
            .field("tombstone", &self.is_tombstoned())
            .finish()
    }
}
