//! The concurrent cache facade (spec §4.9): the sharded map plus expiration, single-flight
//! loading, statistics and event dispatch wired together behind one `Clone`-able handle.
//!
//! Grounded on the reference crate's `concurrent/lru.rs` (`ConcurrentLruCache` wrapping a
//! `Vec<Mutex<LruSegment>>` behind an `Arc`), generalized from one hard-coded segment type to
//! whichever [`crate::policy::Policy`] variant the builder selected, and extended with the
//! ambient subsystems the reference crate's single-algorithm design never needed: expiration,
//! single-flight loading, a shared background scheduler, and event listeners.

use std::borrow::Borrow;
use std::cell::Cell;
use std::collections::HashMap as StdHashMap;
use std::future::Future;
use std::hash::{BuildHasher, Hash};
use std::num::NonZeroUsize;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{CacheConfig, Weigher};
use crate::entry::now_nanos;
use crate::error::CacheError;
use crate::events::{CacheListener, EventDispatcher, EvictionReason, RemovalReason};
use crate::expiration::{ExpirationDecision, ExpirationEngine};
use crate::loader::{LoadRole, LoaderCoordinator};
use crate::policy::{DefaultHashBuilder, Evicted};
use crate::scheduler::{Scheduler, TaskHandle};
use crate::shard::{shard_index, Shard};
use crate::stats::{StatisticsRecorder, StatsSnapshot};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type SyncLoaderFn<K, V, E> = dyn Fn(&K) -> Result<V, E> + Send + Sync;
type AsyncLoaderFn<K, V, E> = dyn Fn(K) -> BoxFuture<Result<V, E>> + Send + Sync;

/// Shortest configured duration, used to size the background maintenance tick: frequent enough
/// to retire expired entries promptly, never below a floor that would spin the scheduler.
const MIN_MAINTENANCE_INTERVAL: Duration = Duration::from_millis(10);
const MAX_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);
const MAINTENANCE_TASK_NAME: &str = "cache-rs-maintenance";

struct Inner<K, V, S, E> {
    shards: Box<[Shard<K, V, S>]>,
    hasher: S,
    shard_count: usize,
    config: CacheConfig,
    weigher: Arc<dyn Weigher<K, V>>,
    expiration: ExpirationEngine,
    loader_coordinator: LoaderCoordinator<K, V, E>,
    sync_loader: Option<Arc<SyncLoaderFn<K, V, E>>>,
    async_loader: Option<Arc<AsyncLoaderFn<K, V, E>>>,
    stats: StatisticsRecorder,
    events: EventDispatcher<K, V>,
    maintenance_handle: Mutex<Option<TaskHandle>>,
    closed: AtomicBool,
}

/// A concurrent, sharded, in-process key-value cache.
///
/// Cheap to clone: every clone shares the same shards, statistics and background maintenance
/// task through an `Arc`. Always constructed through [`crate::builder::Builder`].
pub struct Cache<K, V, S = DefaultHashBuilder, E = std::convert::Infallible> {
    inner: Arc<Inner<K, V, S, E>>,
}

impl<K, V, S, E> Clone for Cache<K, V, S, E> {
    fn clone(&self) -> Self {
        Cache {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, S, E> Cache<K, V, S, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: BuildHasher + Default + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Assembles a validated [`CacheConfig`] and its supporting pieces into a running cache.
    /// Only called from [`crate::builder::Builder::build`], which is the sole place construction
    /// can fail — every combination reaching here is already known to be valid.
    pub(crate) fn from_parts(
        config: CacheConfig,
        hasher: S,
        weigher: Arc<dyn Weigher<K, V>>,
        sync_loader: Option<Arc<SyncLoaderFn<K, V, E>>>,
        async_loader: Option<Arc<AsyncLoaderFn<K, V, E>>>,
        listeners: Vec<Box<dyn CacheListener<K, V>>>,
    ) -> Self {
        let shard_count = config.shard_count();
        let per_shard_capacity = config
            .per_shard_capacity()
            .and_then(|n| NonZeroUsize::new(n as usize))
            .unwrap_or_else(|| NonZeroUsize::new(config.initial_capacity.max(1)).unwrap());

        let shards = (0..shard_count)
            .map(|_| Shard::new(config.policy, per_shard_capacity, config.sketch))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let events = EventDispatcher::new();
        for listener in listeners {
            events.register(listener);
        }

        let expiration = ExpirationEngine::new(config.expiration);

        let inner = Arc::new(Inner {
            shards,
            hasher,
            shard_count,
            expiration,
            weigher,
            loader_coordinator: LoaderCoordinator::new(),
            sync_loader,
            async_loader,
            stats: StatisticsRecorder::new(config.record_stats),
            events,
            maintenance_handle: Mutex::new(None),
            closed: AtomicBool::new(false),
            config,
        });

        let cache = Cache { inner };
        if cache.inner.expiration.is_enabled() {
            cache.start_maintenance();
        }
        cache
    }

    fn start_maintenance(&self) {
        let interval = self.maintenance_interval();
        let maintained = self.clone();
        let handle = Scheduler::global().schedule_repeating(MAINTENANCE_TASK_NAME, interval, move || {
            maintained.clean_up();
        });
        *self.inner.maintenance_handle.lock() = Some(handle);
    }

    fn maintenance_interval(&self) -> Duration {
        [
            self.inner.expiration.expire_after_write(),
            self.inner.expiration.expire_after_access(),
            self.inner.expiration.refresh_after_write(),
        ]
        .into_iter()
        .flatten()
        .min()
        .map(|d| (d / 4).clamp(MIN_MAINTENANCE_INTERVAL, MAX_MAINTENANCE_INTERVAL))
        .unwrap_or(MAX_MAINTENANCE_INTERVAL)
    }

    fn shard_for<Q>(&self, key: &Q) -> &Shard<K, V, S>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        let idx = shard_index(key, &self.inner.hasher, self.inner.shard_count);
        &self.inner.shards[idx]
    }

    fn evict_reason(&self) -> EvictionReason {
        if self.inner.config.maximum_weight.is_some() {
            EvictionReason::Weight
        } else {
            EvictionReason::Size
        }
    }

    fn record_evictions(&self, evicted: Vec<Evicted<K, V>>) {
        let reason = self.evict_reason();
        for victim in evicted {
            self.inner.stats.record_eviction(victim.weight);
            self.inner.events.dispatch_evict(&victim.key, &victim.value, reason);
        }
    }

    /// Inserts `key`/`value`, applying the configured weigher and dispatching `on_put`/`on_evict`.
    /// Shared by [`Cache::put`] and the loader-success paths, which both need the same
    /// weight-check-then-insert-then-dispatch sequence.
    fn insert(&self, key: K, value: V) -> Result<Option<V>, CacheError<E>> {
        let weight = self.inner.weigher.weigh(&key, &value);
        if let Some(max_weight) = self.inner.config.maximum_weight {
            if weight > max_weight {
                return Err(CacheError::capacity(format!(
                    "entry weight {weight} exceeds maximumWeight {max_weight}"
                )));
            }
        }
        let per_shard_weight = self.inner.config.per_shard_weight();
        let shard = self.shard_for(&key);
        let (old, evicted) = shard.put(key.clone(), value.clone(), weight, per_shard_weight);
        self.record_evictions(evicted);
        self.inner.events.dispatch_put(&key, &value);
        Ok(old)
    }

    /// Kicks off a single-flight reload for `key` on the scheduler's runtime, fire-and-forget.
    /// On success the reloaded value is inserted (via `mark_written`'s write-time reset, through
    /// the normal `insert` path) so a later `get` sees it as freshly written; on failure, nothing
    /// about the existing entry changes, and the stale value keeps being served until the next
    /// refresh window.
    fn kick_refresh(&self, key: K) {
        if let Some(loader_fn) = self.inner.sync_loader.clone() {
            let this = self.clone();
            let publisher = self.clone();
            let key_for_publish = key.clone();
            Scheduler::global().spawn_blocking_detached(move || {
                let key_for_load = key.clone();
                let outcome = this.inner.loader_coordinator.load_sync(
                    key.clone(),
                    move || loader_fn(&key_for_load),
                    move |value: &V| publisher.publish_refresh(key_for_publish, value.clone()),
                );
                this.finish_refresh(key, outcome.role, outcome.result, outcome.duration);
            });
        } else if let Some(loader_fn) = self.inner.async_loader.clone() {
            let this = self.clone();
            let publisher = self.clone();
            let key_for_publish = key.clone();
            Scheduler::global().spawn_detached(async move {
                let key_for_load = key.clone();
                let fut = (loader_fn)(key_for_load);
                let outcome = this
                    .inner
                    .loader_coordinator
                    .load_async(key.clone(), fut, move |value: &V| {
                        publisher.publish_refresh(key_for_publish, value.clone())
                    })
                    .await;
                this.finish_refresh(key, outcome.role, outcome.result, outcome.duration);
            });
        }
    }

    /// Inserts a reloaded value on behalf of [`Cache::kick_refresh`]'s single-flight leader, as
    /// the loader coordinator's `publish` callback, so the reload is in the map before the
    /// in-flight record is released (see [`crate::loader::LoaderCoordinator::load_sync`]).
    fn publish_refresh(&self, key: K, value: V) {
        match self.insert(key, value) {
            Ok(_) => {}
            Err(CacheError::Capacity(reason)) => {
                tracing::warn!(reason = %reason, "refresh could not insert the reloaded value");
            }
            Err(_) => {}
        }
    }

    fn finish_refresh(&self, key: K, role: LoadRole, result: Result<V, E>, duration: Duration) {
        if role != LoadRole::Leader {
            return;
        }
        match result {
            Ok(value) => {
                self.inner
                    .stats
                    .record_load_success(duration.as_nanos() as u64);
                self.inner.events.dispatch_load(&key, &value);
            }
            Err(_) => {
                self.inner
                    .stats
                    .record_load_failure(duration.as_nanos() as u64);
                self.inner.events.dispatch_load_failure(&key);
            }
        }
    }

    /// Reads `key` without invoking any loader. Fresh entries are returned as-is; an entry past
    /// `expireAfterWrite`/`expireAfterAccess` is treated as a miss and removed; an entry past
    /// `refreshAfterWrite` is returned while a background reload is kicked off.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.inner.expiration.is_enabled() {
            let shard = self.shard_for(key);
            let snapshot = shard.with_entry(key, |entry| {
                (
                    self.inner.expiration.check(entry, now_nanos()),
                    entry.key.clone(),
                    entry.value.clone(),
                )
            });
            match snapshot {
                Some((ExpirationDecision::Expired, owned_key, value)) => {
                    shard.remove(key);
                    self.inner.stats.record_miss();
                    self.inner.events.dispatch_expire(&owned_key, &value);
                    return None;
                }
                Some((ExpirationDecision::NeedsRefresh, owned_key, _)) => {
                    if self.inner.sync_loader.is_some() || self.inner.async_loader.is_some() {
                        self.kick_refresh(owned_key);
                    }
                }
                Some((ExpirationDecision::Fresh, _, _)) | None => {}
            }
        }

        let result = self.shard_for(key).get(key);
        if result.is_some() {
            self.inner.stats.record_hit();
        } else {
            self.inner.stats.record_miss();
        }
        result
    }

    /// Reads `key`, invoking `loader` exactly once across every concurrent caller on a miss
    /// (spec §4.5, single-flight). The loaded value is inserted into the cache before being
    /// returned.
    pub fn get_with(
        &self,
        key: K,
        loader: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, CacheError<E>> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let insert_error: Cell<Option<CacheError<E>>> = Cell::new(None);
        let key_for_publish = key.clone();
        let outcome = self
            .inner
            .loader_coordinator
            .load_sync(key.clone(), loader, |value: &V| {
                if let Err(e) = self.insert(key_for_publish.clone(), value.clone()) {
                    insert_error.set(Some(e));
                }
            });
        match outcome.result {
            Ok(value) => {
                if outcome.role == LoadRole::Leader {
                    self.inner
                        .stats
                        .record_load_success(outcome.duration.as_nanos() as u64);
                    if let Some(err) = insert_error.into_inner() {
                        return Err(err);
                    }
                    self.inner.events.dispatch_load(&key, &value);
                }
                Ok(value)
            }
            Err(err) => {
                if outcome.role == LoadRole::Leader {
                    self.inner
                        .stats
                        .record_load_failure(outcome.duration.as_nanos() as u64);
                    self.inner.events.dispatch_load_failure(&key);
                }
                Err(CacheError::Load(err))
            }
        }
    }

    /// Asynchronous counterpart of [`Cache::get_with`]. `timeout`, if given, bounds only this
    /// caller's wait — an in-flight load started by another caller keeps running regardless and
    /// will populate the cache for the next reader.
    pub async fn get_with_async<Fut>(
        &self,
        key: K,
        loader: Fut,
        timeout: Option<Duration>,
    ) -> Result<V, CacheError<E>>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let insert_error = Arc::new(StdMutex::new(None));
        let insert_error_for_publish = Arc::clone(&insert_error);
        let this = self.clone();
        let key_for_publish = key.clone();
        let load = self
            .inner
            .loader_coordinator
            .load_async(key.clone(), loader, move |value: &V| {
                if let Err(e) = this.insert(key_for_publish.clone(), value.clone()) {
                    *insert_error_for_publish
                        .lock()
                        .expect("insert error mutex poisoned") = Some(e);
                }
            });
        let outcome = match timeout {
            Some(duration) => match tokio::time::timeout(duration, load).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(CacheError::Timeout(duration)),
            },
            None => load.await,
        };
        match outcome.result {
            Ok(value) => {
                if outcome.role == LoadRole::Leader {
                    self.inner
                        .stats
                        .record_load_success(outcome.duration.as_nanos() as u64);
                    if let Some(err) = insert_error.lock().expect("insert error mutex poisoned").take() {
                        return Err(err);
                    }
                    self.inner.events.dispatch_load(&key, &value);
                }
                Ok(value)
            }
            Err(err) => {
                if outcome.role == LoadRole::Leader {
                    self.inner
                        .stats
                        .record_load_failure(outcome.duration.as_nanos() as u64);
                    self.inner.events.dispatch_load_failure(&key);
                }
                Err(CacheError::Load(err))
            }
        }
    }

    /// Unconditionally inserts `key`/`value`, returning whatever value it replaced.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>, CacheError<E>> {
        self.insert(key, value)
    }

    /// Inserts `key`/`value` only if `key` is not already present. Returns the existing value
    /// (unchanged) if it was.
    pub fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>, CacheError<E>> {
        let weight = self.inner.weigher.weigh(&key, &value);
        if let Some(max_weight) = self.inner.config.maximum_weight {
            if weight > max_weight {
                return Err(CacheError::capacity(format!(
                    "entry weight {weight} exceeds maximumWeight {max_weight}"
                )));
            }
        }
        let per_shard_weight = self.inner.config.per_shard_weight();
        let shard = self.shard_for(&key);
        let (existing, evicted) = shard.put_if_absent(key.clone(), value.clone(), weight, per_shard_weight);
        self.record_evictions(evicted);
        if existing.is_none() {
            self.inner.events.dispatch_put(&key, &value);
        }
        Ok(existing)
    }

    /// Atomically swaps `key`'s value for `new`, only if its current value equals `old`. Returns
    /// whether the swap happened.
    pub fn replace(&self, key: K, old: V, new: V) -> Result<bool, CacheError<E>>
    where
        V: PartialEq,
    {
        let weight = self.inner.weigher.weigh(&key, &new);
        if let Some(max_weight) = self.inner.config.maximum_weight {
            if weight > max_weight {
                return Err(CacheError::capacity(format!(
                    "entry weight {weight} exceeds maximumWeight {max_weight}"
                )));
            }
        }
        let per_shard_weight = self.inner.config.per_shard_weight();
        let shard = self.shard_for(&key);
        let (swapped, evicted) = shard.compare_and_swap(&key, &old, new.clone(), weight, per_shard_weight);
        self.record_evictions(evicted);
        if swapped {
            self.inner.events.dispatch_put(&key, &new);
        }
        Ok(swapped)
    }

    /// Removes `key` unconditionally, returning its value if present.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q> + Clone,
        Q: Hash + Eq + ?Sized + ToOwned<Owned = K>,
    {
        let removed = self.shard_for(key).remove(key);
        if let Some(value) = &removed {
            let owned_key = key.to_owned();
            self.inner
                .events
                .dispatch_remove(&owned_key, value, RemovalReason::Explicit);
        }
        removed
    }

    /// Removes `key` only if its current value equals `expected`. Returns whether it was removed.
    pub fn remove_if<Q>(&self, key: &Q, expected: &V) -> bool
    where
        K: Borrow<Q> + Clone,
        Q: Hash + Eq + ?Sized + ToOwned<Owned = K>,
        V: PartialEq,
    {
        let removed = self.shard_for(key).remove_if(key, expected);
        if let Some(value) = &removed {
            let owned_key = key.to_owned();
            self.inner
                .events
                .dispatch_remove(&owned_key, value, RemovalReason::Explicit);
        }
        removed.is_some()
    }

    /// Removes every entry from every shard.
    pub fn invalidate_all(&self) {
        for shard in self.inner.shards.iter() {
            shard.clear();
        }
    }

    /// Removes every key in `keys`, best-effort (a missing key is not an error).
    pub fn invalidate_many(&self, keys: impl IntoIterator<Item = K>) {
        for key in keys {
            self.remove(&key);
        }
    }

    /// Reads every key in `keys`, omitting any that are absent.
    pub fn get_all(&self, keys: impl IntoIterator<Item = K>) -> StdHashMap<K, V>
    where
        K: std::hash::Hash + Eq,
    {
        let mut out = StdHashMap::new();
        for key in keys {
            if let Some(value) = self.get(&key) {
                out.insert(key, value);
            }
        }
        out
    }

    /// Inserts every `(key, value)` pair in `entries`, best-effort. Returns a [`CacheError::Capacity`]
    /// summarizing how many entries could not be admitted (e.g. over `maximumWeight` individually)
    /// without aborting the pairs that did succeed.
    pub fn put_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Result<(), CacheError<E>> {
        let mut failures = 0u64;
        for (key, value) in entries {
            if self.put(key, value).is_err() {
                failures += 1;
            }
        }
        if failures > 0 {
            Err(CacheError::capacity(format!(
                "{failures} entries could not be admitted"
            )))
        } else {
            Ok(())
        }
    }

    /// Total number of entries currently held, summed across all shards.
    pub fn size(&self) -> u64 {
        self.inner.shards.iter().map(|shard| shard.len() as u64).sum()
    }

    /// A point-in-time snapshot of hit/miss/load/eviction counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Sweeps every shard for expired entries and removes them, dispatching `on_expire`, and kicks
    /// a background reload for every entry past `refreshAfterWrite`. Runs automatically on the
    /// shared [`Scheduler`] when any expiration duration is configured; exposed directly for
    /// callers that want an eager, synchronous sweep (e.g. in tests). This is what lets a cache
    /// built with `refresh_after_write` and no reads still reload in the background — the lazy
    /// check in [`Cache::get`] only fires for keys callers actually read.
    pub fn clean_up(&self) {
        if !self.inner.expiration.is_enabled() {
            return;
        }
        let now = now_nanos();
        let has_loader = self.inner.sync_loader.is_some() || self.inner.async_loader.is_some();
        for shard in self.inner.shards.iter() {
            let mut expired = Vec::new();
            let mut needs_refresh = Vec::new();
            shard.for_each(|entry| match self.inner.expiration.check(entry, now) {
                ExpirationDecision::Expired => {
                    expired.push((entry.key.clone(), entry.value.clone()));
                }
                ExpirationDecision::NeedsRefresh if has_loader => {
                    needs_refresh.push(entry.key.clone());
                }
                ExpirationDecision::NeedsRefresh | ExpirationDecision::Fresh => {}
            });
            for (key, value) in expired {
                shard.remove(&key);
                self.inner.events.dispatch_expire(&key, &value);
            }
            for key in needs_refresh {
                self.kick_refresh(key);
            }
        }
    }

    /// Cancels this cache's background maintenance task. Idempotent; safe to call more than
    /// once or on a cache that never started one (no expiration configured).
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.inner.maintenance_handle.lock().take() {
            handle.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    #[test]
    fn put_then_get_round_trips() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn put_if_absent_does_not_overwrite() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put_if_absent("a", 1).unwrap();
        let existing = cache.put_if_absent("a", 2).unwrap();
        assert_eq!(existing, Some(1));
        assert_eq!(cache.get(&"a"), Some(1));
    }

    #[test]
    fn replace_is_a_true_compare_and_swap() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        assert!(!cache.replace("a", 2, 99).unwrap());
        assert_eq!(cache.get(&"a"), Some(1));
        assert!(cache.replace("a", 1, 99).unwrap());
        assert_eq!(cache.get(&"a"), Some(99));
    }

    #[test]
    fn remove_returns_the_removed_value() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn remove_if_only_removes_on_a_matching_value() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        assert!(!cache.remove_if(&"a", &2));
        assert!(cache.remove_if(&"a", &1));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn get_with_invokes_the_loader_once_on_a_miss() {
        let cache: Cache<&str, i32, DefaultHashBuilder, &str> =
            Builder::new().maximum_size(10).build().unwrap();
        let calls = StdArc::new(AtomicUsize::new(0));
        let c = StdArc::clone(&calls);
        let value = cache
            .get_with("a", || {
                c.fetch_add(1, AtomicOrdering::SeqCst);
                Ok(42)
            })
            .unwrap();
        assert_eq!(value, 42);
        assert_eq!(cache.get(&"a"), Some(42));
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);

        // A second call for the same now-present key does not invoke the loader again.
        let value = cache.get_with("a", || {
            calls.fetch_add(1, AtomicOrdering::SeqCst);
            Ok(0)
        });
        assert_eq!(value.unwrap(), 42);
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn put_fails_when_a_single_entrys_weight_exceeds_maximum_weight() {
        let cache: Cache<&str, Vec<u8>> = Builder::new()
            .maximum_weight(10)
            .weigher(|_: &&str, v: &Vec<u8>| v.len() as u64)
            .build()
            .unwrap();
        let result = cache.put("a", vec![0u8; 20]);
        assert!(result.is_err());
    }

    #[test]
    fn invalidate_all_empties_every_shard() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        cache.put("b", 2).unwrap();
        cache.invalidate_all();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn get_all_omits_absent_keys() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.put("a", 1).unwrap();
        let result = cache.get_all(["a", "b"]);
        assert_eq!(result.get("a"), Some(&1));
        assert_eq!(result.get("b"), None);
    }

    #[test]
    fn clean_up_removes_entries_past_their_write_ttl() {
        let cache: Cache<&str, i32> = Builder::new()
            .maximum_size(10)
            .expire_after_write(Duration::from_millis(10))
            .build()
            .unwrap();
        cache.put("a", 1).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        cache.clean_up();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn get_on_an_expired_entry_is_a_miss_and_removes_it() {
        let cache: Cache<&str, i32> = Builder::new()
            .maximum_size(10)
            .expire_after_write(Duration::from_millis(10))
            .build()
            .unwrap();
        cache.put("a", 1).unwrap();
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn stats_track_hits_and_misses_when_enabled() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).record_stats(true).build().unwrap();
        cache.put("a", 1).unwrap();
        cache.get(&"a");
        cache.get(&"missing");
        let snap = cache.stats();
        assert_eq!(snap.hit_count, 1);
        assert_eq!(snap.miss_count, 1);
    }

    #[test]
    fn eviction_beyond_maximum_size_is_observed_through_get() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(1).concurrency_level(1).build().unwrap();
        cache.put("a", 1).unwrap();
        cache.put("b", 2).unwrap();
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn close_is_idempotent_and_safe_without_expiration_configured() {
        let cache: Cache<&str, i32> = Builder::new().maximum_size(10).build().unwrap();
        cache.close();
        cache.close();
    }

    #[tokio::test]
    async fn get_with_async_invokes_the_loader_once_on_a_miss() {
        let cache: Cache<&str, i32, DefaultHashBuilder, &str> =
            Builder::new().maximum_size(10).build().unwrap();
        let value = cache
            .get_with_async("a", async { Ok(7) }, None)
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(cache.get(&"a"), Some(7));
    }

    #[tokio::test]
    async fn get_with_async_times_out_without_cancelling_the_load() {
        let cache: Cache<&str, i32, DefaultHashBuilder, &str> =
            Builder::new().maximum_size(10).build().unwrap();
        let result = cache
            .get_with_async(
                "a",
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(7)
                },
                Some(Duration::from_millis(5)),
            )
            .await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));
    }
}
