//! Single-flight coordination for synchronous and asynchronous value loaders (spec §4.5).
//!
//! Grounded on the classic "one computation per key" pattern used by moka's sync cache
//! (`ValueInitializer`/`get_with` family — see `other_examples/...moka__src-sync-cache.rs.rs`)
//! and on `Chiicake-kernel-kv`'s tokio-based coordination for the async half. The synchronous
//! path is built from plain `std::sync::{Mutex, Condvar}` rather than tokio so that a cache with
//! no async loader configured never needs a runtime; the asynchronous path layers
//! `futures::future::Shared` over a `tokio::sync::Mutex`-guarded registry so every waiter polls
//! the same future to completion instead of spawning its own.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex as StdMutex};
use std::time::{Duration, Instant};

use futures::future::{FutureExt, Shared};
use tokio::sync::Mutex as AsyncMutex;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Whether a loader call was the single caller that actually ran the loader, or a follower that
/// observed the leader's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadRole {
    /// This caller executed the loader.
    Leader,
    /// This caller waited for another in-flight call to the same key.
    Follower,
}

/// Outcome of a coordinated load: the result plus which role the caller played and how long the
/// leader's loader call took (used to feed [`crate::stats::StatisticsRecorder::record_load_success`]
/// and [`crate::stats::StatisticsRecorder::record_load_failure`] exactly once per leader).
pub struct LoadOutcome<V, E> {
    pub result: Result<V, E>,
    pub role: LoadRole,
    pub duration: Duration,
}

struct SyncSlot<V, E> {
    state: StdMutex<Option<Result<V, E>>>,
    cond: Condvar,
}

/// Coordinates single-flight loading for both the synchronous and asynchronous loader paths.
///
/// The two paths keep separate in-flight registries: a cache is configured with either a
/// `loader` or an `asyncLoader` (spec §6's configuration table lists them as alternatives), so
/// in practice only one of the two registries below is ever populated for a given cache.
pub struct LoaderCoordinator<K, V, E> {
    sync_inflight: StdMutex<HashMap<K, Arc<SyncSlot<V, E>>>>,
    async_inflight: AsyncMutex<HashMap<K, Shared<BoxFuture<Result<V, E>>>>>,
}

impl<K, V, E> Default for LoaderCoordinator<K, V, E> {
    fn default() -> Self {
        LoaderCoordinator {
            sync_inflight: StdMutex::new(HashMap::new()),
            async_inflight: AsyncMutex::new(HashMap::new()),
        }
    }
}

impl<K, V, E> LoaderCoordinator<K, V, E>
where
    K: Hash + Eq + Clone,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `loader` for `key` with single-flight semantics: if another thread is already
    /// loading `key`, this call blocks on that thread's result instead of invoking `loader`
    /// again. On success, `publish` is called with the loaded value before the in-flight record
    /// is removed, so the value is visible to subsequent callers (e.g. already inserted into the
    /// cache's map) before anyone can observe both "not in-flight" and "not yet in the map" and
    /// start a redundant second load. The first (leader) caller then removes the in-flight record
    /// so a subsequent miss starts a fresh load rather than replaying a stale result — per spec
    /// §4.5, "errors are not cached".
    pub fn load_sync<P>(&self, key: K, loader: impl FnOnce() -> Result<V, E>, publish: P) -> LoadOutcome<V, E>
    where
        P: FnOnce(&V),
    {
        let slot = {
            let mut inflight = self.sync_inflight.lock().expect("loader registry poisoned");
            if let Some(existing) = inflight.get(&key) {
                (Arc::clone(existing), false)
            } else {
                let slot = Arc::new(SyncSlot {
                    state: StdMutex::new(None),
                    cond: Condvar::new(),
                });
                inflight.insert(key.clone(), Arc::clone(&slot));
                (slot, true)
            }
        };

        let (slot, is_leader) = slot;
        if is_leader {
            let start = Instant::now();
            let result = loader();
            let duration = start.elapsed();
            if let Ok(ref value) = result {
                publish(value);
            }
            *slot.state.lock().expect("loader slot poisoned") = Some(result.clone());
            slot.cond.notify_all();
            self.sync_inflight
                .lock()
                .expect("loader registry poisoned")
                .remove(&key);
            return LoadOutcome {
                result,
                role: LoadRole::Leader,
                duration,
            };
        }

        let mut guard = slot.state.lock().expect("loader slot poisoned");
        while guard.is_none() {
            guard = slot.cond.wait(guard).expect("loader slot poisoned");
        }
        LoadOutcome {
            result: guard.clone().expect("checked is_none above"),
            role: LoadRole::Follower,
            duration: Duration::ZERO,
        }
    }
}

impl<K, V, E> LoaderCoordinator<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Asynchronous counterpart of [`LoaderCoordinator::load_sync`]. Concurrent callers for the
    /// same key all `.await` the same [`Shared`] future; only the first caller's future is ever
    /// polled to produce the value, the rest observe its cloned output. `publish` runs as part of
    /// that shared future, after the loader succeeds but before the future resolves for anyone —
    /// so by the time any caller (leader or follower) observes the result, `publish` has already
    /// run (e.g. the value is already in the cache's map), closing the same single-flight window
    /// documented on [`LoaderCoordinator::load_sync`].
    pub async fn load_async<Fut, P>(&self, key: K, loader: Fut, publish: P) -> LoadOutcome<V, E>
    where
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        P: FnOnce(&V) + Send + 'static,
    {
        let (shared, is_leader) = {
            let mut inflight = self.async_inflight.lock().await;
            if let Some(existing) = inflight.get(&key) {
                (existing.clone(), false)
            } else {
                let boxed: BoxFuture<Result<V, E>> = Box::pin(async move {
                    let result = loader.await;
                    if let Ok(ref value) = result {
                        publish(value);
                    }
                    result
                });
                let shared = boxed.shared();
                inflight.insert(key.clone(), shared.clone());
                (shared, true)
            }
        };

        let start = Instant::now();
        let result = shared.await;
        let duration = start.elapsed();

        if is_leader {
            self.async_inflight.lock().await.remove(&key);
        }

        LoadOutcome {
            result,
            role: if is_leader {
                LoadRole::Leader
            } else {
                LoadRole::Follower
            },
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[test]
    fn single_caller_is_the_leader() {
        let coordinator: LoaderCoordinator<&str, i32, &str> = LoaderCoordinator::new();
        let outcome = coordinator.load_sync("k", || Ok(42), |_| {});
        assert_eq!(outcome.result, Ok(42));
        assert_eq!(outcome.role, LoadRole::Leader);
    }

    #[test]
    fn publish_runs_before_the_in_flight_record_is_removed() {
        let coordinator: LoaderCoordinator<&str, i32, &str> = LoaderCoordinator::new();
        let published = Arc::new(AtomicUsize::new(0));
        let published_in_publish = Arc::clone(&published);
        let outcome = coordinator.load_sync(
            "k",
            || Ok(42),
            |value| {
                published_in_publish.store(*value as usize, Ordering::SeqCst);
            },
        );
        assert_eq!(outcome.result, Ok(42));
        // publish() already ran by the time load_sync returns to the leader.
        assert_eq!(published.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn concurrent_callers_for_the_same_key_invoke_the_loader_once() {
        let coordinator = Arc::new(LoaderCoordinator::<String, usize, String>::new());
        let invocations = Arc::new(AtomicUsize::new(0));
        let n = 16;
        let barrier = Arc::new(Barrier::new(n));

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                let invocations = Arc::clone(&invocations);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    let outcome = coordinator.load_sync(
                        "hello".to_string(),
                        || {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(20));
                            Ok::<_, String>("hello".len())
                        },
                        |_| {},
                    );
                    outcome.result
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(5));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_failed_load_is_not_cached_and_may_be_retried() {
        let coordinator: LoaderCoordinator<&str, i32, &str> = LoaderCoordinator::new();
        let first = coordinator.load_sync("k", || Err("boom"), |_| {});
        assert_eq!(first.result, Err("boom"));
        let second = coordinator.load_sync("k", || Ok(7), |_| {});
        assert_eq!(second.result, Ok(7));
        assert_eq!(second.role, LoadRole::Leader);
    }

    #[tokio::test]
    async fn concurrent_async_callers_invoke_the_loader_once() {
        let coordinator = Arc::new(LoaderCoordinator::<String, usize, String>::new());
        let invocations = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let coordinator = Arc::clone(&coordinator);
            let invocations = Arc::clone(&invocations);
            handles.push(tokio::spawn(async move {
                coordinator
                    .load_async(
                        "hello".to_string(),
                        async move {
                            invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Ok::<_, String>("hello".len())
                        },
                        |_| {},
                    )
                    .await
                    .result
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(5));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }
}
