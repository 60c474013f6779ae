//! A small, shared, process-wide background worker pool (spec §4.8, §9 "Global state").
//!
//! Every [`crate::cache::Cache`] in the process registers its periodic maintenance (expiration
//! sweeps, refresh kicks) with the same [`Scheduler`] rather than spinning up its own threads —
//! the spec asks for "a small number of daemon threads (default 2)" shared process-wide, lazily
//! initialized and torn down only at process exit.
//!
//! Grounded on `Borislavv-rs-adv-cache`'s `workers/lifetimer/lifetimer.rs` (`tokio::select!`
//! between a `CancellationToken` and a timer, `tracing` at every state transition), stripped of
//! its dynamic worker-scaling and rate-limiting machinery — this crate's background work is a
//! fixed, small set of idempotent, self-rescheduling ticks, not a governor-driven pool.

use std::sync::OnceLock;
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Default number of daemon threads backing the shared scheduler (spec §4.8).
const DEFAULT_SCHEDULER_THREADS: usize = 2;

/// The process-wide background worker pool. Obtain it via [`Scheduler::global`]; there is no
/// public constructor, matching spec §9's "no other global state" besides this one.
pub struct Scheduler {
    runtime: Runtime,
}

impl Scheduler {
    /// Returns the lazily-initialized, process-wide scheduler.
    pub fn global() -> &'static Scheduler {
        static SCHEDULER: OnceLock<Scheduler> = OnceLock::new();
        SCHEDULER.get_or_init(|| {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(DEFAULT_SCHEDULER_THREADS)
                .thread_name("cache-rs-scheduler")
                .enable_time()
                .build()
                .expect("failed to start the shared cache-rs scheduler runtime");
            tracing::debug!(
                threads = DEFAULT_SCHEDULER_THREADS,
                "cache-rs scheduler started"
            );
            Scheduler { runtime }
        })
    }

    /// Registers a self-rescheduling task that runs `task` every `interval` until the returned
    /// [`TaskHandle`] is cancelled (or dropped). Tasks are idempotent: a tick that finds nothing
    /// to do is a correct outcome, not an error.
    pub fn schedule_repeating(
        &self,
        name: &'static str,
        interval: Duration,
        mut task: impl FnMut() + Send + 'static,
    ) -> TaskHandle {
        let token = CancellationToken::new();
        let child = token.child_token();

        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => {
                        tracing::debug!(task = name, "scheduled task cancelled");
                        return;
                    }
                    _ = ticker.tick() => {
                        task();
                    }
                }
            }
        });

        TaskHandle { token }
    }

    /// Runs `future` once on the scheduler's runtime, detached from the caller. Used to kick off
    /// an async-loader refresh-after-write reload without blocking the reader that triggered it.
    pub fn spawn_detached(&self, future: impl std::future::Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(future);
    }

    /// Runs `task` once on the scheduler's blocking thread pool, detached from the caller. Used
    /// to kick off a synchronous-loader refresh-after-write reload without blocking the reader
    /// that triggered it and without spinning up an ad hoc thread per refresh.
    pub fn spawn_blocking_detached(&self, task: impl FnOnce() + Send + 'static) {
        self.runtime.spawn_blocking(task);
    }
}

/// Cancels its associated repeating task when dropped or when [`TaskHandle::cancel`] is called
/// explicitly — used by [`crate::cache::Cache::close`] to stop a cache's maintenance tasks
/// without affecting any other cache sharing the same [`Scheduler`].
pub struct TaskHandle {
    token: CancellationToken,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
