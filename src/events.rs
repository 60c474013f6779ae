//! Fan-out of cache lifecycle events to registered listeners (spec §4.7).
//!
//! Net new relative to the reference crate, which has no listener mechanism. Grounded on the
//! pack's consistent use of `tracing` at dispatch boundaries (`Borislavv-rs-adv-cache`'s worker
//! modules log-and-continue on internal failures rather than propagating them) — the same shape
//! applies here: a listener is caller-supplied code we do not trust to be panic-free, so a panic
//! or error from one is caught, logged, and never allowed to fail the operation that triggered
//! it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::RwLock;

/// Why an entry was removed, passed to [`CacheListener::on_remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Caller called `remove`/`invalidate` directly.
    Explicit,
    /// A `put` replaced an existing value for the same key.
    Replaced,
}

/// Why an entry was evicted, passed to [`CacheListener::on_evict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Evicted to stay within `maximumSize`.
    Size,
    /// Evicted to stay within `maximumWeight`.
    Weight,
}

/// Observer of cache lifecycle events. Implementors must not block — dispatch happens
/// synchronously on the caller's thread, inline with the operation that triggered it.
pub trait CacheListener<K, V>: Send + Sync {
    fn on_put(&self, _key: &K, _value: &V) {}
    fn on_remove(&self, _key: &K, _value: &V, _reason: RemovalReason) {}
    fn on_evict(&self, _key: &K, _value: &V, _reason: EvictionReason) {}
    fn on_expire(&self, _key: &K, _value: &V) {}
    fn on_load(&self, _key: &K, _value: &V) {}
    fn on_load_failure(&self, _key: &K) {}
}

/// Holds the set of registered listeners and dispatches events to all of them, isolating any
/// panic a listener raises so it never escapes to the caller of the triggering cache operation.
pub struct EventDispatcher<K, V> {
    listeners: RwLock<Vec<Box<dyn CacheListener<K, V>>>>,
}

impl<K, V> Default for EventDispatcher<K, V> {
    fn default() -> Self {
        EventDispatcher {
            listeners: RwLock::new(Vec::new()),
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident $(, $arg:expr)*) => {{
        let listeners = $self.listeners.read().expect("event dispatcher lock poisoned");
        for listener in listeners.iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.$method($($arg),*)));
            if outcome.is_err() {
                tracing::error!(event = stringify!($method), "cache listener panicked; event dropped");
            }
        }
    }};
}

impl<K, V> EventDispatcher<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Box<dyn CacheListener<K, V>>) {
        self.listeners
            .write()
            .expect("event dispatcher lock poisoned")
            .push(listener);
    }

    pub fn dispatch_put(&self, key: &K, value: &V) {
        dispatch!(self, on_put, key, value);
    }

    pub fn dispatch_remove(&self, key: &K, value: &V, reason: RemovalReason) {
        dispatch!(self, on_remove, key, value, reason);
    }

    pub fn dispatch_evict(&self, key: &K, value: &V, reason: EvictionReason) {
        dispatch!(self, on_evict, key, value, reason);
    }

    pub fn dispatch_expire(&self, key: &K, value: &V) {
        dispatch!(self, on_expire, key, value);
    }

    pub fn dispatch_load(&self, key: &K, value: &V) {
        dispatch!(self, on_load, key, value);
    }

    pub fn dispatch_load_failure(&self, key: &K) {
        dispatch!(self, on_load_failure, key);
    }
}
