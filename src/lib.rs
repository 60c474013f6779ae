//! A concurrent in-process key/value cache engine with pluggable eviction, expiration,
//! refresh-ahead, single-flight loading and observable statistics.
//!
//! ```
//! use cache_rs::{Builder, Cache};
//!
//! let cache: Cache<&str, i32> = Builder::new().maximum_size(1000).build().unwrap();
//! cache.put("answer", 42).unwrap();
//! assert_eq!(cache.get(&"answer"), Some(42));
//! ```
//!
//! ## Eviction policies
//!
//! Selected at build time via [`Builder::eviction_policy`]: [`config::EvictionPolicyKind::Lru`],
//! `Lfu`, `Fifo`, `Lifo`, or `WindowTinyLfu` (a small window LRU admitting candidates into a
//! segmented main cache, gated by a [`sketch::FrequencySketch`] frequency comparison).
//!
//! ## Expiration and refresh
//!
//! `expireAfterWrite`, `expireAfterAccess` and `refreshAfterWrite` are configured on the
//! [`Builder`] and enforced both lazily (on the read/write path) and eagerly (by a shared
//! background [`scheduler::Scheduler`]).
//!
//! ## Loading
//!
//! [`Cache::get_with`] and [`Cache::get_with_async`] give every concurrent caller for a missing
//! key the result of a single loader invocation (spec §4.5, "single-flight").
//!
//! ## Modules
//!
//! - [`entry`]: per-entry metadata (timestamps, frequency, weight, tombstone state).
//! - [`sketch`]: the Count-Min frequency sketch backing Window-TinyLFU admission.
//! - [`policy`]: the pluggable eviction algorithms.
//! - [`shard`]: one lock-striped partition of the concurrent map.
//! - [`expiration`]: TTL and refresh-after-write checks.
//! - [`loader`]: single-flight synchronous/asynchronous loading.
//! - [`stats`]: atomic hit/miss/load/eviction counters and derived rates.
//! - [`events`]: fan-out of put/remove/evict/expire/load events to listeners.
//! - [`scheduler`]: the shared background worker pool driving periodic maintenance.
//! - [`retry`]: a standalone bounded-retry utility (not wired into [`Cache`] — see `DESIGN.md`).
//! - [`config`]: validated configuration types consumed by [`Builder`].
//! - [`error`]: the [`error::CacheError`] taxonomy returned by fallible operations.
//! - [`builder`]: [`Builder`], the sole entry point for constructing a [`Cache`].
//! - [`cache`]: [`Cache`], the public facade orchestrating every other module.

pub mod builder;
pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod events;
pub mod expiration;
pub mod loader;
pub(crate) mod list;
pub mod policy;
pub mod retry;
pub mod scheduler;
pub mod sketch;
pub mod stats;

pub use builder::Builder;
pub use cache::Cache;
pub use config::{CacheConfig, EvictionPolicyKind, UnitWeigher, Weigher};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use events::{CacheListener, EvictionReason, RemovalReason};
pub use retry::RetryPolicy;
pub use sketch::SketchKind;
pub use stats::StatsSnapshot;
