//! Write/access TTL checks and refresh-after-write timing (spec §4.4).
//!
//! Net new relative to the reference crate, which has no time-based expiration at all. Built
//! directly atop [`crate::entry::CacheEntry`]'s `age_nanos`/`idle_nanos` so the hot-path check
//! stays a couple of comparisons against already-recorded atomics, no extra bookkeeping per
//! entry.

use std::time::Duration;

use crate::config::ExpirationConfig;
use crate::entry::CacheEntry;

/// What the read/write path should do about an entry, determined by [`ExpirationEngine::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpirationDecision {
    /// Entry is valid as-is.
    Fresh,
    /// Entry is valid, but is old enough that a refresh should be kicked off (the caller still
    /// gets the current value).
    NeedsRefresh,
    /// Entry must be treated as a miss and removed.
    Expired,
}

/// Evaluates `expireAfterWrite`, `expireAfterAccess` and `refreshAfterWrite` against an entry's
/// recorded timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpirationEngine {
    config: ExpirationConfig,
}

impl ExpirationEngine {
    pub fn new(config: ExpirationConfig) -> Self {
        ExpirationEngine { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.expire_after_write.is_some()
            || self.config.expire_after_access.is_some()
            || self.config.refresh_after_write.is_some()
    }

    /// Determines whether `entry` is fresh, due for expiration, or due for a background refresh,
    /// as of `now_nanos`. Expiration is checked before refresh: an entry that is both expired and
    /// past its refresh window is reported as `Expired`.
    pub fn check<K, V>(&self, entry: &CacheEntry<K, V>, now_nanos: u64) -> ExpirationDecision {
        if let Some(ttl) = self.config.expire_after_write {
            if nanos_since(entry.write_time(), now_nanos) >= ttl.as_nanos() as u64 {
                return ExpirationDecision::Expired;
            }
        }
        if let Some(ttl) = self.config.expire_after_access {
            if nanos_since(entry.last_accessed(), now_nanos) >= ttl.as_nanos() as u64 {
                return ExpirationDecision::Expired;
            }
        }
        if let Some(refresh_ttl) = self.config.refresh_after_write {
            if nanos_since(entry.write_time(), now_nanos) >= refresh_ttl.as_nanos() as u64 {
                return ExpirationDecision::NeedsRefresh;
            }
        }
        ExpirationDecision::Fresh
    }

    pub fn expire_after_write(&self) -> Option<Duration> {
        self.config.expire_after_write
    }

    pub fn expire_after_access(&self) -> Option<Duration> {
        self.config.expire_after_access
    }

    pub fn refresh_after_write(&self) -> Option<Duration> {
        self.config.refresh_after_write
    }
}

fn nanos_since(earlier: u64, now: u64) -> u64 {
    now.saturating_sub(earlier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::CacheEntry;

    #[test]
    fn fresh_entry_within_ttl_is_not_expired() {
        let engine = ExpirationEngine::new(ExpirationConfig {
            expire_after_write: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        let entry = CacheEntry::new("k", 1, 1);
        let now = entry.write_time() + Duration::from_secs(1).as_nanos() as u64;
        assert_eq!(engine.check(&entry, now), ExpirationDecision::Fresh);
    }

    #[test]
    fn entry_past_write_ttl_is_expired() {
        let engine = ExpirationEngine::new(ExpirationConfig {
            expire_after_write: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let entry = CacheEntry::new("k", 1, 1);
        let now = entry.write_time() + Duration::from_millis(60).as_nanos() as u64;
        assert_eq!(engine.check(&entry, now), ExpirationDecision::Expired);
    }

    #[test]
    fn entry_past_refresh_window_but_not_expired_needs_refresh() {
        let engine = ExpirationEngine::new(ExpirationConfig {
            expire_after_write: Some(Duration::from_secs(60)),
            refresh_after_write: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let entry = CacheEntry::new("k", 1, 1);
        let now = entry.write_time() + Duration::from_millis(25).as_nanos() as u64;
        assert_eq!(engine.check(&entry, now), ExpirationDecision::NeedsRefresh);
    }

    #[test]
    fn access_ttl_expires_idle_entries_even_if_write_ttl_has_not_elapsed() {
        let engine = ExpirationEngine::new(ExpirationConfig {
            expire_after_access: Some(Duration::from_millis(10)),
            ..Default::default()
        });
        let entry = CacheEntry::new("k", 1, 1);
        let now = entry.last_accessed() + Duration::from_millis(20).as_nanos() as u64;
        assert_eq!(engine.check(&entry, now), ExpirationDecision::Expired);
    }

    #[test]
    fn engine_with_no_durations_configured_is_disabled() {
        let engine = ExpirationEngine::new(ExpirationConfig::default());
        assert!(!engine.is_enabled());
        let entry = CacheEntry::new("k", 1, 1);
        assert_eq!(
            engine.check(&entry, entry.write_time() + u64::from(u32::MAX)),
            ExpirationDecision::Fresh
        );
    }
}
