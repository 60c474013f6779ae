//! Bounded retry with exponential backoff and jitter (spec §4.10).
//!
//! A standalone utility, not wired into [`crate::cache::Cache`] — see `DESIGN.md`'s Open
//! Question resolution (b): the spec treats retry as a caller concern. Net new relative to the
//! reference crate; grounded on `Borislavv-rs-adv-cache`'s use of `rand` for jittered backoff in
//! its worker retry loops.

use std::time::Duration;

use rand::Rng;

/// Configuration for [`run`]/[`run_async`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first (non-retry) one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after every failed attempt.
    pub multiplier: f64,
    /// Upper bound on the delay between attempts, regardless of the multiplier.
    pub max_delay: Duration,
    /// Jitter factor `j ∈ [0, 1]`: the delay is perturbed by a uniformly random factor in
    /// `[1 - j, 1 + j]`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(50),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// The delay to sleep before attempt number `attempt` (1-indexed: the delay before the
    /// second attempt overall), before jitter is applied.
    fn base_delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    fn jittered_delay(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let factor = if self.jitter <= 0.0 {
            1.0
        } else {
            rng.gen_range((1.0 - self.jitter)..=(1.0 + self.jitter))
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}

/// Runs `op`, retrying per `policy` as long as `is_retryable` accepts the error, using `rng` as
/// the jitter source (a pluggable source, per spec §4.10, so tests can be deterministic).
///
/// Sleeps synchronously between attempts via `std::thread::sleep`.
pub fn run<T, E>(
    policy: &RetryPolicy,
    mut rng: impl Rng,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Result<T, E>,
) -> Result<T, E> {
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                std::thread::sleep(policy.jittered_delay(attempt, &mut rng));
                attempt += 1;
            }
        }
    }
}

/// Async counterpart of [`run`], sleeping via `tokio::time::sleep` between attempts.
pub async fn run_async<T, E, Fut>(
    policy: &RetryPolicy,
    mut rng: impl Rng,
    mut is_retryable: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.jittered_delay(attempt, &mut rng)).await;
                attempt += 1;
            }
        }
    }
}
