//! Error taxonomy for cache operations.
//!
//! All fallible public operations return [`CacheError`]. Misses are represented as
//! `Option::None`, never as an error — only genuine failures (bad configuration, a loader
//! that failed, a deadline that elapsed) reach this type.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by cache operations.
///
/// The `E` parameter is the error type returned by a caller-supplied loader closure; it is
/// threaded through unchanged rather than erased to a string, so callers keep their own
/// error information.
#[derive(Error, Debug)]
pub enum CacheError<E = std::convert::Infallible> {
    /// The [`crate::builder::Builder`] was given contradictory or out-of-range settings.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),

    /// An entry could not be admitted because it (or the aggregate) exceeds a configured limit.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    /// A loader invoked on behalf of the caller returned an error.
    #[error("loader failed: {0}")]
    Load(#[source] E),

    /// An async wait exceeded its deadline. The underlying load, if any, continues in the
    /// background and will populate the cache for later readers.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A runtime invariant was violated (e.g. a weigher returned a weight that overflows).
    #[error("cache operation error: {0}")]
    Operation(String),
}

impl<E> CacheError<E> {
    /// Builds a [`CacheError::Configuration`] from any displayable reason.
    pub fn configuration(reason: impl fmt::Display) -> Self {
        CacheError::Configuration(reason.to_string())
    }

    /// Builds a [`CacheError::Capacity`] from any displayable reason.
    pub fn capacity(reason: impl fmt::Display) -> Self {
        CacheError::Capacity(reason.to_string())
    }

    /// Builds a [`CacheError::Operation`] from any displayable reason.
    pub fn operation(reason: impl fmt::Display) -> Self {
        CacheError::Operation(reason.to_string())
    }

    /// Returns `true` if retrying the operation that produced this error might succeed.
    ///
    /// Matches the retryability rules of §7: load and timeout failures are retryable,
    /// configuration and operation errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Load(_) | CacheError::Timeout(_))
    }
}
