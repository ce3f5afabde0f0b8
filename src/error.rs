//! Error types for the cache
//!
//! Provides unified error handling using thiserror. Cache misses are not
//! errors: lookups report them through `Option` and sentinel values.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Max age must be at least one second
    #[error("Invalid max age: {0} (time can not be less than 1)")]
    InvalidMaxAge(u64),

    /// No tokio runtime available to drive expiration timers
    #[error("No tokio runtime available to schedule expirations")]
    NoRuntime,

    /// Entry or store could not be serialized for size estimation
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
