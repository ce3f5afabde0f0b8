//! Quicache - An in-process TTL key/value cache
//!
//! Values are stored under string (or numeric) keys and removed automatically
//! once they reach the configured max age. Observers are notified when
//! entries are added, accessed, rejected as duplicates, deleted or expired.

pub mod cache;
pub mod config;
pub mod error;
mod tasks;

pub use cache::{CacheBuilder, CacheEntry, CacheKey, CacheStore, TimeUnit};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
