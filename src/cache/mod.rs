//! Cache Module
//!
//! Provides the in-process cache with per-entry TTL expiration and
//! lifecycle observers.

mod builder;
mod entry;
mod events;
mod key;
mod stats;
mod store;


// Re-export public types
pub use builder::CacheBuilder;
pub use entry::{current_timestamp_ms, CacheEntry, TimeUnit};
pub use events::{
    CacheObservers, EntryCallback, EntryEvent, MaxAgeChangedCallback, MaxAgeChangedEvent,
    MissingCallback, MissingEvent, NameChangedCallback, NameChangedEvent,
};
pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::{CacheStore, NO_ENTRY_AGE};

pub(crate) use store::{ExpiryOutcome, WeakCacheStore};
