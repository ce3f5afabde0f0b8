//! Cache Events Module
//!
//! Payloads delivered to lifecycle observers and the observer set itself.

use std::fmt;
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheKey};

// == Event Payloads ==
/// Event fired for lifecycle transitions of an entry.
#[derive(Debug, Clone)]
pub struct EntryEvent<T> {
    /// The key the event concerns
    pub field: CacheKey,
    /// Snapshot of the entry, `None` when accessing a missing key
    pub data: Option<CacheEntry<T>>,
    /// Name of the cache at the time of the event
    pub cache_name: String,
    /// Entry age in whole seconds, `-1` when the key is absent
    pub age_seconds: i64,
}

/// Event fired when an operation finds no entry for its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEvent {
    pub field: CacheKey,
    pub cache_name: String,
    pub age_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChangedEvent {
    pub old_name: String,
    pub new_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxAgeChangedEvent {
    pub cache_name: String,
    pub old_max_age_seconds: u64,
    pub new_max_age_seconds: u64,
}

// == Callback Types ==
pub type EntryCallback<T> = Arc<dyn Fn(&EntryEvent<T>) + Send + Sync>;
pub type MissingCallback = Arc<dyn Fn(&MissingEvent) + Send + Sync>;
pub type NameChangedCallback = Arc<dyn Fn(&NameChangedEvent) + Send + Sync>;
pub type MaxAgeChangedCallback = Arc<dyn Fn(&MaxAgeChangedEvent) + Send + Sync>;

// == Observers ==
/// Optional callbacks invoked synchronously at lifecycle events.
pub struct CacheObservers<T> {
    pub on_add: Option<EntryCallback<T>>,
    pub on_accessed: Option<EntryCallback<T>>,
    pub on_already_exists: Option<EntryCallback<T>>,
    pub on_does_not_exist: Option<MissingCallback>,
    pub on_delete: Option<EntryCallback<T>>,
    pub on_expired: Option<EntryCallback<T>>,
    pub on_name_changed: Option<NameChangedCallback>,
    pub on_max_age_changed: Option<MaxAgeChangedCallback>,
}

impl<T> Default for CacheObservers<T> {
    fn default() -> Self {
        Self {
            on_add: None,
            on_accessed: None,
            on_already_exists: None,
            on_does_not_exist: None,
            on_delete: None,
            on_expired: None,
            on_name_changed: None,
            on_max_age_changed: None,
        }
    }
}

impl<T> fmt::Debug for CacheObservers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheObservers")
            .field("on_add", &self.on_add.is_some())
            .field("on_accessed", &self.on_accessed.is_some())
            .field("on_already_exists", &self.on_already_exists.is_some())
            .field("on_does_not_exist", &self.on_does_not_exist.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .field("on_expired", &self.on_expired.is_some())
            .field("on_name_changed", &self.on_name_changed.is_some())
            .field("on_max_age_changed", &self.on_max_age_changed.is_some())
            .finish()
    }
}

// == Notification ==
/// A notification routed to the matching observer.
#[derive(Debug)]
pub(crate) enum Notification<T> {
    Added(EntryEvent<T>),
    Accessed(EntryEvent<T>),
    AlreadyExists(EntryEvent<T>),
    DoesNotExist(MissingEvent),
    Deleted(EntryEvent<T>),
    Expired(EntryEvent<T>),
    NameChanged(NameChangedEvent),
    MaxAgeChanged(MaxAgeChangedEvent),
}

impl<T> CacheObservers<T> {
    /// Delivers a notification to its observer, if one is configured.
    pub(crate) fn notify(&self, notification: &Notification<T>) {
        match notification {
            Notification::Added(event) => fire(&self.on_add, event),
            Notification::Accessed(event) => fire(&self.on_accessed, event),
            Notification::AlreadyExists(event) => fire(&self.on_already_exists, event),
            Notification::DoesNotExist(event) => fire(&self.on_does_not_exist, event),
            Notification::Deleted(event) => fire(&self.on_delete, event),
            Notification::Expired(event) => fire(&self.on_expired, event),
            Notification::NameChanged(event) => fire(&self.on_name_changed, event),
            Notification::MaxAgeChanged(event) => fire(&self.on_max_age_changed, event),
        }
    }
}

fn fire<E: ?Sized>(callback: &Option<Arc<dyn Fn(&E) + Send + Sync>>, event: &E) {
    if let Some(callback) = callback {
        callback(event);
    }
}
