//! Cache Store Module
//!
//! Main cache engine: a keyed map of entries, each removed by its own
//! deferred expiration task once the configured max age has elapsed.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::cache::events::Notification;
use crate::cache::{
    CacheBuilder, CacheEntry, CacheKey, CacheObservers, CacheStats, EntryEvent,
    MaxAgeChangedEvent, MissingEvent, NameChangedEvent, TimeUnit,
};
use crate::config::{CacheConfig, ResolvedConfig};
use crate::error::{CacheError, Result};
use crate::tasks::spawn_expiry_task;

/// Age reported for keys that hold no entry.
pub const NO_ENTRY_AGE: i64 = -1;

// == Internal State ==
/// An entry plus the generation id its expiration task was scheduled for.
#[derive(Debug)]
struct Slot<T> {
    id: u64,
    entry: CacheEntry<T>,
}

#[derive(Debug)]
struct State<T> {
    entries: HashMap<CacheKey, Slot<T>>,
    name: String,
    max_age_seconds: u64,
    show_debug_messages: bool,
    stats: CacheStats,
    next_id: u64,
}

impl<T> State<T> {
    fn missing_event(&self, key: &CacheKey) -> MissingEvent {
        MissingEvent {
            field: key.clone(),
            cache_name: self.name.clone(),
            age_seconds: NO_ENTRY_AGE,
        }
    }

    /// Strictly older than the current max age.
    fn is_stale(&self, entry: &CacheEntry<T>) -> bool {
        entry.age_seconds() > self.max_age_seconds
    }

    fn slot_id(&self, key: &CacheKey) -> Option<u64> {
        self.entries.get(key).map(|slot| slot.id)
    }

    fn refresh_total(&mut self) {
        let total = self.entries.len();
        self.stats.set_total_entries(total);
    }
}

impl<T: Clone> State<T> {
    fn entry_event(&self, key: &CacheKey, entry: Option<&CacheEntry<T>>) -> EntryEvent<T> {
        EntryEvent {
            field: key.clone(),
            data: entry.cloned(),
            cache_name: self.name.clone(),
            age_seconds: entry.map_or(NO_ENTRY_AGE, |e| e.age_seconds() as i64),
        }
    }

    fn current(&self, key: &CacheKey) -> Option<CacheEntry<T>> {
        self.entries.get(key).map(|slot| slot.entry.clone())
    }
}

/// The lock is reentrant so observers, which run while it is held, can call
/// back into the store. The `RefCell` is never borrowed across a callback.
type Shared<T> = ReentrantMutex<RefCell<State<T>>>;
type Guard<'a, T> = ReentrantMutexGuard<'a, RefCell<State<T>>>;

struct Inner<T> {
    state: Shared<T>,
    observers: CacheObservers<T>,
    runtime: Handle,
}

/// Result of a deferred expiration firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExpiryOutcome {
    /// The entry was removed and the expired observer notified
    Expired,
    /// The key held no entry any more
    AlreadyRemoved,
    /// The key holds a newer entry with its own expiration pending
    Superseded,
}

// == Cache Store ==
/// In-process key/value cache with per-entry TTL expiration.
///
/// `CacheStore` is a handle: clones share the same entries. Each operation
/// holds the store lock from its existence check to its last observer, so
/// operations on one store never interleave. Observers run on the calling
/// thread at the point the operation reaches them and may call back into
/// the store.
pub struct CacheStore<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for CacheStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for CacheStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.state.lock();
        let state = guard.borrow();
        f.debug_struct("CacheStore")
            .field("name", &state.name)
            .field("max_age_seconds", &state.max_age_seconds)
            .field("entries", &state.entries.len())
            .field("observers", &self.inner.observers)
            .finish()
    }
}

/// Non-owning handle held by pending expiration tasks.
pub(crate) struct WeakCacheStore<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakCacheStore<T> {
    pub(crate) fn upgrade(&self) -> Option<CacheStore<T>> {
        self.inner.upgrade().map(|inner| CacheStore { inner })
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Returns a builder for configuring name, max age and observers.
    pub fn builder() -> CacheBuilder<T> {
        CacheBuilder::new()
    }

    /// Creates a store with the given max age and name and no observers.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(max_age_seconds: u64, name: impl Into<String>) -> Result<Self> {
        Self::builder()
            .max_age_seconds(max_age_seconds)
            .name(name)
            .build()
    }

    /// Creates a store from a configuration with no observers.
    pub fn from_config(config: CacheConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub(crate) fn from_parts(
        config: ResolvedConfig,
        observers: CacheObservers<T>,
        runtime: Handle,
    ) -> Self {
        info!(
            "Cache '{}' initialized: max_age={}s, debug={}",
            config.name, config.max_age_seconds, config.show_debug_messages
        );

        let state = State {
            entries: HashMap::new(),
            name: config.name,
            max_age_seconds: config.max_age_seconds,
            show_debug_messages: config.show_debug_messages,
            stats: CacheStats::new(),
            next_id: 0,
        };

        Self {
            inner: Arc::new(Inner {
                state: ReentrantMutex::new(RefCell::new(state)),
                observers,
                runtime,
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakCacheStore<T> {
        WeakCacheStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> Guard<'_, T> {
        self.inner.state.lock()
    }

    /// Runs `f` against the state under a short-lived shared borrow.
    fn read<R>(&self, f: impl FnOnce(&State<T>) -> R) -> R {
        let guard = self.lock();
        let state = guard.borrow();
        f(&state)
    }

    fn notify(&self, notification: Notification<T>) {
        self.inner.observers.notify(&notification);
    }

    // == Exists ==
    /// Returns true if an entry is currently stored under `key`.
    pub fn exists(&self, key: impl Into<CacheKey>) -> bool {
        let key = key.into();
        self.read(|state| {
            let found = state.entries.contains_key(&key);
            if state.show_debug_messages {
                debug!("Call to exists for '{}': {}", key, found);
            }
            found
        })
    }

    // == Get ==
    /// Retrieves the entry stored under `key`.
    ///
    /// The accessed observer fires on hits and misses alike; on a miss its
    /// event carries no data and an age of -1.
    pub fn get(&self, key: impl Into<CacheKey>) -> Option<CacheEntry<T>> {
        let key = key.into();
        let guard = self.lock();
        let (found, event) = {
            let mut state = guard.borrow_mut();
            let found = state.current(&key);
            match found {
                Some(_) => state.stats.record_hit(),
                None => state.stats.record_miss(),
            }
            if state.show_debug_messages {
                debug!("Call to get for '{}': hit={}", key, found.is_some());
            }
            let event = state.entry_event(&key, found.as_ref());
            (found, event)
        };

        self.notify(Notification::Accessed(event));
        found
    }

    // == Set ==
    /// Stores `value` under `key` unless the key already holds an entry.
    ///
    /// The first writer wins: an existing entry is never overwritten and is
    /// returned unchanged. For a new key the does-not-exist observer fires
    /// before the insert and the add observer after it. A new entry is
    /// scheduled to expire once the max age in effect now has elapsed.
    pub fn set(&self, key: impl Into<CacheKey>, value: T) -> CacheEntry<T> {
        let key = key.into();
        let guard = self.lock();

        if let Some(existing) = self.reject_duplicate(&guard, &key) {
            return existing;
        }

        let missing = guard.borrow().missing_event(&key);
        self.notify(Notification::DoesNotExist(missing));

        // The observer may have stored the key itself
        if let Some(existing) = self.reject_duplicate(&guard, &key) {
            return existing;
        }

        let (entry, id, max_age_seconds, added) = {
            let mut state = guard.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            let entry = CacheEntry::new(value);
            state.entries.insert(
                key.clone(),
                Slot {
                    id,
                    entry: entry.clone(),
                },
            );
            state.stats.record_addition();
            state.refresh_total();

            if state.show_debug_messages {
                debug!(
                    "Call to set for '{}': stored, expires in {}s",
                    key, state.max_age_seconds
                );
            }
            let added = state.entry_event(&key, Some(&entry));
            (entry, id, state.max_age_seconds, added)
        };

        self.notify(Notification::Added(added));
        spawn_expiry_task(
            &self.inner.runtime,
            self.downgrade(),
            key,
            id,
            Duration::from_secs(max_age_seconds),
        );
        entry
    }

    /// Returns the entry already under `key`, after notifying the
    /// already-exists observer, or `None` if the key is vacant.
    fn reject_duplicate(&self, guard: &Guard<'_, T>, key: &CacheKey) -> Option<CacheEntry<T>> {
        let (existing, event) = {
            let mut state = guard.borrow_mut();
            let existing = state.current(key)?;
            state.stats.record_duplicate_set();
            if state.show_debug_messages {
                debug!("Call to set for '{}': entry already exists", key);
            }
            let event = state.entry_event(key, Some(&existing));
            (existing, event)
        };

        self.notify(Notification::AlreadyExists(event));
        Some(existing)
    }

    // == Delete ==
    /// Removes and returns the entry stored under `key`.
    ///
    /// The delete observer fires before the entry is removed. A pending
    /// expiration for the removed entry is not cancelled; when it fires it
    /// finds the key absent and does nothing beyond notifying the
    /// does-not-exist observer.
    pub fn delete(&self, key: impl Into<CacheKey>) -> Option<CacheEntry<T>> {
        let key = key.into();
        let guard = self.lock();

        let found = {
            let state = guard.borrow();
            if state.show_debug_messages {
                debug!("Call to delete for '{}'", key);
            }
            match state.entries.get(&key) {
                Some(slot) => Ok((slot.id, state.entry_event(&key, Some(&slot.entry)))),
                None => Err(state.missing_event(&key)),
            }
        };

        match found {
            Ok((id, event)) => {
                let snapshot = event.data.clone();
                self.notify(Notification::Deleted(event));
                let removed = self.remove_generation(&guard, &key, id, false);
                removed.or(snapshot)
            }
            Err(missing) => {
                self.notify(Notification::DoesNotExist(missing));
                None
            }
        }
    }

    /// Removes the entry under `key` if it is still generation `id`.
    fn remove_generation(
        &self,
        guard: &Guard<'_, T>,
        key: &CacheKey,
        id: u64,
        expired: bool,
    ) -> Option<CacheEntry<T>> {
        let mut state = guard.borrow_mut();
        if state.slot_id(key) != Some(id) {
            return None;
        }
        let slot = state.entries.remove(key)?;
        if expired {
            state.stats.record_expiration();
        } else {
            state.stats.record_deletion();
        }
        state.refresh_total();
        Some(slot.entry)
    }

    // == Expire ==
    /// Runs the deferred expiration for the entry generation `id` under `key`.
    ///
    /// The expired observer fires before the entry is removed.
    pub(crate) fn expire_entry(&self, key: &CacheKey, id: u64) -> ExpiryOutcome {
        let guard = self.lock();

        let (outcome, notification) = {
            let state = guard.borrow();
            match state.slot_id(key) {
                None => (
                    ExpiryOutcome::AlreadyRemoved,
                    Some(Notification::DoesNotExist(state.missing_event(key))),
                ),
                Some(current) if current != id => (ExpiryOutcome::Superseded, None),
                Some(_) => {
                    let event = state.entry_event(key, state.current(key).as_ref());
                    (ExpiryOutcome::Expired, Some(Notification::Expired(event)))
                }
            }
        };

        if guard.borrow().show_debug_messages {
            debug!("Expiration fired for '{}': {:?}", key, outcome);
        }
        if let Some(notification) = notification {
            self.notify(notification);
        }
        if outcome == ExpiryOutcome::Expired {
            self.remove_generation(&guard, key, id, true);
        }
        outcome
    }

    // == Age ==
    /// Age of the entry under `key` in whole seconds, or -1 if absent.
    pub fn age(&self, key: impl Into<CacheKey>) -> i64 {
        self.age_in(key, TimeUnit::Seconds)
    }

    /// Age of the entry under `key` in whole `unit`s, or -1 if absent.
    pub fn age_in(&self, key: impl Into<CacheKey>, unit: TimeUnit) -> i64 {
        let key = key.into();
        self.read(|state| {
            if state.show_debug_messages {
                debug!("Call to age for '{}' in {}", key, unit);
            }
            state
                .entries
                .get(&key)
                .map_or(NO_ENTRY_AGE, |slot| slot.entry.age_in(unit) as i64)
        })
    }

    // == Staleness ==
    /// True if the entry under `key` is strictly older than the current max age.
    ///
    /// Only possible after the max age was lowered: entries keep the expiration
    /// scheduled when they were inserted.
    pub fn has_expired(&self, key: impl Into<CacheKey>) -> bool {
        let key = key.into();
        self.read(|state| {
            state
                .entries
                .get(&key)
                .is_some_and(|slot| state.is_stale(&slot.entry))
        })
    }

    /// True if an entry exists under `key` and has not outlived the current max age.
    pub fn is_valid(&self, key: impl Into<CacheKey>) -> bool {
        let key = key.into();
        self.read(|state| {
            state
                .entries
                .get(&key)
                .is_some_and(|slot| !state.is_stale(&slot.entry))
        })
    }

    /// Snapshot of entries that have not outlived the current max age.
    pub fn non_expired(&self) -> HashMap<CacheKey, CacheEntry<T>> {
        self.snapshot(false)
    }

    /// Snapshot of entries that have outlived the current max age but whose
    /// own expiration has not fired yet.
    pub fn expired(&self) -> HashMap<CacheKey, CacheEntry<T>> {
        self.snapshot(true)
    }

    fn snapshot(&self, stale: bool) -> HashMap<CacheKey, CacheEntry<T>> {
        self.read(|state| {
            state
                .entries
                .iter()
                .filter(|(_, slot)| state.is_stale(&slot.entry) == stale)
                .map(|(key, slot)| (key.clone(), slot.entry.clone()))
                .collect()
        })
    }

    // == Get All ==
    /// Snapshot of every stored entry.
    pub fn get_all(&self) -> HashMap<CacheKey, CacheEntry<T>> {
        self.read(|state| {
            state
                .entries
                .iter()
                .map(|(key, slot)| (key.clone(), slot.entry.clone()))
                .collect()
        })
    }

    pub fn len(&self) -> usize {
        self.read(|state| state.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|state| state.entries.is_empty())
    }

    // == Name ==
    pub fn name(&self) -> String {
        self.read(|state| state.name.clone())
    }

    /// Renames the cache. The observer sees the old name still in place;
    /// later events carry the new name.
    pub fn set_name(&self, name: impl Into<String>) {
        let new_name = name.into();
        let guard = self.lock();
        let old_name = guard.borrow().name.clone();

        info!("Cache '{}' renamed to '{}'", old_name, new_name);
        self.notify(Notification::NameChanged(NameChangedEvent {
            old_name,
            new_name: new_name.clone(),
        }));
        guard.borrow_mut().name = new_name;
    }

    // == Max Age ==
    pub fn max_age_seconds(&self) -> u64 {
        self.read(|state| state.max_age_seconds)
    }

    /// Changes the max age applied to entries inserted from now on.
    ///
    /// The observer fires before the new value takes effect. Expirations
    /// already scheduled keep the max age they were scheduled with.
    pub fn set_max_age(&self, max_age_seconds: u64) -> Result<()> {
        if max_age_seconds < 1 {
            return Err(CacheError::InvalidMaxAge(max_age_seconds));
        }

        let guard = self.lock();
        let event = {
            let state = guard.borrow();
            MaxAgeChangedEvent {
                cache_name: state.name.clone(),
                old_max_age_seconds: state.max_age_seconds,
                new_max_age_seconds: max_age_seconds,
            }
        };
        info!(
            "Cache '{}' max age changed from {}s to {}s",
            event.cache_name, event.old_max_age_seconds, event.new_max_age_seconds
        );
        self.notify(Notification::MaxAgeChanged(event));
        guard.borrow_mut().max_age_seconds = max_age_seconds;
        Ok(())
    }

    // == Debug Logs ==
    pub fn enable_debug_logs(&self) {
        self.lock().borrow_mut().show_debug_messages = true;
        debug!("Debug logs are now enabled");
    }

    pub fn disable_debug_logs(&self) {
        self.lock().borrow_mut().show_debug_messages = false;
        debug!("Debug logs are now disabled");
    }

    pub fn debug_logs_enabled(&self) -> bool {
        self.read(|state| state.show_debug_messages)
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.read(|state| {
            let mut stats = state.stats.clone();
            stats.set_total_entries(state.entries.len());
            stats
        })
    }
}

impl<T> CacheStore<T>
where
    T: Clone + Send + Sync + Serialize + 'static,
{
    // == Size ==
    /// Byte length of the JSON serialization of the whole store.
    ///
    /// Entries are serialized in key order. This is a footprint estimate,
    /// not a capacity bound.
    pub fn size(&self) -> Result<usize> {
        self.read(|state| -> Result<usize> {
            let ordered: BTreeMap<&CacheKey, &CacheEntry<T>> = state
                .entries
                .iter()
                .map(|(key, slot)| (key, &slot.entry))
                .collect();
            Ok(serde_json::to_string(&ordered)?.len())
        })
    }

    /// Byte length of the JSON serialization of one entry, `None` if absent.
    pub fn entry_size(&self, key: impl Into<CacheKey>) -> Result<Option<usize>> {
        let key = key.into();
        self.read(|state| {
            state
                .entries
                .get(&key)
                .map(|slot| serde_json::to_string(&slot.entry).map(|json| json.len()))
                .transpose()
                .map_err(CacheError::from)
        })
    }
}
