//! Cache Builder Module
//!
//! Collects configuration, observers and the runtime used for expiration
//! timers before constructing a `CacheStore`.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::cache::{
    CacheObservers, CacheStore, EntryEvent, MaxAgeChangedEvent, MissingEvent, NameChangedEvent,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

// == Cache Builder ==
/// Builder for `CacheStore`.
///
/// # Example
/// ```ignore
/// let cache = CacheStore::builder()
///     .max_age_seconds(120)
///     .name("sessions")
///     .on_expired(|event| println!("{} expired", event.field))
///     .build()?;
/// ```
#[derive(Debug)]
pub struct CacheBuilder<T> {
    config: CacheConfig,
    observers: CacheObservers<T>,
    runtime: Option<Handle>,
}

impl<T> Default for CacheBuilder<T> {
    fn default() -> Self {
        Self {
            config: CacheConfig::default(),
            observers: CacheObservers::default(),
            runtime: None,
        }
    }
}

impl<T> CacheBuilder<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration, keeping observers and runtime.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_age_seconds(mut self, seconds: u64) -> Self {
        self.config.max_age_seconds = Some(seconds);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn show_debug_messages(mut self, enabled: bool) -> Self {
        self.config.show_debug_messages = enabled;
        self
    }

    /// Runtime on which expiration timers are spawned.
    ///
    /// Defaults to the runtime `build` is called from.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    // == Observers ==
    /// Replaces every observer at once.
    pub fn observers(mut self, observers: CacheObservers<T>) -> Self {
        self.observers = observers;
        self
    }

    pub fn on_add(mut self, f: impl Fn(&EntryEvent<T>) + Send + Sync + 'static) -> Self {
        self.observers.on_add = Some(Arc::new(f));
        self
    }

    /// Fires on every `get`, including misses.
    pub fn on_accessed(mut self, f: impl Fn(&EntryEvent<T>) + Send + Sync + 'static) -> Self {
        self.observers.on_accessed = Some(Arc::new(f));
        self
    }

    pub fn on_already_exists(
        mut self,
        f: impl Fn(&EntryEvent<T>) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_already_exists = Some(Arc::new(f));
        self
    }

    /// Fires when `set` is about to insert, when `delete` finds nothing, and
    /// when an expiration finds its key already removed.
    pub fn on_does_not_exist(mut self, f: impl Fn(&MissingEvent) + Send + Sync + 'static) -> Self {
        self.observers.on_does_not_exist = Some(Arc::new(f));
        self
    }

    /// Fires on explicit deletion only, never on expiration.
    pub fn on_delete(mut self, f: impl Fn(&EntryEvent<T>) + Send + Sync + 'static) -> Self {
        self.observers.on_delete = Some(Arc::new(f));
        self
    }

    pub fn on_expired(mut self, f: impl Fn(&EntryEvent<T>) + Send + Sync + 'static) -> Self {
        self.observers.on_expired = Some(Arc::new(f));
        self
    }

    pub fn on_name_changed(
        mut self,
        f: impl Fn(&NameChangedEvent) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_name_changed = Some(Arc::new(f));
        self
    }

    pub fn on_max_age_changed(
        mut self,
        f: impl Fn(&MaxAgeChangedEvent) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_max_age_changed = Some(Arc::new(f));
        self
    }

    // == Build ==
    /// Validates the configuration and creates the store.
    ///
    /// Fails if the max age is zero, or if no runtime was supplied and the
    /// caller is not inside a tokio runtime.
    pub fn build(self) -> Result<CacheStore<T>> {
        let config = self.config.resolve()?;
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| CacheError::NoRuntime)?,
        };
        Ok(CacheStore::from_parts(config, self.observers, runtime))
    }
}
