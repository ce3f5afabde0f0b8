//! Entry Expiration Task
//!
//! Each successful insertion spawns one task that sleeps for the max age in
//! effect at insertion time, then removes the entry if it is still the one
//! the task was scheduled for.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{CacheKey, WeakCacheStore};

/// Spawns the deferred expiration for entry generation `id` under `key`.
///
/// The task holds only a weak reference to the store, so it never keeps a
/// dropped store alive. There is no cancellation: a deleted entry's task
/// still fires and finds the key absent.
///
/// # Returns
/// A JoinHandle for the spawned task.
pub(crate) fn spawn_expiry_task<T>(
    runtime: &Handle,
    store: WeakCacheStore<T>,
    key: CacheKey,
    id: u64,
    max_age: Duration,
) -> JoinHandle<()>
where
    T: Clone + Send + Sync + 'static,
{
    runtime.spawn(async move {
        tokio::time::sleep(max_age).await;

        match store.upgrade() {
            Some(store) => {
                store.expire_entry(&key, id);
            }
            None => debug!("Cache dropped before '{}' expired", key),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, ExpiryOutcome};

    #[tokio::test(start_paused = true)]
    async fn test_expiry_task_removes_entry() {
        let store = CacheStore::new(3600, "expiry").unwrap();
        store.set("expire_soon", "value".to_string());

        // Generation 0 is the first entry this store ever inserted
        let handle = spawn_expiry_task(
            &Handle::current(),
            store.downgrade(),
            CacheKey::from("expire_soon"),
            0,
            Duration::from_secs(1),
        );
        handle.await.unwrap();

        assert!(!store.exists("expire_soon"), "Entry should have been expired");
        assert_eq!(store.stats().expirations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_task_ignores_other_generation() {
        let store = CacheStore::new(3600, "expiry").unwrap();
        store.set("long_lived", "value".to_string());

        let handle = spawn_expiry_task(
            &Handle::current(),
            store.downgrade(),
            CacheKey::from("long_lived"),
            41,
            Duration::from_secs(1),
        );
        handle.await.unwrap();

        assert!(store.exists("long_lived"), "Newer entry should not be removed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_entry_outcomes() {
        let store = CacheStore::new(3600, "expiry").unwrap();
        let key = CacheKey::from("k");
        store.set(&key, 1_u8);

        assert_eq!(store.expire_entry(&key, 7), ExpiryOutcome::Superseded);
        assert_eq!(store.expire_entry(&key, 0), ExpiryOutcome::Expired);
        assert_eq!(store.expire_entry(&key, 0), ExpiryOutcome::AlreadyRemoved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_task_finishes_after_store_dropped() {
        let store: CacheStore<u8> = CacheStore::new(3600, "expiry").unwrap();
        let weak = store.downgrade();
        drop(store);

        let handle = spawn_expiry_task(
            &Handle::current(),
            weak,
            CacheKey::from("gone"),
            0,
            Duration::from_secs(1),
        );
        handle.await.unwrap();
    }
}
