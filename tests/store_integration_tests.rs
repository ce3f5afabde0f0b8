//! Integration Tests for the Cache Store
//!
//! Exercises the public API end to end: construction, CRUD operations,
//! timed expiration and observer delivery.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quicache::cache::{EntryEvent, MissingEvent};
use quicache::{CacheConfig, CacheError, CacheStore};
use serde_json::{json, Value};

// == Helper Functions ==

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quicache=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn create_test_cache() -> CacheStore<Value> {
    init_tracing();
    CacheStore::builder()
        .max_age_seconds(120)
        .name("cacheTest")
        .show_debug_messages(true)
        .build()
        .unwrap()
}

// == Basic Operations ==

#[tokio::test(start_paused = true)]
async fn test_set_returns_timestamp_and_data() {
    let cache = create_test_cache();

    let entry = cache.set("test", json!({ "aString": "aString" }));
    let rendered = serde_json::to_value(&entry).unwrap();

    assert!(rendered.get("timestamp").is_some());
    assert_eq!(rendered["data"], json!({ "aString": "aString" }));
}

#[tokio::test(start_paused = true)]
async fn test_exists_age_and_get() {
    let cache = create_test_cache();
    cache.set("test", json!({ "aString": "aString" }));

    assert!(!cache.exists("test_noexist"));
    assert!(cache.exists("test"));

    let age = cache.age("test");
    assert!((0..5).contains(&age));

    let entry = cache.get("test").unwrap();
    assert_eq!(entry.value(), &json!({ "aString": "aString" }));
}

#[tokio::test(start_paused = true)]
async fn test_numeric_and_nan_keys() {
    let cache = create_test_cache();
    let value = json!({ "aString": "aString" });

    cache.set("test", value.clone());
    cache.set(123456, value.clone());
    cache.set(f64::NAN, value.clone());
    cache.set(123500999, value.clone());

    let all = cache.get_all();
    assert_eq!(all.len(), 4);
    assert!(all.contains_key("test"));
    assert!(all.contains_key("123456"));
    assert!(all.contains_key("NaN"));
    assert!(all.contains_key("123500999"));
}

#[tokio::test(start_paused = true)]
async fn test_from_config() {
    init_tracing();
    let config = CacheConfig::default().with_max_age(30).with_name("configured");

    let cache: CacheStore<String> = CacheStore::from_config(config).unwrap();

    assert_eq!(cache.name(), "configured");
    assert_eq!(cache.max_age_seconds(), 30);
}

#[tokio::test]
async fn test_zero_max_age_is_rejected() {
    let result: Result<CacheStore<String>, CacheError> = CacheStore::new(0, "invalid");
    assert!(matches!(result, Err(CacheError::InvalidMaxAge(0))));
}

// == Expiration ==

#[tokio::test(start_paused = true)]
async fn test_expired_observer_fires_once() {
    init_tracing();
    let expired: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = expired.clone();

    let cache = CacheStore::builder()
        .max_age_seconds(3)
        .name("ttl")
        .on_expired(move |e: &EntryEvent<u32>| {
            sink.lock()
                .unwrap()
                .push((e.field.to_string(), e.cache_name.clone()))
        })
        .build()
        .unwrap();

    cache.set("session", 42);
    tokio::time::sleep(Duration::from_millis(3_100)).await;

    assert!(!cache.exists("session"));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        *expired.lock().unwrap(),
        vec![("session".to_string(), "ttl".to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_races_ahead_of_expiration() {
    init_tracing();
    let expired = Arc::new(Mutex::new(0_u32));
    let missing = Arc::new(Mutex::new(Vec::new()));
    let (expired_sink, missing_sink) = (expired.clone(), missing.clone());

    let cache = CacheStore::builder()
        .max_age_seconds(2)
        .name("race")
        .on_expired(move |_: &EntryEvent<u32>| *expired_sink.lock().unwrap() += 1)
        .on_does_not_exist(move |e: &MissingEvent| {
            missing_sink.lock().unwrap().push(e.field.to_string())
        })
        .build()
        .unwrap();

    cache.set("k", 1);
    let removed = cache.delete("k").unwrap();
    assert_eq!(removed.into_value(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(*expired.lock().unwrap(), 0);
    // Once before the insert, once when the stale timer fired
    assert_eq!(*missing.lock().unwrap(), vec!["k", "k"]);
}

#[tokio::test(start_paused = true)]
async fn test_max_age_change_applies_to_new_entries_only() {
    let cache = create_test_cache();
    cache.set("before", json!(1));

    cache.set_max_age(10).unwrap();
    assert_eq!(cache.max_age_seconds(), 10);
    cache.set("after", json!(2));

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert!(!cache.exists("after"));
    assert!(cache.exists("before"));
    assert!(cache.has_expired("before"));

    tokio::time::sleep(Duration::from_secs(110)).await;
    assert!(!cache.exists("before"));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_expiration_in_real_time() {
    init_tracing();
    let cache = CacheStore::new(1, "real_time").unwrap();
    cache.set("k", "v".to_string());

    tokio::time::sleep(Duration::from_millis(1_200)).await;

    assert!(!cache.exists("k"));
    assert_eq!(cache.age("k"), -1);
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_single_winner() {
    init_tracing();
    let added = Arc::new(Mutex::new(0_u32));
    let sink = added.clone();
    let cache = CacheStore::builder()
        .max_age_seconds(60)
        .name("concurrent")
        .on_add(move |_: &EntryEvent<usize>| *sink.lock().unwrap() += 1)
        .build()
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.set("shared", i).into_value() })
        })
        .collect();

    let mut winners = Vec::new();
    for handle in handles {
        winners.push(handle.await.unwrap());
    }

    let stored = cache.get("shared").unwrap().into_value();
    assert!(winners.iter().all(|w| *w == stored));
    assert_eq!(*added.lock().unwrap(), 1);
    assert_eq!(cache.stats().duplicate_sets, 15);
}

// == Size ==

#[tokio::test(start_paused = true)]
async fn test_size_grows_with_entries() {
    let cache = create_test_cache();
    let empty = cache.size().unwrap();

    cache.set("a", json!({ "aString": "aString" }));
    let one = cache.size().unwrap();
    cache.set("b", json!([1, 2, 3]));
    let two = cache.size().unwrap();

    assert!(empty < one && one < two);
    assert!(cache.entry_size("a").unwrap().unwrap() < one);
}
