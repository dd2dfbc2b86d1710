use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::*;

fn counting_fetcher(
    calls: &Arc<AtomicUsize>,
    value: i64,
) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<i64, ApiError>> + Send>> {
    let calls = calls.clone();
    move || {
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(value)
        })
    }
}

// =============================================================================
// FRESHNESS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn fresh_entry_is_served_without_fetching() {
    let cache = QueryCache::new(Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(cache.fetch("n", counting_fetcher(&calls, 1)).await.unwrap(), 1);
    assert_eq!(cache.fetch("n", counting_fetcher(&calls, 2)).await.unwrap(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_entry_is_refetched() {
    let cache = QueryCache::new(Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));

    cache.fetch("n", counting_fetcher(&calls, 1)).await.unwrap();
    tokio::time::advance(Duration::from_secs(31)).await;
    assert!(!cache.is_fresh("n"));
    assert_eq!(cache.fetch("n", counting_fetcher(&calls, 2)).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalidate_keeps_data_readable_but_forces_refetch() {
    let cache = QueryCache::default();
    cache.set("courses:list:a", &json!(["rust"]));
    cache.set("courses:list:b", &json!(["go"]));
    cache.set("categories", &json!([]));

    cache.invalidate_prefix("courses:");

    assert!(!cache.is_fresh("courses:list:a"));
    assert!(!cache.is_fresh("courses:list:b"));
    assert!(cache.is_fresh("categories"));
    assert_eq!(cache.get::<Vec<String>>("courses:list:a"), Some(vec!["rust".to_owned()]));
}

#[tokio::test]
async fn errors_are_not_cached() {
    let cache = QueryCache::default();
    let err = cache
        .fetch::<i64, _, _>("n", || async { Err(ApiError::Network("down".into())) })
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Network("down".into()));
    assert_eq!(cache.get::<i64>("n"), None);
}

// =============================================================================
// DEDUPLICATION
// =============================================================================

#[tokio::test]
async fn concurrent_fetches_share_one_call() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
        cache.fetch("n", counting_fetcher(&calls, 7)),
        cache.fetch("n", counting_fetcher(&calls, 8)),
    );

    assert_eq!(a.unwrap(), 7);
    assert_eq!(b.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// PATCHING
// =============================================================================

#[test]
fn update_patches_typed_value() {
    let cache = QueryCache::default();
    cache.set("ids", &vec![1, 2]);

    assert!(cache.update::<Vec<i32>, _>("ids", |ids| ids.push(3)));
    assert_eq!(cache.get::<Vec<i32>>("ids"), Some(vec![1, 2, 3]));
    assert!(!cache.update::<Vec<i32>, _>("missing", |ids| ids.clear()));
}

#[test]
fn clear_drops_everything() {
    let cache = QueryCache::default();
    cache.set("a", &1);
    cache.clear();
    assert_eq!(cache.get::<i32>("a"), None);
}

// =============================================================================
// CLEARING
// =============================================================================

#[tokio::test]
async fn fetch_in_flight_across_clear_does_not_repopulate() {
    let cache = QueryCache::default();
    let gate = tokio::sync::Notify::new();

    let (fetched, ()) = tokio::join!(
        cache.fetch("enrollments:me", || async {
            gate.notified().await;
            Ok(json!(["previous user's enrollment"]))
        }),
        async {
            tokio::task::yield_now().await;
            cache.clear();
            gate.notify_one();
        },
    );

    assert_eq!(fetched.unwrap(), json!(["previous user's enrollment"]));
    assert_eq!(cache.get::<serde_json::Value>("enrollments:me"), None);

    // Fetches started after the clear are cached as usual.
    cache.fetch("enrollments:me", || async { Ok(json!(["next user"])) }).await.unwrap();
    assert!(cache.is_fresh("enrollments:me"));
}

#[tokio::test]
async fn fetch_locks_are_released_after_each_key() {
    let cache = QueryCache::default();
    let calls = Arc::new(AtomicUsize::new(0));

    for page in 0..100 {
        let key = format!("courses:list:search=&category=&page={page}");
        cache.fetch(&key, counting_fetcher(&calls, page)).await.unwrap();
    }
    assert_eq!(cache.fetch_lock_count(), 0);

    let (a, b) = tokio::join!(
        cache.fetch("n", counting_fetcher(&calls, 1)),
        cache.fetch("n", counting_fetcher(&calls, 2)),
    );
    assert_eq!((a.unwrap(), b.unwrap()), (1, 1));
    assert_eq!(cache.fetch_lock_count(), 0);

    cache.clear();
    assert_eq!(cache.fetch_lock_count(), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 101);
}
