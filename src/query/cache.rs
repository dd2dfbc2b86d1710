//! Request cache with stale-time revalidation.
//!
//! DESIGN
//! ======
//! Entries are stored as `serde_json::Value` keyed by string, so typed reads
//! and realtime patches share one representation. An entry is fresh for
//! `stale_time` after it was written; invalidation marks it stale without
//! dropping it, so `get` keeps serving the last known data while the next
//! `fetch` goes back to the network.
//!
//! CONCURRENCY
//! ===========
//! Entries sit behind a `std::sync::Mutex` that is never held across an
//! `.await`. Concurrent `fetch` calls for one key serialize on a per-key
//! `tokio::sync::Mutex`; the second caller re-checks freshness after taking
//! the lock and reuses the first caller's result. A key's lock is dropped as
//! soon as nobody is fetching it.
//!
//! `clear` bumps a generation counter. A fetch that started before the clear
//! still returns its data to its caller but does not write it back, so a
//! cleared cache stays empty of the previous session's results.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ApiError;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(30);

struct Entry {
    value: Value,
    written_at: Instant,
    invalidated: bool,
}

pub struct QueryCache {
    stale_time: Duration,
    entries: Mutex<HashMap<String, Entry>>,
    fetch_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    generation: AtomicU64,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIME)
    }
}

impl QueryCache {
    #[must_use]
    pub fn new(stale_time: Duration) -> Self {
        Self {
            stale_time,
            entries: Mutex::new(HashMap::new()),
            fetch_locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Cached data for `key` if it is fresh, otherwise the result of
    /// `fetcher`, which is then cached unless the cache was cleared while it
    /// ran. Errors are not cached.
    ///
    /// # Errors
    ///
    /// Whatever `fetcher` returns, or [`ApiError::Decode`] if the cached
    /// value no longer matches `T`.
    pub async fn fetch<T, F, Fut>(&self, key: &str, fetcher: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if let Some(value) = self.fresh(key) {
            return decode(value);
        }

        let slot = FetchSlot::acquire(self, key);
        let _guard = slot.lock.lock().await;
        if let Some(value) = self.fresh(key) {
            debug!(key, "query served by concurrent fetch");
            return decode(value);
        }

        debug!(key, "query fetch");
        let generation = self.generation.load(Ordering::SeqCst);
        let data = fetcher().await?;
        if !self.store(key, &data, Some(generation)) {
            debug!(key, "fetched result not stored");
        }
        Ok(data)
    }

    /// Cached data regardless of freshness.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock_entries().get(key).map(|e| e.value.clone())?;
        serde_json::from_value(value).ok()
    }

    pub fn set<T: Serialize>(&self, key: &str, data: &T) {
        self.store(key, data, None);
    }

    /// Patch cached data in place. Returns false when nothing usable is
    /// cached for `key`. Freshness is left unchanged.
    pub fn update<T, F>(&self, key: &str, patch: F) -> bool
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut entries = self.lock_entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        let Ok(mut data) = serde_json::from_value::<T>(entry.value.clone()) else {
            return false;
        };
        patch(&mut data);
        match serde_json::to_value(&data) {
            Ok(value) => {
                entry.value = value;
                true
            }
            Err(_) => false,
        }
    }

    pub fn invalidate(&self, key: &str) {
        if let Some(entry) = self.lock_entries().get_mut(key) {
            entry.invalidated = true;
        }
    }

    /// Mark every key starting with `prefix` stale.
    pub fn invalidate_prefix(&self, prefix: &str) {
        for (_, entry) in self.lock_entries().iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
            entry.invalidated = true;
        }
    }

    pub fn remove(&self, key: &str) {
        self.lock_entries().remove(key);
    }

    /// Drop everything, e.g. after the session ends.
    pub fn clear(&self) {
        let mut entries = self.lock_entries();
        self.generation.fetch_add(1, Ordering::SeqCst);
        entries.clear();
        drop(entries);
        self.lock_fetch_locks().clear();
    }

    #[must_use]
    pub fn is_fresh(&self, key: &str) -> bool {
        self.fresh(key).is_some()
    }

    /// Write `data` under `key`. With `generation` set, the write is skipped
    /// if the cache has been cleared since that generation was read.
    fn store<T: Serialize>(&self, key: &str, data: &T, generation: Option<u64>) -> bool {
        let Ok(value) = serde_json::to_value(data) else {
            return false;
        };
        let mut entries = self.lock_entries();
        if generation.is_some_and(|g| g != self.generation.load(Ordering::SeqCst)) {
            return false;
        }
        entries.insert(key.to_owned(), Entry { value, written_at: Instant::now(), invalidated: false });
        true
    }

    #[cfg(test)]
    fn fetch_lock_count(&self) -> usize {
        self.lock_fetch_locks().len()
    }

    fn fresh(&self, key: &str) -> Option<Value> {
        let entries = self.lock_entries();
        let entry = entries.get(key)?;
        let fresh = !entry.invalidated && entry.written_at.elapsed() < self.stale_time;
        fresh.then(|| entry.value.clone())
    }

    fn lock_fetch_locks(&self) -> MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.fetch_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller's share of a key's fetch lock. Dropping the last share removes
/// the lock from the map.
struct FetchSlot<'a> {
    cache: &'a QueryCache,
    key: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> FetchSlot<'a> {
    fn acquire(cache: &'a QueryCache, key: &'a str) -> Self {
        let lock = cache.lock_fetch_locks().entry(key.to_owned()).or_default().clone();
        Self { cache, key, lock }
    }
}

impl Drop for FetchSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.cache.lock_fetch_locks();
        // The map holds one reference and this slot the other.
        let idle = locks
            .get(self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(&self.lock) == 2);
        if idle {
            locks.remove(self.key);
        }
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
