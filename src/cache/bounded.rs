//! In-process bounded cache with singleflight `get_or_compute`.
//!
//! Grounded on `slide::registry::SlideRegistry::get_slide` (leader/follower
//! singleflight via `Mutex<HashMap<K, Arc<Notify>>>`) and
//! `tile::cache::TileCache` (byte-size tracked LRU eviction).

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};

use super::stats::CacheStats;

/// A value that can report an approximate byte weight for capacity
/// accounting. Values with no meaningful byte size (e.g. values counted
/// purely by entry count) can return a constant.
pub trait CacheWeight {
    fn cache_weight(&self) -> usize;
}

impl CacheWeight for bytes::Bytes {
    fn cache_weight(&self) -> usize {
        self.len()
    }
}

/// An in-process LRU cache bounded by total byte weight, with a
/// leader/follower singleflight `get_or_compute`: concurrent misses for the
/// same key share one computation instead of stampeding.
pub struct BoundedCache<K, V> {
    entries: RwLock<LruCache<K, V>>,
    current_weight: RwLock<usize>,
    max_weight: usize,
    in_flight: Mutex<HashMap<K, Arc<Notify>>>,
    stats: CacheStats,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + CacheWeight + Send + Sync + 'static,
{
    /// `max_weight` bounds total `cache_weight()` across all entries;
    /// `max_entries` additionally bounds raw LRU slot count (to cap
    /// per-entry bookkeeping overhead even when weights are tiny).
    pub fn new(max_weight: usize, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(
                NonZeroUsize::new(max_entries.max(1)).unwrap(),
            )),
            current_weight: RwLock::new(0),
            max_weight,
            in_flight: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        let hit = entries.get(key).cloned();
        if hit.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        hit
    }

    pub async fn put(&self, key: K, value: V) {
        let weight = value.cache_weight();
        let mut entries = self.entries.write().await;
        let mut current = self.current_weight.write().await;

        if let Some(old) = entries.peek(&key) {
            *current = current.saturating_sub(old.cache_weight());
        }
        entries.put(key, value);
        *current += weight;

        while *current > self.max_weight {
            match entries.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.cache_weight());
                    self.stats.record_eviction();
                }
                None => break,
            }
        }
    }

    pub async fn invalidate(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().await;
        let mut current = self.current_weight.write().await;
        if let Some(removed) = entries.pop(key) {
            *current = current.saturating_sub(removed.cache_weight());
            Some(removed)
        } else {
            None
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn weight(&self) -> usize {
        *self.current_weight.read().await
    }

    /// Return the cached value for `key`, or run `compute` to produce one.
    /// Concurrent callers for the same key that miss together block on the
    /// first caller's `compute` rather than each running it themselves.
    /// A `compute` that errors leaves no trace in the cache and unblocks
    /// waiters, who will retry `compute` themselves (mirrors
    /// `SlideRegistry::get_slide`'s error path: a failed leader does not
    /// poison the key for the next caller).
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<V, E>>,
    {
        loop {
            if let Some(value) = self.get(&key).await {
                return Ok(value);
            }

            let notify = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(notify) = in_flight.get(&key) {
                    let notify = notify.clone();
                    drop(in_flight);
                    notify.notified().await;
                    continue;
                }
                let notify = Arc::new(Notify::new());
                in_flight.insert(key.clone(), notify.clone());
                notify
            };

            let result = compute().await;

            if let Ok(ref value) = result {
                self.put(key.clone(), value.clone()).await;
            }

            self.in_flight.lock().await.remove(&key);
            notify.notify_waiters();

            return result;
        }
    }
}
