//! Pluggable byte-store backends for [`super::ByteCache`].
//!
//! Grounded on `original_source/server/cache_util/cache.py`'s
//! `cachefactory`/`pickAvailableCache`, which picks between an in-process
//! LRU and an external memcached pool depending on configuration and falls
//! back to the in-process cache when the external store is unavailable.

use async_trait::async_trait;
use bytes::Bytes;
use std::num::NonZeroUsize;
use tokio::sync::RwLock;

use super::stats::CacheStats;

/// A byte-keyed, byte-valued store. Implementations must be cheap to clone
/// (wrap internal state in `Arc`) since a single instance is shared across
/// every caller of a [`super::ByteCache`].
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<Bytes>;
    async fn put(&self, key: &str, value: Bytes);
    async fn remove(&self, key: &str);
    /// Remove every entry whose key starts with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str);
    fn stats(&self) -> &CacheStats;
}

/// In-process LRU byte store, size-bounded the way `tile::cache::TileCache`
/// is: eviction happens on insert once total byte weight exceeds capacity.
pub struct LruByteBackend {
    entries: RwLock<lru::LruCache<String, Bytes>>,
    current_bytes: RwLock<usize>,
    capacity_bytes: usize,
    stats: CacheStats,
}

const MAX_ENTRIES: usize = 100_000;

impl LruByteBackend {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            entries: RwLock::new(lru::LruCache::new(NonZeroUsize::new(MAX_ENTRIES).unwrap())),
            current_bytes: RwLock::new(0),
            capacity_bytes,
            stats: CacheStats::default(),
        }
    }
}

#[async_trait]
impl CacheBackend for LruByteBackend {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut entries = self.entries.write().await;
        let hit = entries.get(key).cloned();
        if hit.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        hit
    }

    async fn put(&self, key: &str, value: Bytes) {
        let mut entries = self.entries.write().await;
        let mut current = self.current_bytes.write().await;

        if let Some(old) = entries.peek(key) {
            *current = current.saturating_sub(old.len());
        }
        let added = value.len();
        entries.put(key.to_string(), value);
        *current += added;

        while *current > self.capacity_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => {
                    *current = current.saturating_sub(evicted.len());
                    self.stats.record_eviction();
                }
                None => break,
            }
        }
    }

    async fn remove(&self, key: &str) {
        let mut entries = self.entries.write().await;
        let mut current = self.current_bytes.write().await;
        if let Some(removed) = entries.pop(key) {
            *current = current.saturating_sub(removed.len());
        }
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        let mut current = self.current_bytes.write().await;
        let stale: Vec<String> = entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            if let Some(removed) = entries.pop(&key) {
                *current = current.saturating_sub(removed.len());
            }
        }
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

/// Out-of-process memory-object store backend, built on the `memcache`
/// crate. Not part of the teacher's dependency stack — added because
/// spec requires a pluggable `memcache_servers` backend and no such client
/// exists anywhere in the retrieval pack; `memcache` is the plain,
/// widely-used synchronous client for the memcached protocol. Every call is
/// wrapped in `spawn_blocking` since the underlying client is synchronous.
#[cfg(feature = "memcache-backend")]
pub struct MemcacheByteBackend {
    client: std::sync::Arc<memcache::Client>,
    stats: CacheStats,
}

#[cfg(feature = "memcache-backend")]
impl MemcacheByteBackend {
    pub fn connect(servers: &[String]) -> Result<Self, memcache::MemcacheError> {
        let urls: Vec<String> = servers
            .iter()
            .map(|s| format!("memcache://{s}"))
            .collect();
        let client = memcache::Client::connect(urls)?;
        Ok(Self {
            client: std::sync::Arc::new(client),
            stats: CacheStats::default(),
        })
    }
}

#[cfg(feature = "memcache-backend")]
#[async_trait]
impl CacheBackend for MemcacheByteBackend {
    async fn get(&self, key: &str) -> Option<Bytes> {
        let client = self.client.clone();
        let key = key.to_string();
        let result = tokio::task::spawn_blocking(move || client.get::<Vec<u8>>(&key))
            .await
            .ok()
            .and_then(|r| r.ok())
            .flatten();

        match result {
            Some(bytes) => {
                self.stats.record_hit();
                Some(Bytes::from(bytes))
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    async fn put(&self, key: &str, value: Bytes) {
        let client = self.client.clone();
        let key = key.to_string();
        let _ = tokio::task::spawn_blocking(move || {
            client.set(&key, value.as_ref(), 0)
        })
        .await;
    }

    async fn remove(&self, key: &str) {
        let client = self.client.clone();
        let key = key.to_string();
        let _ = tokio::task::spawn_blocking(move || client.delete(&key)).await;
    }

    async fn invalidate_prefix(&self, _prefix: &str) {
        // memcached has no native prefix scan; callers that need bulk
        // invalidation should version their keys instead (append a
        // generation number to the prefix and bump it).
        tracing::debug!("invalidate_prefix is a no-op for the memcache backend");
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
