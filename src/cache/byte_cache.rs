use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};

use super::backend::{CacheBackend, LruByteBackend};
use super::config::{CacheBackendKind, CacheConfig};
use super::stats::CacheStats;

/// Byte cache fronting a pluggable [`CacheBackend`], with a singleflight
/// `get_or_compute` layered on top (the backend itself stays simple;
/// concurrency dedup lives here so it applies uniformly to every backend).
pub struct ByteCache {
    backend: Arc<dyn CacheBackend>,
    in_flight: Mutex<HashMap<String, Arc<Notify>>>,
}

impl ByteCache {
    pub fn new(config: &CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Lru => Arc::new(LruByteBackend::new(config.capacity_bytes)),
            #[cfg(feature = "memcache-backend")]
            CacheBackendKind::Memcache => {
                match super::backend::MemcacheByteBackend::connect(&config.memcache_servers) {
                    Ok(backend) => Arc::new(backend),
                    Err(err) => {
                        tracing::warn!(error = %err, "memcache connect failed, falling back to in-process lru");
                        Arc::new(LruByteBackend::new(config.capacity_bytes))
                    }
                }
            }
            #[cfg(not(feature = "memcache-backend"))]
            CacheBackendKind::Memcache => {
                tracing::warn!("memcache backend requested but crate built without the memcache-backend feature; using lru");
                Arc::new(LruByteBackend::new(config.capacity_bytes))
            }
        };

        Self {
            backend,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        self.backend.stats()
    }

    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.backend.get(key).await
    }

    pub async fn put(&self, key: &str, value: Bytes) {
        self.backend.put(key, value).await
    }

    pub async fn invalidate(&self, prefix: &str) {
        self.backend.invalidate_prefix(prefix).await
    }

    /// Fetch `key`, computing and storing it via `compute` on a miss.
    /// Concurrent misses for the same key share one `compute` call.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<Bytes, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Bytes, E>>,
    {
        loop {
            if let Some(value) = self.get(key).await {
                return Ok(value);
            }

            let notify = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(notify) = in_flight.get(key) {
                    let notify = notify.clone();
                    drop(in_flight);
                    notify.notified().await;
                    continue;
                }
                let notify = Arc::new(Notify::new());
                in_flight.insert(key.to_string(), notify.clone());
                notify
            };

            let result = compute().await;

            if let Ok(ref value) = result {
                self.put(key, value.clone()).await;
            }

            self.in_flight.lock().await.remove(key);
            notify.notify_waiters();

            return result;
        }
    }
}
