//! Cache configuration, parsed from environment variables the way
//! `config::Config` parses server settings (grounded on `config.rs`'s
//! `WSI_`-prefixed variables), but as a plain struct rather than a `clap`
//! surface: a library should not impose a CLI parser on its caller.

/// Default capacity (256 MiB) used when configuration is absent or invalid.
pub const DEFAULT_CAPACITY_BYTES: usize = 256 * 1024 * 1024;

/// Which [`super::CacheBackend`] implementation backs a [`super::ByteCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Lru,
    Memcache,
}

/// Configuration for a [`super::ByteCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub capacity_bytes: usize,
    pub memcache_servers: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Lru,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            memcache_servers: Vec::new(),
        }
    }
}

impl CacheConfig {
    /// Read `TILECACHE_BACKEND` (`lru` | `memcache`), `TILECACHE_CAPACITY_BYTES`,
    /// and `TILECACHE_MEMCACHE_SERVERS` (comma-separated `host:port` list)
    /// from the environment. Any malformed or incomplete value falls back
    /// to the LRU default rather than failing construction, matching the
    /// cache core's "never let a bad cache config break the caller" design.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TILECACHE_BACKEND") {
            match raw.to_ascii_lowercase().as_str() {
                "lru" => config.backend = CacheBackendKind::Lru,
                "memcache" => config.backend = CacheBackendKind::Memcache,
                other => {
                    tracing::warn!(value = other, "unknown TILECACHE_BACKEND, falling back to lru");
                    config.backend = CacheBackendKind::Lru;
                }
            }
        }

        if let Ok(raw) = std::env::var("TILECACHE_CAPACITY_BYTES") {
            match raw.parse::<usize>() {
                Ok(bytes) if bytes > 0 => config.capacity_bytes = bytes,
                _ => {
                    tracing::warn!(value = %raw, "invalid TILECACHE_CAPACITY_BYTES, using default");
                }
            }
        }

        if let Ok(raw) = std::env::var("TILECACHE_MEMCACHE_SERVERS") {
            config.memcache_servers = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if config.backend == CacheBackendKind::Memcache && config.memcache_servers.is_empty() {
            tracing::warn!(
                "TILECACHE_BACKEND=memcache but no memcache_servers configured, falling back to lru"
            );
            config.backend = CacheBackendKind::Lru;
        }

        config
    }
}
