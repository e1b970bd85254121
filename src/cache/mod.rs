//! Generic bounded caching used throughout the crate.
//!
//! Three shapes of cache are needed:
//!
//! - [`BoundedCache`]: an in-process, size-or-count-bounded LRU holding
//!   arbitrary typed values (e.g. `Arc<dyn TileSource>` in the registry).
//!   Grounded on the slide registry's singleflight `get_slide` and the
//!   block cache's `get_block`.
//! - [`ByteCache`]: a byte-keyed, byte-valued cache with a pluggable
//!   [`backend::CacheBackend`] — in-process LRU by default, or an external
//!   memory-object store (memcached) when configured. This is what holds
//!   encoded tile/thumbnail/region bytes, since those are the only values
//!   that make sense to ship to an out-of-process store.
//! - [`TileCache`]: the caller-facing wrapper built on top of a `ByteCache`
//!   that actually keys and stores a source's encoded tile/thumbnail/region
//!   output, addressed by a [`SourceFingerprint`].

mod backend;
mod bounded;
mod byte_cache;
mod config;
mod stats;
mod tile_cache;

pub use backend::{CacheBackend, LruByteBackend};
#[cfg(feature = "memcache-backend")]
pub use backend::MemcacheByteBackend;
pub use bounded::{BoundedCache, CacheWeight};
pub use byte_cache::ByteCache;
pub use config::{CacheBackendKind, CacheConfig};
pub use stats::CacheStats;
pub use tile_cache::{SourceFingerprint, TileCache};
