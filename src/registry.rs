//! Source Registry & Dispatcher.
//!
//! Grounded on `slide::registry::SlideRegistry`: LRU-cached, singleflight
//! opens keyed by source identifier, wrapping the low-level reader so
//! repeated requests for the same source reuse one open instance instead of
//! re-parsing its metadata. The registry additionally owns format dispatch
//! (`can_read` probing in priority order) so callers never name a backend
//! directly.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{BoundedCache, CacheWeight};
use crate::error::SourceError;
use crate::io::RangeReader;
use crate::source::{FlatImageOptions, FlatImageSource, PyramidalSource, TileSource};

/// Default number of open sources kept cached at once.
const DEFAULT_SOURCE_CACHE_CAPACITY: usize = 100;

/// Creates a [`RangeReader`] for a source identifier (an S3 key, a local
/// path, or any other opaque string the opener understands).
#[async_trait]
pub trait SourceOpener: Send + Sync {
    type Reader: RangeReader + 'static;

    async fn create_reader(&self, source_id: &str) -> Result<Self::Reader, SourceError>;
}

/// Entry-counted: every open source is weighed as 1 regardless of its
/// decoded size, since the expensive resource here is the parsed pyramid
/// structure and open file handle, not bytes held in memory.
impl CacheWeight for Arc<dyn TileSource> {
    fn cache_weight(&self) -> usize {
        1
    }
}

/// Opens and caches [`TileSource`]s by identifier, auto-detecting the
/// backend (pyramidal TIFF/SVS, then flat raster) from the resource's own
/// header bytes.
pub struct SourceRegistry<O: SourceOpener> {
    opener: O,
    cache: BoundedCache<String, Arc<dyn TileSource>>,
}

impl<O: SourceOpener> SourceRegistry<O> {
    /// Create a registry with the default cache capacity
    /// (`DEFAULT_SOURCE_CACHE_CAPACITY` open sources).
    pub fn new(opener: O) -> Self {
        Self::with_capacity(opener, DEFAULT_SOURCE_CACHE_CAPACITY)
    }

    pub fn with_capacity(opener: O, capacity: usize) -> Self {
        Self {
            opener,
            cache: BoundedCache::new(capacity, capacity),
        }
    }

    /// Get a source, opening and dispatching it if not already cached.
    /// Concurrent callers for the same `source_id` share one open via
    /// [`BoundedCache::get_or_compute`].
    pub async fn get_source(&self, source_id: &str) -> Result<Arc<dyn TileSource>, SourceError> {
        self.cache
            .get_or_compute(source_id.to_string(), || {
                self.open_source_internal(source_id)
            })
            .await
    }

    /// Remove a cached source, forcing the next `get_source` call to reopen it.
    pub async fn invalidate(&self, source_id: &str) {
        self.cache.invalidate(&source_id.to_string()).await;
    }

    /// Number of currently cached open sources.
    pub async fn cached_count(&self) -> usize {
        self.cache.len().await
    }

    /// Dispatches in priority order (pyramidal, then flat), falling through
    /// to the next backend on any open error rather than short-circuiting —
    /// a header that merely *looks* pyramidal but fails to parse should
    /// still get a chance against the flat-image backend.
    async fn open_source_internal(&self, source_id: &str) -> Result<Arc<dyn TileSource>, SourceError> {
        let reader = self.opener.create_reader(source_id).await?;

        let header_len = (reader.size() as usize).min(4096).max(16);
        let header = reader.read_exact_at(0, header_len).await?;

        let mut last_error = None;
        let mut reader = Some(reader);

        if PyramidalSource::<O::Reader>::can_read(&header) {
            match PyramidalSource::open(reader.take().expect("reader present on first attempt")).await {
                Ok(source) => return Ok(Arc::new(source)),
                Err(err) => last_error = Some(err),
            }
        }

        if FlatImageSource::can_read(&header) {
            // `PyramidalSource::open` consumes its reader even on failure;
            // reopen only if that happened, otherwise reuse the original.
            let reader = match reader {
                Some(reader) => reader,
                None => self.opener.create_reader(source_id).await?,
            };
            match FlatImageSource::open(&reader, FlatImageOptions::default()).await {
                Ok(source) => return Ok(Arc::new(source)),
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or(SourceError::UnsupportedFormat {
            reason: format!("no backend recognizes source '{source_id}'"),
        }))
    }
}
