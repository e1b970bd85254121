//! Encoded-output cache wrapping a [`TileSource`].
//!
//! Grounded on the teacher's (now-removed) `tile::cache::TileCache`, which
//! cached a slide's encoded tile bytes keyed by slide id + tile coordinate.
//! Generalized here to any backend and to thumbnails/regions as well as
//! single tiles, since all three are "encode a canvas and ship the bytes"
//! operations that benefit identically from caching.
//!
//! A [`TileCache`] does not implement `TileSource` itself — its return type
//! is always pre-encoded bytes (`EncodedImage`), never a decoded `Tile`, so
//! wrapping the trait would misrepresent what a cache hit actually returns.
//! Callers that want caching construct one explicitly around an opened
//! source.

use bytes::Bytes;

use crate::error::SourceError;
use crate::source::{EncodedImage, RegionOptions, ThumbnailOptions, TileFormat, TileOptions, TileSource};

use super::byte_cache::ByteCache;
use super::config::CacheConfig;
use super::stats::CacheStats;

/// Content-addressed identity for a source, used to prefix every cache key
/// so entries from different sources (or different generations of the same
/// source) never collide or outlive the data they describe.
///
/// Composed of the backend name, the source's own identifier, and anything
/// that changes when the underlying bytes change (size, mtime) — the same
/// shape as the teacher's `SlideCacheKey`, generalized from "slide id" to
/// "any source identifier".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFingerprint(String);

impl SourceFingerprint {
    pub fn new(backend: &str, identifier: &str, size_bytes: u64) -> Self {
        Self(format!("{backend}:{identifier}:{size_bytes}"))
    }

    /// A fingerprint with no size/mtime component, for sources where that
    /// isn't known or doesn't apply (e.g. purely synthetic sources).
    pub fn untracked(backend: &str, identifier: &str) -> Self {
        Self(format!("{backend}:{identifier}"))
    }
}

impl std::fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caches the encoded output of `get_tile`/`get_thumbnail`/`get_region`
/// against an inner [`TileSource`], deduplicating concurrent misses the way
/// [`ByteCache::get_or_compute`] always does.
///
/// Region requests carrying a live cancellation token bypass the cache
/// entirely: a cancelled assembly returns `SourceError::Cancelled` and
/// must never be stored, since a later, uncancelled caller for the same key
/// deserves the real result, not a cached failure.
pub struct TileCache<T: TileSource> {
    inner: T,
    fingerprint: SourceFingerprint,
    bytes: ByteCache,
}

/// Cache values are framed as `[width: u32 LE][height: u32 LE][encoded bytes]`
/// so a hit can report dimensions without re-decoding the image payload.
fn pack(width: u32, height: u32, encoded: Bytes) -> Bytes {
    let mut buf = Vec::with_capacity(8 + encoded.len());
    buf.extend_from_slice(&width.to_le_bytes());
    buf.extend_from_slice(&height.to_le_bytes());
    buf.extend_from_slice(&encoded);
    Bytes::from(buf)
}

fn unpack(packed: Bytes) -> Result<(u32, u32, Bytes), SourceError> {
    if packed.len() < 8 {
        return Err(SourceError::DecodeFailed("corrupt tile cache entry".to_string()));
    }
    let width = u32::from_le_bytes(packed[0..4].try_into().unwrap());
    let height = u32::from_le_bytes(packed[4..8].try_into().unwrap());
    Ok((width, height, packed.slice(8..)))
}

/// Encode a decoded tile image the same way the CLI's own tile path does,
/// off the async executor since JPEG/PNG encoding is CPU-bound.
async fn encode_image(
    image: image::DynamicImage,
    format: TileFormat,
    jpeg_quality: u8,
) -> Result<Bytes, SourceError> {
    tokio::task::spawn_blocking(move || -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        match format {
            TileFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
                encoder.encode_image(&image).map_err(|e| e.to_string())?;
            }
            TileFormat::Png => {
                image
                    .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(buf)
    })
    .await
    .map_err(|e| SourceError::DecodeFailed(e.to_string()))?
    .map_err(SourceError::DecodeFailed)
    .map(Bytes::from)
}

impl<T: TileSource> TileCache<T> {
    pub fn new(inner: T, fingerprint: SourceFingerprint, config: &CacheConfig) -> Self {
        Self {
            inner,
            fingerprint,
            bytes: ByteCache::new(config),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn stats(&self) -> &CacheStats {
        self.bytes.stats()
    }

    /// Drop every cached entry for this source (tiles, thumbnails, regions).
    pub async fn invalidate(&self) {
        self.bytes.invalidate(&format!("{}/", self.fingerprint)).await;
    }

    fn tile_key(&self, level: u32, tile_x: u32, tile_y: u32, format: TileFormat, jpeg_quality: u8) -> String {
        format!("{}/tile/{level}/{tile_x}/{tile_y}/{format:?}/{jpeg_quality}", self.fingerprint)
    }

    fn thumbnail_key(&self, options: &ThumbnailOptions) -> String {
        format!(
            "{}/thumb/{}/{}/{:?}/{}",
            self.fingerprint, options.max_width, options.max_height, options.format, options.jpeg_quality
        )
    }

    fn region_key(&self, options: &RegionOptions) -> String {
        format!(
            "{}/region/{:?}/{:.6}/{:.6}/{:.6}/{:.6}/{:?}/{:?}/{}/{}/{}/{:?}/{:?}/{}",
            self.fingerprint,
            options.region.unit,
            options.region.left,
            options.region.top,
            options.region.width,
            options.region.height,
            options.scale,
            options.level_policy,
            options.exact,
            options.output_width.unwrap_or(0),
            options.output_height.unwrap_or(0),
            options.edge_policy,
            options.format,
            options.jpeg_quality,
        )
    }

    /// Fetch a tile, decoding and encoding it only on a cache miss.
    pub async fn get_tile(
        &self,
        level: u32,
        tile_x: u32,
        tile_y: u32,
        options: &TileOptions,
    ) -> Result<EncodedImage, SourceError> {
        let format = options.format.unwrap_or(TileFormat::Jpeg);
        let jpeg_quality = options.jpeg_quality.unwrap_or(80);
        let key = self.tile_key(level, tile_x, tile_y, format, jpeg_quality);

        let inner = &self.inner;
        let packed = self
            .bytes
            .get_or_compute(&key, || async move {
                let tile = inner.get_tile(level, tile_x, tile_y).await?;
                let encoded = encode_image(tile.image, format, jpeg_quality).await?;
                Ok::<Bytes, SourceError>(pack(tile.width, tile.height, encoded))
            })
            .await?;

        let (width, height, bytes) = unpack(packed)?;
        Ok(EncodedImage {
            bytes,
            mime_type: format.mime_type(),
            width,
            height,
        })
    }

    /// Fetch a thumbnail, caching the already-encoded result the inner
    /// source's assembler produces.
    pub async fn get_thumbnail(&self, options: &ThumbnailOptions) -> Result<EncodedImage, SourceError> {
        let key = self.thumbnail_key(options);
        let inner = &self.inner;
        let packed = self
            .bytes
            .get_or_compute(&key, || async move {
                let encoded = inner.get_thumbnail(options).await?;
                Ok::<Bytes, SourceError>(pack(encoded.width, encoded.height, encoded.bytes))
            })
            .await?;

        let (width, height, bytes) = unpack(packed)?;
        Ok(EncodedImage {
            bytes,
            mime_type: options.format.mime_type(),
            width,
            height,
        })
    }

    /// Fetch a region. A request carrying a live cancellation token bypasses
    /// the cache entirely; a cancellation error is never stored.
    pub async fn get_region(&self, options: &RegionOptions) -> Result<EncodedImage, SourceError> {
        if options.cancellation.is_some() {
            return self.inner.get_region(options).await;
        }

        let key = self.region_key(options);
        let inner = &self.inner;
        let packed = self
            .bytes
            .get_or_compute(&key, || async move {
                let encoded = inner.get_region(options).await?;
                Ok::<Bytes, SourceError>(pack(encoded.width, encoded.height, encoded.bytes))
            })
            .await?;

        let (width, height, bytes) = unpack(packed)?;
        Ok(EncodedImage {
            bytes,
            mime_type: options.format.mime_type(),
            width,
            height,
        })
    }
}
