//! Pyramidal TIFF / Aperio SVS backend.
//!
//! Wraps `format::svs::SvsReader` and `format::generic_tiff::GenericTiffReader`
//! behind a single `TileSource`. Grounded on `slide::registry::CachedSlide`'s
//! enum-over-generics trick (the teacher's own workaround for
//! `SlideReader::read_tile<R>` not being object-safe): the reader type stays
//! a struct-level generic parameter (`PyramidalSource<R>`), while the
//! format-specific reader lives in a non-generic `ReaderKind` enum. Since
//! `TileSource`'s methods are not themselves generic, `PyramidalSource<R>`
//! can still be boxed as `Box<dyn TileSource>` for any concrete `R`.
//!
//! # Level numbering
//!
//! The TIFF/SVS readers number levels the way libtiff/`large_image` do:
//! level 0 is the base (full) resolution, and the index grows with
//! downsampling. The public `TileSource` contract numbers the other way
//! (level 0 = most downsampled, `levels - 1` = base), matching how a caller
//! thinks about "zoom level 0 = zoomed all the way out". The translation
//! happens once, at this module's boundary, in `to_internal_level`.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SourceError;
use crate::format::{detect_format, is_tiff_header, GenericTiffReader, SlideFormat, SvsReader};
use crate::geometry::SourceMetadata;
use crate::io::{BlockCache, RangeReader};
use crate::source::trait_def::{Tile, TileSource};

enum ReaderKind {
    Svs(SvsReader),
    GenericTiff(GenericTiffReader),
}

/// A pyramidal whole-image source backed by SVS or generic tiled TIFF.
pub struct PyramidalSource<R: RangeReader + 'static> {
    reader: Arc<BlockCache<R>>,
    kind: ReaderKind,
    metadata: SourceMetadata,
}

impl<R: RangeReader + 'static> PyramidalSource<R> {
    /// Cheap, synchronous probe used by the registry's dispatch: does this
    /// byte header look like a TIFF file at all? SVS-vs-generic requires
    /// reading the first IFD and so happens inside [`open`](Self::open).
    pub fn can_read(header: &[u8]) -> bool {
        is_tiff_header(header)
    }

    /// Open a pyramidal source, auto-detecting SVS vs generic tiled TIFF.
    /// `reader` is wrapped in a [`BlockCache`] so the many small, scattered
    /// reads TIFF/IFD parsing issues are batched into fewer, larger fetches
    /// from the backing store.
    pub async fn open(reader: R) -> Result<Self, SourceError> {
        let cached = Arc::new(BlockCache::new(reader));

        let format = detect_format(cached.as_ref()).await?;

        let kind = match format {
            SlideFormat::AperioSvs => ReaderKind::Svs(SvsReader::open(cached.as_ref()).await?),
            SlideFormat::GenericTiff => {
                ReaderKind::GenericTiff(GenericTiffReader::open(cached.as_ref()).await?)
            }
        };

        let metadata = build_metadata(&kind);

        Ok(Self {
            reader: cached,
            kind,
            metadata,
        })
    }

    fn internal_level_count(&self) -> usize {
        match &self.kind {
            ReaderKind::Svs(r) => r.level_count(),
            ReaderKind::GenericTiff(r) => r.level_count(),
        }
    }

    fn to_internal_level(&self, public_level: u32) -> usize {
        self.internal_level_count() - 1 - public_level as usize
    }

    async fn read_raw_jpeg(
        &self,
        public_level: u32,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, SourceError> {
        let internal_level = self.to_internal_level(public_level);
        let bytes = match &self.kind {
            ReaderKind::Svs(r) => {
                r.read_tile(self.reader.as_ref(), internal_level, tile_x, tile_y)
                    .await
            }
            ReaderKind::GenericTiff(r) => {
                r.read_tile(self.reader.as_ref(), internal_level, tile_x, tile_y)
                    .await
            }
        };
        bytes.map_err(SourceError::from)
    }
}

fn build_metadata(kind: &ReaderKind) -> SourceMetadata {
    match kind {
        ReaderKind::Svs(r) => {
            let (size_x, size_y) = r.dimensions().unwrap_or((0, 0));
            let base_level = r.level_count().saturating_sub(1);
            let (tile_width, tile_height) = r.tile_size(base_level).unwrap_or((256, 256));
            let mm = r.metadata().mpp.map(|mpp| mpp * 1e-3);
            SourceMetadata {
                size_x,
                size_y,
                tile_width,
                tile_height,
                levels: r.level_count().max(1) as u32,
                mm_x: mm,
                mm_y: mm,
                magnification: r.metadata().magnification,
            }
        }
        ReaderKind::GenericTiff(r) => {
            let (size_x, size_y) = r.dimensions().unwrap_or((0, 0));
            let base_level = r.level_count().saturating_sub(1);
            let (tile_width, tile_height) = r.tile_size(base_level).unwrap_or((256, 256));
            SourceMetadata {
                size_x,
                size_y,
                tile_width,
                tile_height,
                levels: r.level_count().max(1) as u32,
                mm_x: None,
                mm_y: None,
                magnification: None,
            }
        }
    }
}

#[async_trait]
impl<R: RangeReader + 'static> TileSource for PyramidalSource<R> {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn get_tile(&self, level: u32, tile_x: u32, tile_y: u32) -> Result<Tile, SourceError> {
        if level >= self.metadata.levels {
            return Err(SourceError::OutOfRange(format!(
                "level {level} out of range (0..{})",
                self.metadata.levels
            )));
        }

        let jpeg_bytes = self.read_raw_jpeg(level, tile_x, tile_y).await?;

        let decoded = tokio::task::spawn_blocking(move || {
            image::ImageReader::with_format(
                std::io::Cursor::new(jpeg_bytes),
                image::ImageFormat::Jpeg,
            )
            .decode()
        })
        .await
        .map_err(|e| SourceError::DecodeFailed(e.to_string()))?
        .map_err(|e| SourceError::DecodeFailed(e.to_string()))?;

        Ok(Tile {
            level,
            tile_x,
            tile_y,
            width: decoded.width(),
            height: decoded.height(),
            image: decoded,
        })
    }
}
