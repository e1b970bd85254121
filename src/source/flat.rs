//! Flat (single-level) image backend for ordinary rasters — anything the
//! `image` crate can decode that isn't itself pyramidal.
//!
//! Grounded on `original_source/server/tilesource/pil.py`'s
//! `PILFileTileSource`: one tile, the whole image; `levels = 1`;
//! `tileWidth = sizeX`; `tileHeight = sizeY`; rejects anything larger than
//! a configurable max side length (`getMaxSize`, default 4096 on both
//! axes). The JPEG/PNG re-encode path in `tile/encoder.rs` grounds the
//! `image`-crate usage.

use async_trait::async_trait;

use crate::error::{IoError, SourceError};
use crate::geometry::SourceMetadata;
use crate::io::RangeReader;
use crate::source::trait_def::{Tile, TileSource};

/// Maximum side length allowed for a flat image, mirroring `getMaxSize`.
#[derive(Debug, Clone, Copy)]
pub enum MaxSize {
    Uniform(u32),
    WidthHeight { width: u32, height: u32 },
}

impl Default for MaxSize {
    fn default() -> Self {
        MaxSize::Uniform(4096)
    }
}

impl MaxSize {
    fn resolve(self) -> (u32, u32) {
        match self {
            MaxSize::Uniform(side) => (side, side),
            MaxSize::WidthHeight { width, height } => (width, height),
        }
    }
}

/// Options accepted when opening a [`FlatImageSource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatImageOptions {
    pub max_size: MaxSize,
}

/// A flat raster exposed as a one-tile, one-level `TileSource`.
pub struct FlatImageSource {
    metadata: SourceMetadata,
    image: image::DynamicImage,
}

impl FlatImageSource {
    /// Read the whole resource via the `image` crate's format-sniffing
    /// decoder and validate it against `options.max_size`.
    pub async fn open<R: RangeReader>(
        reader: &R,
        options: FlatImageOptions,
    ) -> Result<Self, SourceError> {
        let size = reader.size();
        let bytes = reader
            .read_exact_at(0, size as usize)
            .await
            .map_err(SourceError::IoError)?;

        let image = tokio::task::spawn_blocking(move || {
            image::ImageReader::new(std::io::Cursor::new(bytes.as_ref()))
                .with_guessed_format()
                .map_err(|e| SourceError::IoError(IoError::Connection(e.to_string())))?
                .decode()
                .map_err(|e| SourceError::DecodeFailed(e.to_string()))
        })
        .await
        .map_err(|e| SourceError::DecodeFailed(e.to_string()))??;

        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(SourceError::CorruptFile("image has zero extent".to_string()));
        }

        let (max_width, max_height) = options.max_size.resolve();
        if width > max_width || height > max_height {
            return Err(SourceError::TooLarge(format!(
                "{width}x{height} exceeds the {max_width}x{max_height} limit for flat images"
            )));
        }

        Ok(Self {
            metadata: SourceMetadata {
                size_x: width,
                size_y: height,
                tile_width: width,
                tile_height: height,
                levels: 1,
                mm_x: None,
                mm_y: None,
                magnification: None,
            },
            image,
        })
    }

    /// Cheap, synchronous probe: does the resource look like a flat raster
    /// `image` can decode? Used by the registry's `can_read` dispatch.
    pub fn can_read(header: &[u8]) -> bool {
        image::guess_format(header).is_ok()
    }
}

#[async_trait]
impl TileSource for FlatImageSource {
    fn metadata(&self) -> &SourceMetadata {
        &self.metadata
    }

    async fn get_tile(&self, level: u32, tile_x: u32, tile_y: u32) -> Result<Tile, SourceError> {
        if level != 0 || tile_x != 0 || tile_y != 0 {
            return Err(SourceError::OutOfRange(format!(
                "flat image source has a single tile at (0, 0, 0), got ({level}, {tile_x}, {tile_y})"
            )));
        }

        Ok(Tile {
            level: 0,
            tile_x: 0,
            tile_y: 0,
            width: self.metadata.size_x,
            height: self.metadata.size_y,
            image: self.image.clone(),
        })
    }
}
