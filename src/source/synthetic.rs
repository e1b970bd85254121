//! Deterministic synthetic tile source, used by this crate's own tests and
//! exported for downstream test use.
//!
//! No backend in the teacher generates pixels itself — the closest
//! grounding is `tile/encoder.rs`'s hand-built `create_test_jpeg` fixture
//! (a `GrayImage::from_fn` checkerboard-like pattern), generalized here into
//! a reusable, parameterized generator so every level/tile is pure function
//! of its coordinates rather than a one-off fixture. No RNG is involved,
//! so two runs always byte-match.

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};

use crate::error::SourceError;
use crate::geometry::SourceMetadata;
use crate::source::trait_def::{Tile, TileSource};

/// Construction parameters for [`SyntheticSource`].
#[derive(Debug, Clone, Copy)]
pub struct SyntheticOptions {
    pub size_x: u32,
    pub size_y: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub levels: u32,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            size_x: 4096,
            size_y: 4096,
            tile_width: 256,
            tile_height: 256,
            levels: 5,
        }
    }
}

/// A tile source whose pixels are generated on demand from a closed-form
/// function of `(level, tile_x, tile_y, pixel_x, pixel_y)`. Never touches
/// disk or network; exists purely so geometry/iterator/assembler tests have
/// a real, fast, deterministic backend to drive.
pub struct SyntheticSource {
    metadata: SourceMetadata,
}

impl SyntheticSource {
    pub fn new(options: SyntheticOptions) -> Self {
        Self {
            metadata: SourceMetadata {
                size_x: options.size_x,
                size_y: options.size_y,
                tile_width: options.tile_width,
                tile_height: options.tile_height,
                levels: options.levels.max(1),
                mm_x: Some(0.0001),
                mm_y: Some(0.0001),
                magnification: Some(20.0),
            },
        }
    }
}

#[async_trait]
impl TileSource for SyntheticSource {
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
        let tiles_across = self.metadata.tiles_across(level);
        let tiles_down = self.metadata.tiles_down(level);
        if tile_x >= tiles_across || tile_y >= tiles_down {
            return Err(SourceError::OutOfRange(format!(
                "tile ({tile_x}, {tile_y}) out of range for level {level}"
            )));
        }

        let level_width = self.metadata.level_width(level);
        let level_height = self.metadata.level_height(level);
        let width = self
            .metadata
            .tile_width
            .min(level_width.saturating_sub(tile_x * self.metadata.tile_width))
            .max(1);
        let height = self
            .metadata
            .tile_height
            .min(level_height.saturating_sub(tile_y * self.metadata.tile_height))
            .max(1);

        let mut img = RgbImage::new(width, height);
        for (px, py, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb(synthetic_pixel(level, tile_x, tile_y, px, py));
        }

        Ok(Tile {
            level,
            tile_x,
            tile_y,
            width,
            height,
            image: DynamicImage::ImageRgb8(img),
        })
    }
}

/// Deterministic checkerboard-like pattern: a coarse per-tile checker plus
/// a fine per-pixel stripe, so adjacent tiles are visually distinguishable
/// and adjacent pixels within a tile vary too (useful for resample tests).
fn synthetic_pixel(level: u32, tile_x: u32, tile_y: u32, px: u32, py: u32) -> [u8; 3] {
    let tile_parity = (tile_x + tile_y) % 2;
    let base = if tile_parity == 0 { 200u8 } else { 60u8 };
    let stripe = ((px / 8 + py / 8) % 2) as u8 * 30;
    let level_tint = (level * 17) as u8;
    [
        base.saturating_add(stripe),
        base.wrapping_add(level_tint),
        base.saturating_sub(stripe),
    ]
}
