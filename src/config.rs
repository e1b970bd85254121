//! Command-line surface for the `tilecore` demo binary.
//!
//! This is deliberately a thin CLI over the library, not a server: it opens
//! one local source, prints its metadata, and optionally writes a thumbnail
//! or a single tile to disk. Useful for manually exercising a backend
//! without standing up a service around it.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::source::TileFormat;

/// Output encoding accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CliFormat {
    Jpeg,
    Png,
}

impl From<CliFormat> for TileFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Jpeg => TileFormat::Jpeg,
            CliFormat::Png => TileFormat::Png,
        }
    }
}

/// Inspect a pyramidal/flat image source and optionally extract a tile or
/// thumbnail from it.
#[derive(Parser, Debug, Clone)]
#[command(name = "tilecore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the source file (SVS, pyramidal TIFF, or a flat raster).
    pub path: PathBuf,

    /// Output image encoding.
    #[arg(long, value_enum, default_value_t = CliFormat::Jpeg)]
    pub format: CliFormat,

    /// JPEG quality, 1-100 (ignored for PNG output).
    #[arg(long, default_value_t = 80)]
    pub jpeg_quality: u8,

    /// Write the rendered output to this path instead of just printing metadata.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Render a thumbnail instead of a single tile.
    #[arg(long)]
    pub thumbnail: bool,

    /// Maximum thumbnail side length, in pixels.
    #[arg(long, default_value_t = 256)]
    pub max_size: u32,

    /// Pyramid level to read a tile from, when not rendering a thumbnail.
    #[arg(long, default_value_t = 0)]
    pub level: u32,

    /// Tile column, when not rendering a thumbnail.
    #[arg(long, default_value_t = 0)]
    pub tile_x: u32,

    /// Tile row, when not rendering a thumbnail.
    #[arg(long, default_value_t = 0)]
    pub tile_y: u32,

    /// Enable debug-level logging.
    #[arg(long)]
    pub verbose: bool,
}
