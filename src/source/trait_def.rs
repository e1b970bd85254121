//! The object-safe `TileSource` trait every backend implements.
//!
//! The teacher's `SlideReader` trait is generic over its reader
//! (`read_tile<R: RangeReader>`), which makes it impossible to use as a
//! trait object (`registry.rs` even notes this and works around it with an
//! internal enum). Each backend here owns its reader at construction time
//! instead, so `TileSource` itself takes no generic reader parameter and a
//! `Vec<Box<dyn TileSource>>`-shaped registry is possible.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
pub use crate::geometry::SourceMetadata;
use crate::geometry::{self, LevelPolicy, Region, Scale, Unit};
use crate::iterator::TileIterator;

/// A decoded or encoded tile, addressed by level/x/y in the source's own
/// level numbering (0 = most downsampled).
#[derive(Debug, Clone)]
pub struct Tile {
    pub level: u32,
    pub tile_x: u32,
    pub tile_y: u32,
    pub width: u32,
    pub height: u32,
    pub image: image::DynamicImage,
}

/// Output encoding requested for a tile, thumbnail, or region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }
}

/// An encoded image plus the MIME type it was encoded as — the return type
/// for thumbnails and regions, always paired as spec requires.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Bytes,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// How to handle a region/thumbnail edge when the requested aspect ratio or
/// tile boundaries don't line up cleanly with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgePolicy {
    /// Crop to the exact requested rectangle, discarding any overflow.
    #[default]
    Crop,
    /// Fill to the requested size, padding with `fill_color`.
    ColourFill,
}

/// JPEG chroma subsampling mode. Accepted and validated on [`TileOptions`]
/// and [`RegionOptions`] but not yet wired into the encoder: `image`'s
/// `JpegEncoder` has no subsampling-selection API to pass it through to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JpegSubsampling {
    /// 4:4:4, no chroma subsampling.
    Yuv444,
    /// 4:2:2.
    Yuv422,
    /// 4:2:0, the common default for photographic JPEGs.
    Yuv420,
}

/// Options shared by `get_tile`.
#[derive(Debug, Clone, Default)]
pub struct TileOptions {
    pub format: Option<TileFormat>,
    pub jpeg_quality: Option<u8>,
    pub jpeg_subsampling: Option<JpegSubsampling>,
}

/// Options for `get_thumbnail`.
#[derive(Debug, Clone)]
pub struct ThumbnailOptions {
    pub max_width: u32,
    pub max_height: u32,
    pub format: TileFormat,
    pub jpeg_quality: u8,
}

impl Default for ThumbnailOptions {
    fn default() -> Self {
        Self {
            max_width: 256,
            max_height: 256,
            format: TileFormat::Jpeg,
            jpeg_quality: 80,
        }
    }
}

/// Options for `get_region`.
#[derive(Debug, Clone)]
pub struct RegionOptions {
    pub region: Region,
    pub scale: Scale,
    pub level_policy: LevelPolicy,
    pub exact: bool,
    pub output_width: Option<u32>,
    pub output_height: Option<u32>,
    pub edge_policy: EdgePolicy,
    pub fill_color: [u8; 3],
    pub tolerate_errors: bool,
    pub format: TileFormat,
    pub jpeg_quality: u8,
    pub jpeg_subsampling: Option<JpegSubsampling>,
    /// Lets a caller abandon a large region assembly mid-flight; checked
    /// between tile fetches, not within one.
    pub cancellation: Option<CancellationToken>,
}

impl Default for RegionOptions {
    fn default() -> Self {
        Self {
            region: Region {
                left: 0.0,
                top: 0.0,
                width: 0.0,
                height: 0.0,
                unit: Unit::Fraction,
            },
            scale: Scale::Level(0),
            level_policy: LevelPolicy::Ceil,
            exact: false,
            output_width: None,
            output_height: None,
            edge_policy: EdgePolicy::Crop,
            fill_color: [0, 0, 0],
            tolerate_errors: false,
            format: TileFormat::Jpeg,
            jpeg_quality: 80,
            jpeg_subsampling: None,
            cancellation: None,
        }
    }
}

/// A single starting position for a [`TileIterator`], honoured at
/// construction time rather than via a later seek call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePosition {
    /// 0-based row-major index within the iterator's range.
    Index(usize),
    /// Tile-grid coordinates at the iterator's level.
    LevelXy { x: u32, y: u32 },
    /// Base-pixel coordinates, resolved to the tile containing that point.
    RegionXy { x: u32, y: u32 },
}

/// Options for `tile_iterator`.
#[derive(Debug, Clone)]
pub struct IteratorOptions {
    pub level: u32,
    pub region: Option<Region>,
    pub format: TileFormat,
    pub jpeg_quality: u8,
    /// Restrict the walk to a single starting tile, resolved once up front.
    pub tile_position: Option<TilePosition>,
    /// Bilinearly rescale each yielded tile toward `continuous_level` rather
    /// than returning it at the discrete level's native resolution.
    pub resample: bool,
    /// The precise (pre-discretization) level the caller actually asked for;
    /// only consulted when `resample` is true.
    pub continuous_level: Option<f64>,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            level: 0,
            region: None,
            format: TileFormat::Png,
            jpeg_quality: 80,
            tile_position: None,
            resample: false,
            continuous_level: None,
        }
    }
}

/// The polymorphic interface every backend (pyramidal, flat image,
/// synthetic) implements. No method is generic, so `Box<dyn TileSource>`
/// and `Arc<dyn TileSource>` both work — required for the registry to hold
/// a heterogeneous set of open sources.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Static geometry/calibration description. Cheap, no I/O.
    fn metadata(&self) -> &SourceMetadata;

    /// Fetch a single tile, level 0 = most downsampled, in the source's own
    /// tile grid. Returns `OutOfRange` for a coordinate outside the grid.
    async fn get_tile(&self, level: u32, tile_x: u32, tile_y: u32) -> Result<Tile, SourceError>;

    /// Associated images (label, macro, thumbnail) carried alongside the
    /// pyramid, if any. Most backends have none.
    fn associated_images(&self) -> &[String] {
        &[]
    }

    fn is_geospatial(&self) -> bool {
        false
    }

    fn can_write(&self) -> bool {
        false
    }

    /// Render a thumbnail no larger than `options.max_width/max_height`,
    /// preserving aspect ratio, never upsampling past the source's native
    /// resolution. Default implementation delegates to the region
    /// assembler over the whole image.
    async fn get_thumbnail(
        &self,
        options: &ThumbnailOptions,
    ) -> Result<EncodedImage, SourceError> {
        crate::assembler::get_thumbnail(self, options).await
    }

    /// Render an arbitrary region at an arbitrary scale. Default
    /// implementation delegates to the region assembler.
    async fn get_region(&self, options: &RegionOptions) -> Result<EncodedImage, SourceError> {
        crate::assembler::get_region(self, options).await
    }

    /// Walk every tile at a level (optionally restricted to a sub-region)
    /// in row-major order.
    fn tile_iterator<'a>(&'a self, options: IteratorOptions) -> TileIterator<'a> {
        TileIterator::new(self, options)
    }

    /// Resolve a requested [`Scale`] to a concrete level using this
    /// source's own level-selection policy (shared, pure geometry).
    fn select_level(
        &self,
        scale: Scale,
        policy: LevelPolicy,
        exact: bool,
    ) -> Result<u32, SourceError> {
        Ok(geometry::select_level(scale, self.metadata(), policy, exact)?)
    }

    /// Continuous (pre-discretization) pyramid level for a requested
    /// [`Scale`] — see [`geometry::select_level_continuous`].
    fn select_level_continuous(&self, scale: Scale) -> Result<f64, SourceError> {
        Ok(geometry::select_level_continuous(scale, self.metadata())?)
    }
}
