//! # tilecore
//!
//! A storage-agnostic large-image tiling engine: given a pyramidal TIFF/SVS
//! slide, an ordinary raster, or a synthetic test source, serve individual
//! tiles, arbitrary-scale regions, and thumbnails through one object-safe
//! [`TileSource`](source::TileSource) interface.
//!
//! This crate is deliberately scoped below the HTTP layer: it has no server,
//! no authentication, no persistent database, and no job orchestration. It
//! answers "given a region and a scale, give me pixels" as a library; wiring
//! that up to a network service is a separate concern.
//!
//! ## Architecture
//!
//! - [`mod@geometry`] - coordinate systems, units, and pyramid level selection
//! - [`mod@cache`] - byte-size-bounded LRU caching with a pluggable backend
//!   (in-process or memcached) and a singleflight `get_or_compute`
//! - [`io`] - range-read abstraction over local files (and S3, behind the
//!   `s3` feature), plus block-level read coalescing
//! - [`mod@format`] - TIFF/SVS pyramid parsing and JPEGTables handling
//! - [`source`] - the `TileSource` trait and its backends (pyramidal,
//!   flat image, synthetic)
//! - [`iterator`] - ordered tile walks over a source or a sub-region
//! - [`mod@assembler`] - composes tiles into thumbnails and arbitrary regions
//! - [`registry`] - opens and caches sources by identifier, dispatching to
//!   the right backend automatically
//! - [`error`] - the crate's error taxonomy

pub mod assembler;
pub mod cache;
pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod io;
pub mod iterator;
pub mod registry;
pub mod source;

pub use config::Cli;
pub use error::{FormatError, GeometryError, IoError, SourceError, TiffError, TileError};
pub use geometry::{
    select_level, select_level_continuous, LevelPolicy, PixelRect, Region, Scale, SourceMetadata,
    Unit, LEVEL_EPSILON,
};
pub use iterator::{TileIterator, TileRecord};
pub use registry::{SourceOpener, SourceRegistry};
pub use source::{
    EdgePolicy, EncodedImage, FlatImageOptions, FlatImageSource, IteratorOptions, JpegSubsampling,
    PyramidalSource, RegionOptions, SyntheticOptions, SyntheticSource, ThumbnailOptions, Tile,
    TileFormat, TileOptions, TileSource, TilePosition,
};
