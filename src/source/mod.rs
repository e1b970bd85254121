//! Tile source backends and the object-safe trait they all implement.

mod flat;
mod pyramidal;
mod synthetic;
mod trait_def;

pub use flat::{FlatImageOptions, FlatImageSource, MaxSize};
pub use pyramidal::PyramidalSource;
pub use synthetic::{SyntheticOptions, SyntheticSource};
pub use trait_def::{
    EdgePolicy, EncodedImage, IteratorOptions, JpegSubsampling, RegionOptions, SourceMetadata,
    ThumbnailOptions, Tile, TileFormat, TileOptions, TileSource, TilePosition,
};
