//! Format parsers for pyramidal raster formats.
//!
//! TIFF/BigTIFF parsing is the foundation shared by Aperio SVS and generic
//! pyramidal TIFF; `detect` sniffs which one a byte stream is, and `jpeg`
//! handles the JPEGTables "abbreviated stream" merge Aperio-style tiles need.

mod detect;
mod generic_tiff;
mod jpeg;
mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use generic_tiff::{GenericTiffLevelData, GenericTiffReader};
pub use jpeg::{is_abbreviated_stream, is_complete_stream, merge_jpeg_tables, prepare_tile_jpeg};
pub use svs::{SvsLevelData, SvsMetadata, SvsReader};
