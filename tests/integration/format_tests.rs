//! Format-specific integration tests.
//!
//! Tests verify:
//! - TIFF parser handles little-endian and big-endian files
//! - BigTIFF files are parsed correctly
//! - SVS JPEGTables handling works correctly
//! - Decoded tiles are valid images

use tilecore::registry::SourceRegistry;
use tilecore::source::TileSource;

use super::test_utils::{
    create_bigtiff_with_jpeg_tile, create_svs_with_jpeg_tables, create_tiff_with_jpeg_tile,
    create_tiff_with_jpeg_tile_endian, is_bigtiff_magic, is_tiff_magic, is_valid_jpeg,
    ByteOrderType, MemoryOpener,
};

// =============================================================================
// TIFF Byte Order Tests
// =============================================================================

#[tokio::test]
async fn test_little_endian_tiff() {
    let tiff_data = create_tiff_with_jpeg_tile_endian(ByteOrderType::LittleEndian);
    assert_eq!(tiff_data[0], b'I');
    assert_eq!(tiff_data[1], b'I');
    assert!(is_tiff_magic(&tiff_data));

    let registry = SourceRegistry::new(MemoryOpener::new().with_source("le.tif", tiff_data));
    let source = registry.get_source("le.tif").await.unwrap();
    let tile = source.get_tile(0, 0, 0).await.unwrap();

    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .encode_image(&tile.image)
        .unwrap();
    assert!(is_valid_jpeg(&buf), "Tile from little-endian TIFF should re-encode as valid JPEG");
}

#[tokio::test]
async fn test_big_endian_tiff() {
    let tiff_data = create_tiff_with_jpeg_tile_endian(ByteOrderType::BigEndian);
    assert_eq!(tiff_data[0], b'M');
    assert_eq!(tiff_data[1], b'M');
    assert!(is_tiff_magic(&tiff_data));

    let registry = SourceRegistry::new(MemoryOpener::new().with_source("be.tif", tiff_data));
    let source = registry.get_source("be.tif").await.unwrap();
    let tile = source.get_tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.width, 256);
    assert_eq!(tile.height, 256);
}

#[tokio::test]
async fn test_both_byte_orders_produce_equivalent_dimensions() {
    let le_tiff = create_tiff_with_jpeg_tile_endian(ByteOrderType::LittleEndian);
    let be_tiff = create_tiff_with_jpeg_tile_endian(ByteOrderType::BigEndian);

    let registry = SourceRegistry::new(
        MemoryOpener::new()
            .with_source("le.tif", le_tiff)
            .with_source("be.tif", be_tiff),
    );

    let le_source = registry.get_source("le.tif").await.unwrap();
    let be_source = registry.get_source("be.tif").await.unwrap();

    assert_eq!(le_source.metadata().size_x, be_source.metadata().size_x);
    assert_eq!(le_source.metadata().size_y, be_source.metadata().size_y);

    let le_tile = le_source.get_tile(0, 0, 0).await.unwrap();
    let be_tile = be_source.get_tile(0, 0, 0).await.unwrap();
    assert_eq!(le_tile.width, be_tile.width);
    assert_eq!(le_tile.height, be_tile.height);
}

// =============================================================================
// BigTIFF Tests
// =============================================================================

#[tokio::test]
async fn test_bigtiff_parsing() {
    let bigtiff_data = create_bigtiff_with_jpeg_tile();
    assert!(is_bigtiff_magic(&bigtiff_data), "Should be valid BigTIFF header");

    let registry = SourceRegistry::new(MemoryOpener::new().with_source("big.tif", bigtiff_data));
    let source = registry.get_source("big.tif").await.unwrap();
    let tile = source.get_tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.width, 256);
    assert_eq!(tile.height, 256);
}

#[tokio::test]
async fn test_bigtiff_multiple_tiles() {
    let bigtiff_data = create_bigtiff_with_jpeg_tile();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("big.tif", bigtiff_data));
    let source = registry.get_source("big.tif").await.unwrap();

    for x in 0..3 {
        for y in 0..3 {
            let result = source.get_tile(0, x, y).await;
            assert!(result.is_ok(), "BigTIFF tile ({x}, {y}) should succeed");
        }
    }
}

// =============================================================================
// SVS JPEGTables Tests
// =============================================================================

#[tokio::test]
async fn test_svs_with_jpeg_tables() {
    let svs_data = create_svs_with_jpeg_tables();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("slide.svs", svs_data));
    let source = registry.get_source("slide.svs").await.unwrap();

    let tile = source.get_tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.width, 256);
    assert_eq!(tile.height, 256);
}

#[tokio::test]
async fn test_svs_decoded_tiles_are_correct_size() {
    let svs_data = create_svs_with_jpeg_tables();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("slide.svs", svs_data));
    let source = registry.get_source("slide.svs").await.unwrap();

    let tile = source.get_tile(0, 0, 0).await.unwrap();
    assert_eq!(tile.image.width(), 256);
    assert_eq!(tile.image.height(), 256);
}

#[tokio::test]
async fn test_svs_multiple_tiles_all_valid() {
    let svs_data = create_svs_with_jpeg_tables();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("slide.svs", svs_data));
    let source = registry.get_source("slide.svs").await.unwrap();

    for x in 0..3 {
        for y in 0..3 {
            let tile = source.get_tile(0, x, y).await;
            assert!(tile.is_ok(), "SVS tile ({x}, {y}) should succeed");
        }
    }
}

// =============================================================================
// Format Detection Tests
// =============================================================================

#[tokio::test]
async fn test_format_detection_generic_tiff() {
    let tiff_data = create_tiff_with_jpeg_tile();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("generic.tif", tiff_data));
    assert!(registry.get_source("generic.tif").await.is_ok());
}

#[tokio::test]
async fn test_format_detection_svs() {
    let svs_data = create_svs_with_jpeg_tables();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("slide.svs", svs_data));
    assert!(registry.get_source("slide.svs").await.is_ok());
}

// =============================================================================
// Edge Cases
// =============================================================================

#[tokio::test]
async fn test_first_and_last_tile_in_row() {
    let tiff_data = create_tiff_with_jpeg_tile();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("test.tif", tiff_data));
    let source = registry.get_source("test.tif").await.unwrap();

    assert!(source.get_tile(0, 0, 0).await.is_ok());
    // Our test TIFF is 2048x1536 with 256x256 tiles = 8x6 tiles.
    assert!(source.get_tile(0, 7, 0).await.is_ok());
}

#[tokio::test]
async fn test_corner_tiles() {
    let tiff_data = create_tiff_with_jpeg_tile();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("test.tif", tiff_data));
    let source = registry.get_source("test.tif").await.unwrap();

    let corners = [(0, 0), (7, 0), (0, 5), (7, 5)];
    for (x, y) in corners {
        assert!(
            source.get_tile(0, x, y).await.is_ok(),
            "Corner tile ({x}, {y}) should succeed"
        );
    }
}

#[tokio::test]
async fn test_out_of_range_tile_is_rejected() {
    let tiff_data = create_tiff_with_jpeg_tile();
    let registry = SourceRegistry::new(MemoryOpener::new().with_source("test.tif", tiff_data));
    let source = registry.get_source("test.tif").await.unwrap();

    let result = source.get_tile(0, 100, 100).await;
    assert!(result.is_err(), "tile far outside the grid should be rejected");
}
