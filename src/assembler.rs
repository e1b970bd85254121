//! Region assembler: composites tiles from a [`crate::source::TileSource`]
//! into a single thumbnail or region image.
//!
//! No backend in the teacher assembles multiple tiles into one image — the
//! closest grounding is `tile/encoder.rs`'s decode/re-encode pair, generalized
//! here from "one tile in, one tile out" to "N tiles in, one canvas out", and
//! `TiffPyramid::best_level_for_downsample` for the level-selection half of
//! thumbnail generation.

use bytes::Bytes;
use image::{imageops, DynamicImage, RgbImage};
use tracing::warn;

use crate::error::SourceError;
use crate::geometry::{normalize_region, PixelRect, Region, Scale, SourceMetadata, Unit};
use crate::source::{EdgePolicy, EncodedImage, RegionOptions, ThumbnailOptions, TileFormat, TileSource};

/// Render a thumbnail no larger than `options.max_width` x `options.max_height`,
/// preserving aspect ratio and never upsampling past the source's native
/// resolution.
pub async fn get_thumbnail<T: TileSource + ?Sized>(
    source: &T,
    options: &ThumbnailOptions,
) -> Result<EncodedImage, SourceError> {
    let metadata = source.metadata();
    if metadata.size_x == 0 || metadata.size_y == 0 {
        return Err(SourceError::CorruptFile("source has zero extent".to_string()));
    }

    let downsample_x = metadata.size_x as f64 / options.max_width.max(1) as f64;
    let downsample_y = metadata.size_y as f64 / options.max_height.max(1) as f64;
    let target_downsample = downsample_x.max(downsample_y).max(1.0);

    let level = source.select_level(
        Scale::Downsample(target_downsample),
        crate::geometry::LevelPolicy::Ceil,
        false,
    )?;

    let level_width = metadata.level_width(level);
    let level_height = metadata.level_height(level);

    let canvas = composite_level(
        source,
        level,
        PixelRect {
            left: 0,
            top: 0,
            width: level_width,
            height: level_height,
        },
        false,
        [0, 0, 0],
        None,
    )
    .await?;

    let scale = (options.max_width as f64 / level_width as f64)
        .min(options.max_height as f64 / level_height as f64)
        .min(1.0);
    let out_width = ((level_width as f64 * scale).round().max(1.0)) as u32;
    let out_height = ((level_height as f64 * scale).round().max(1.0)) as u32;

    let resized = if out_width == level_width && out_height == level_height {
        canvas
    } else {
        resize(canvas, out_width, out_height)
    };

    encode(resized, options.format, options.jpeg_quality).await
}

/// Render an arbitrary region of the source at an arbitrary scale.
pub async fn get_region<T: TileSource + ?Sized>(
    source: &T,
    options: &RegionOptions,
) -> Result<EncodedImage, SourceError> {
    let metadata = source.metadata();
    let level = source.select_level(options.scale, options.level_policy, options.exact)?;

    let base_rect = normalize_region(options.region, metadata)?;
    if base_rect.is_empty() {
        return Ok(EncodedImage {
            bytes: Bytes::new(),
            mime_type: options.format.mime_type(),
            width: 0,
            height: 0,
        });
    }

    let level_rect = to_level_rect(base_rect, metadata, level);

    let canvas = composite_level(
        source,
        level,
        level_rect,
        options.tolerate_errors,
        options.fill_color,
        options.cancellation.clone(),
    )
    .await?;

    let final_image = match (options.output_width, options.output_height) {
        (None, None) => canvas,
        (width, height) => {
            let target_w = width.unwrap_or(canvas.width());
            let target_h = height.unwrap_or(canvas.height());
            fit_to_output(canvas, target_w, target_h, options.edge_policy, options.fill_color)
        }
    };

    encode(final_image, options.format, options.jpeg_quality).await
}

/// Fetch every tile covering `level_rect` at `level` and composite them into
/// one canvas sized exactly to `level_rect`.
async fn composite_level<T: TileSource + ?Sized>(
    source: &T,
    level: u32,
    level_rect: PixelRect,
    tolerate_errors: bool,
    fill_color: [u8; 3],
    cancellation: Option<tokio_util::sync::CancellationToken>,
) -> Result<DynamicImage, SourceError> {
    let metadata = source.metadata();
    let mut canvas = RgbImage::from_pixel(
        level_rect.width.max(1),
        level_rect.height.max(1),
        image::Rgb(fill_color),
    );

    let region = level_rect_as_region(level_rect, metadata, level);
    let mut iter = source.tile_iterator(crate::source::IteratorOptions {
        level,
        region: Some(region),
        format: TileFormat::Png,
        jpeg_quality: 80,
        ..Default::default()
    });
    if let Some(token) = cancellation {
        iter = iter.with_cancellation(token);
    }

    while let Some(result) = iter.next_tile().await {
        let record = match result {
            Ok(record) => record,
            Err(err) if tolerate_errors => {
                warn!(error = %err, "tile fetch failed, substituting fill color");
                continue;
            }
            Err(err) => return Err(err),
        };

        let tile_origin_x =
            record.tile_x as i64 * metadata.tile_width as i64 - level_rect.left as i64;
        let tile_origin_y =
            record.tile_y as i64 * metadata.tile_height as i64 - level_rect.top as i64;

        let tile_rgb = record.tile.image.to_rgb8();
        overlay_clamped(&mut canvas, &tile_rgb, tile_origin_x, tile_origin_y);
    }

    if iter.was_cancelled() {
        return Err(SourceError::Cancelled);
    }

    Ok(DynamicImage::ImageRgb8(canvas))
}

/// `image::imageops::overlay` panics if the destination coordinates overflow
/// `i64` math internally in older versions; this wrapper skips tiles that
/// fall entirely outside the canvas instead of relying on that clipping.
fn overlay_clamped(canvas: &mut RgbImage, tile: &RgbImage, x: i64, y: i64) {
    if x + (tile.width() as i64) <= 0
        || y + (tile.height() as i64) <= 0
        || x >= canvas.width() as i64
        || y >= canvas.height() as i64
    {
        return;
    }
    imageops::overlay(canvas, tile, x, y);
}

fn to_level_rect(base_rect: PixelRect, metadata: &SourceMetadata, level: u32) -> PixelRect {
    let downsample = metadata.downsample_for_level(level);
    let left = (base_rect.left as f64 / downsample).floor() as u32;
    let top = (base_rect.top as f64 / downsample).floor() as u32;
    let right = (base_rect.right() as f64 / downsample).ceil() as u32;
    let bottom = (base_rect.bottom() as f64 / downsample).ceil() as u32;

    let level_width = metadata.level_width(level);
    let level_height = metadata.level_height(level);

    let left = left.min(level_width);
    let top = top.min(level_height);
    let right = right.min(level_width).max(left);
    let bottom = bottom.min(level_height).max(top);

    PixelRect {
        left,
        top,
        width: right - left,
        height: bottom - top,
    }
}

fn level_rect_as_region(level_rect: PixelRect, metadata: &SourceMetadata, level: u32) -> Region {
    let downsample = metadata.downsample_for_level(level);
    Region {
        left: level_rect.left as f64 * downsample,
        top: level_rect.top as f64 * downsample,
        width: level_rect.width as f64 * downsample,
        height: level_rect.height as f64 * downsample,
        unit: Unit::BasePixels,
    }
}

fn fit_to_output(
    canvas: DynamicImage,
    target_w: u32,
    target_h: u32,
    edge_policy: EdgePolicy,
    fill_color: [u8; 3],
) -> DynamicImage {
    match edge_policy {
        EdgePolicy::Crop => resize(canvas, target_w, target_h),
        EdgePolicy::ColourFill => {
            let (w, h) = (canvas.width(), canvas.height());
            let target_aspect = target_w as f64 / target_h.max(1) as f64;
            let source_aspect = w as f64 / h.max(1) as f64;

            let (pad_w, pad_h) = if source_aspect > target_aspect {
                (w, (w as f64 / target_aspect).round() as u32)
            } else {
                ((h as f64 * target_aspect).round() as u32, h)
            };

            let mut padded = RgbImage::from_pixel(pad_w.max(w), pad_h.max(h), image::Rgb(fill_color));
            let offset_x = ((padded.width() - w) / 2) as i64;
            let offset_y = ((padded.height() - h) / 2) as i64;
            imageops::overlay(&mut padded, &canvas.to_rgb8(), offset_x, offset_y);

            resize(DynamicImage::ImageRgb8(padded), target_w, target_h)
        }
    }
}

fn resize(image: DynamicImage, width: u32, height: u32) -> DynamicImage {
    if image.width() == width && image.height() == height {
        return image;
    }
    image.resize_exact(width.max(1), height.max(1), imageops::FilterType::Lanczos3)
}

async fn encode(image: DynamicImage, format: TileFormat, jpeg_quality: u8) -> Result<EncodedImage, SourceError> {
    let width = image.width();
    let height = image.height();

    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        match format {
            TileFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
                encoder
                    .encode_image(&image)
                    .map_err(|e| e.to_string())?;
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
    .map_err(SourceError::DecodeFailed)?;

    Ok(EncodedImage {
        bytes: Bytes::from(bytes),
        mime_type: format.mime_type(),
        width,
        height,
    })
}
