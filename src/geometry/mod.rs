//! Coordinate and unit system shared by every tile source backend.
//!
//! A source always knows its own pixel grid (`base_pixels`) and, optionally,
//! a physical calibration (`mm_x`/`mm_y`) and a native magnification. This
//! module converts between those and the normalized `[0, 1]` `fraction`
//! space, and picks a pyramid level for a requested scale.
//!
//! Level numbering follows the source's own addressable levels: level 0 is
//! the most downsampled (smallest) level and level `levels - 1` is the base
//! (full) resolution, doubling in linear resolution per step. Backends whose
//! underlying format numbers levels the other way around (most TIFF/SVS
//! readers put the base resolution at index 0) translate at the backend
//! boundary; see `source::pyramidal` for the translation.

use crate::error::GeometryError;

/// Tolerance used when comparing a requested scale to a level's exact
/// resolution (see [`select_level`]).
pub const LEVEL_EPSILON: f64 = 0.01;

/// Static description of a tile source's geometry and calibration. Every
/// geometry computation is a pure function of this plus the requested
/// region/scale — no I/O, no locking.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMetadata {
    /// Full-resolution width in pixels.
    pub size_x: u32,
    /// Full-resolution height in pixels.
    pub size_y: u32,
    /// Tile width in pixels (the last tile in a row may be truncated).
    pub tile_width: u32,
    /// Tile height in pixels (the last tile in a column may be truncated).
    pub tile_height: u32,
    /// Number of addressable pyramid levels. Always >= 1.
    pub levels: u32,
    /// Physical size of one base-resolution pixel, in millimetres, on X.
    pub mm_x: Option<f64>,
    /// Physical size of one base-resolution pixel, in millimetres, on Y.
    pub mm_y: Option<f64>,
    /// Native scanning/capture magnification (e.g. 40.0 for 40x), if known.
    pub magnification: Option<f64>,
}

impl SourceMetadata {
    /// Width in pixels at a given level, level 0 = most downsampled.
    pub fn level_width(&self, level: u32) -> u32 {
        scale_dim(self.size_x, self.downsample_for_level(level))
    }

    /// Height in pixels at a given level, level 0 = most downsampled.
    pub fn level_height(&self, level: u32) -> u32 {
        scale_dim(self.size_y, self.downsample_for_level(level))
    }

    /// Downsample factor (>= 1.0) of `level` relative to the base resolution.
    pub fn downsample_for_level(&self, level: u32) -> f64 {
        let steps_below_base = self.levels.saturating_sub(1).saturating_sub(level);
        2f64.powi(steps_below_base as i32)
    }

    /// Number of tile columns at a given level.
    pub fn tiles_across(&self, level: u32) -> u32 {
        self.level_width(level).div_ceil(self.tile_width.max(1))
    }

    /// Number of tile rows at a given level.
    pub fn tiles_down(&self, level: u32) -> u32 {
        self.level_height(level).div_ceil(self.tile_height.max(1))
    }
}

fn scale_dim(base: u32, downsample: f64) -> u32 {
    ((base as f64) / downsample).round().max(1.0) as u32
}

/// Measurement unit a coordinate or size is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Pixels at the source's base (full) resolution.
    BasePixels,
    /// Pixels at the resolution implied by a `magnification` scale.
    MagPixels,
    /// Millimetres, via the source's physical calibration.
    Mm,
    /// Fraction of the full image extent, in `[0, 1]`.
    Fraction,
}

/// A rectangular region expressed in some [`Unit`]. Coordinates follow the
/// source convention of origin at the top-left, X right, Y down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub unit: Unit,
}

impl Region {
    /// The whole image, in base pixels.
    pub fn whole(metadata: &SourceMetadata) -> Self {
        Region {
            left: 0.0,
            top: 0.0,
            width: metadata.size_x as f64,
            height: metadata.size_y as f64,
            unit: Unit::BasePixels,
        }
    }
}

/// An axis-aligned rectangle already resolved to integer base-pixel
/// coordinates, clamped to the source's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }
}

/// How a requested scale is interpreted by [`select_level`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    /// An explicit level index, taken literally (still clamped to range).
    Level(u32),
    /// A requested magnification (e.g. 20.0); requires `magnification` to be
    /// known on the source.
    Magnification(f64),
    /// A requested downsample factor relative to base resolution (1.0 = base,
    /// 4.0 = quarter resolution).
    Downsample(f64),
    /// A requested physical resolution in millimetres per pixel, on either or
    /// both axes; requires the corresponding `mm_x`/`mm_y` to be known on the
    /// source. When only one axis is given the pyramid's own isotropic
    /// per-level scaling supplies the other, preserving aspect for free.
    Mm { x: Option<f64>, y: Option<f64> },
}

/// Rounding policy used when a [`Scale`] doesn't land exactly on a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LevelPolicy {
    /// Smallest level whose resolution is >= the requested resolution
    /// (never blurrier than asked). This is the default: it matches the
    /// common "never show the viewer something softer than it asked for"
    /// expectation.
    #[default]
    Ceil,
    /// Level whose resolution is numerically closest to the request.
    Nearest,
    /// Largest level whose resolution is <= the requested resolution.
    Floor,
}

/// Pick a pyramid level for a requested [`Scale`].
///
/// `exact` requires the chosen level to match the request within
/// [`LEVEL_EPSILON`] (relative); otherwise [`GeometryError::NoMatchingLevel`]
/// is returned instead of silently picking the nearest level.
pub fn select_level(
    scale: Scale,
    metadata: &SourceMetadata,
    policy: LevelPolicy,
    exact: bool,
) -> Result<u32, GeometryError> {
    if let Scale::Level(level) = scale {
        return if level < metadata.levels {
            Ok(level)
        } else {
            Err(GeometryError::OutOfRange(format!(
                "level {level} out of range (0..{})",
                metadata.levels
            )))
        };
    }

    let target_downsample = target_downsample_for_scale(scale, metadata)?;

    if target_downsample <= 0.0 {
        return Err(GeometryError::InvalidOption(
            "resolved downsample must be > 0".to_string(),
        ));
    }

    let mut best_level = 0u32;
    let mut best_distance = f64::MAX;
    let mut exact_match = None;

    for level in 0..metadata.levels {
        let level_downsample = metadata.downsample_for_level(level);
        let relative_err = (level_downsample - target_downsample).abs() / target_downsample;
        if relative_err <= LEVEL_EPSILON {
            exact_match = Some(level);
        }

        let candidate_ok = match policy {
            LevelPolicy::Ceil => level_downsample <= target_downsample,
            LevelPolicy::Floor => level_downsample >= target_downsample,
            LevelPolicy::Nearest => true,
        };

        let distance = (level_downsample - target_downsample).abs();
        if candidate_ok {
            match policy {
                LevelPolicy::Ceil => {
                    // Prefer the *largest* downsample (most downsampled, i.e.
                    // smallest image) that still satisfies <= target, which
                    // minimizes wasted resolution. Levels iterate from most
                    // downsampled (0) to base (levels-1), so among candidates
                    // we want the first, highest-downsample acceptable one —
                    // take it unconditionally as we scan upward in
                    // resolution; later non-candidates won't overwrite it,
                    // but an earlier *better* (closer) candidate should.
                    if distance < best_distance {
                        best_distance = distance;
                        best_level = level;
                    }
                }
                LevelPolicy::Floor => {
                    if distance < best_distance {
                        best_distance = distance;
                        best_level = level;
                    }
                }
                LevelPolicy::Nearest => {
                    if distance < best_distance {
                        best_distance = distance;
                        best_level = level;
                    }
                }
            }
        }
    }

    if exact {
        return exact_match.ok_or_else(|| {
            GeometryError::NoMatchingLevel(format!(
                "no level within {:.0}% of requested downsample {target_downsample:.4}",
                LEVEL_EPSILON * 100.0
            ))
        });
    }

    if best_distance == f64::MAX {
        // No level satisfied the policy's inequality (e.g. Ceil requested a
        // downsample smaller than every level offers); fall back to the
        // level closest overall, which for Ceil is the highest-resolution
        // (base) level and for Floor is the most-downsampled level.
        best_level = match policy {
            LevelPolicy::Ceil => metadata.levels - 1,
            LevelPolicy::Floor => 0,
            LevelPolicy::Nearest => unreachable!("Nearest always has a candidate"),
        };
    }

    Ok(best_level)
}

/// Resolve a [`Scale`] (other than an explicit [`Scale::Level`]) to a target
/// downsample factor relative to base resolution. Shared by [`select_level`]
/// and [`select_level_continuous`] so both discretize the same request the
/// same way.
fn target_downsample_for_scale(scale: Scale, metadata: &SourceMetadata) -> Result<f64, GeometryError> {
    match scale {
        Scale::Level(level) => Ok(metadata.downsample_for_level(level.min(metadata.levels.saturating_sub(1)))),
        Scale::Downsample(d) => Ok(d),
        Scale::Magnification(requested) => {
            let native = metadata
                .magnification
                .ok_or(GeometryError::MissingCalibration)?;
            if requested <= 0.0 {
                return Err(GeometryError::InvalidOption(
                    "magnification must be > 0".to_string(),
                ));
            }
            Ok(native / requested)
        }
        Scale::Mm { x, y } => {
            let axis_downsample = |target: Option<f64>, native: Option<f64>| -> Result<Option<f64>, GeometryError> {
                let Some(target) = target else {
                    return Ok(None);
                };
                if target <= 0.0 {
                    return Err(GeometryError::InvalidOption(
                        "mm-per-pixel must be > 0".to_string(),
                    ));
                }
                let native = native.ok_or(GeometryError::MissingCalibration)?;
                Ok(Some(target / native))
            };

            let dx = axis_downsample(x, metadata.mm_x)?;
            let dy = axis_downsample(y, metadata.mm_y)?;

            match (dx, dy) {
                (Some(dx), Some(dy)) => Ok((dx + dy) / 2.0),
                (Some(d), None) | (None, Some(d)) => Ok(d),
                (None, None) => Err(GeometryError::InvalidOption(
                    "at least one of mm_x/mm_y must be specified".to_string(),
                )),
            }
        }
    }
}

/// Continuous (pre-discretization) pyramid level for a requested [`Scale`],
/// as a real number rather than an addressable integer level — e.g. `6.32`
/// for a magnification that falls between levels 6 and 7. Useful for callers
/// that want to know how far from an exact level match a request is, or that
/// resample rather than pick a discrete level.
pub fn select_level_continuous(scale: Scale, metadata: &SourceMetadata) -> Result<f64, GeometryError> {
    if let Scale::Level(level) = scale {
        return if level < metadata.levels {
            Ok(level as f64)
        } else {
            Err(GeometryError::OutOfRange(format!(
                "level {level} out of range (0..{})",
                metadata.levels
            )))
        };
    }

    let target_downsample = target_downsample_for_scale(scale, metadata)?;
    if target_downsample <= 0.0 {
        return Err(GeometryError::InvalidOption(
            "resolved downsample must be > 0".to_string(),
        ));
    }

    Ok((metadata.levels - 1) as f64 - target_downsample.log2())
}

/// Resolve a [`Region`] expressed in an arbitrary unit into base-pixel
/// coordinates, clamped to the source's bounds. Negative `left`/`top` are
/// interpreted as an offset from the right/bottom edge (`-10` means "10
/// units from the far edge"), matching the common region-request idiom.
pub fn normalize_region(
    region: Region,
    metadata: &SourceMetadata,
) -> Result<PixelRect, GeometryError> {
    let (left, top, width, height) = to_base_pixels(region, metadata)?;

    let left = if left < 0.0 {
        (metadata.size_x as f64 + left).max(0.0)
    } else {
        left
    };
    let top = if top < 0.0 {
        (metadata.size_y as f64 + top).max(0.0)
    } else {
        top
    };

    let left = left.clamp(0.0, metadata.size_x as f64);
    let top = top.clamp(0.0, metadata.size_y as f64);
    let right = (left + width.max(0.0)).clamp(0.0, metadata.size_x as f64);
    let bottom = (top + height.max(0.0)).clamp(0.0, metadata.size_y as f64);

    Ok(PixelRect {
        left: left.round() as u32,
        top: top.round() as u32,
        width: (right - left).round().max(0.0) as u32,
        height: (bottom - top).round().max(0.0) as u32,
    })
}

fn to_base_pixels(
    region: Region,
    metadata: &SourceMetadata,
) -> Result<(f64, f64, f64, f64), GeometryError> {
    match region.unit {
        Unit::BasePixels => Ok((region.left, region.top, region.width, region.height)),
        Unit::Fraction => Ok((
            region.left * metadata.size_x as f64,
            region.top * metadata.size_y as f64,
            region.width * metadata.size_x as f64,
            region.height * metadata.size_y as f64,
        )),
        Unit::Mm => {
            let mm_x = metadata.mm_x.ok_or(GeometryError::MissingCalibration)?;
            let mm_y = metadata.mm_y.ok_or(GeometryError::MissingCalibration)?;
            Ok((
                region.left / mm_x,
                region.top / mm_y,
                region.width / mm_x,
                region.height / mm_y,
            ))
        }
        Unit::MagPixels => {
            let native = metadata
                .magnification
                .ok_or(GeometryError::MissingCalibration)?;
            // `MagPixels` coordinates are expressed at the source's native
            // magnification, i.e. identical to base pixels by definition —
            // a distinct unit exists so callers expressing a *different*
            // magnification can convert via `convert_rect` instead.
            let _ = native;
            Ok((region.left, region.top, region.width, region.height))
        }
    }
}

/// Convert a [`PixelRect`] (in base pixels) into an arbitrary output unit.
/// Returns `(left, top, width, height)` in the destination unit.
pub fn convert_rect(
    rect: PixelRect,
    to: Unit,
    metadata: &SourceMetadata,
) -> Result<(f64, f64, f64, f64), GeometryError> {
    match to {
        Unit::BasePixels | Unit::MagPixels => Ok((
            rect.left as f64,
            rect.top as f64,
            rect.width as f64,
            rect.height as f64,
        )),
        Unit::Fraction => {
            if metadata.size_x == 0 || metadata.size_y == 0 {
                return Err(GeometryError::InvalidOption(
                    "source has zero extent".to_string(),
                ));
            }
            Ok((
                rect.left as f64 / metadata.size_x as f64,
                rect.top as f64 / metadata.size_y as f64,
                rect.width as f64 / metadata.size_x as f64,
                rect.height as f64 / metadata.size_y as f64,
            ))
        }
        Unit::Mm => {
            let mm_x = metadata.mm_x.ok_or(GeometryError::MissingCalibration)?;
            let mm_y = metadata.mm_y.ok_or(GeometryError::MissingCalibration)?;
            Ok((
                rect.left as f64 * mm_x,
                rect.top as f64 * mm_y,
                rect.width as f64 * mm_x,
                rect.height as f64 * mm_y,
            ))
        }
    }
}
