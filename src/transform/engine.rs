//! Physical-to-pixel coordinate transforms.
//!
//! # Algorithm
//!
//! For each axis of an ROI and a level with pixel size `p`:
//!
//! ```text
//! start = round_half_even(origin / p)
//! end   = round_half_even((origin + extent) / p)
//! ```
//!
//! Banker's rounding keeps repeated conversions free of directional bias.
//! When an ROI is thinner than one pixel at the level (`end == start`), the
//! region is widened to a single pixel and a [`TransformWarning::SubPixelRoi`]
//! is reported: coarse levels routinely shrink small ROIs below one pixel.
//!
//! Regions are clipped to `[0, shape)` only when a shape is known, and only
//! within the configured clip tolerance (a fraction of the region's pixels).
//!
//! # Re-anchoring
//!
//! Chained level-to-level conversions accumulate rounding error. A region
//! computed at one level is converted back to physical units with
//! [`TransformEngine::to_physical`] before being converted to another level;
//! the result is within one pixel of converting the original ROI directly.

use std::fmt;

use tracing::{debug, warn};

use crate::error::TransformError;
use crate::geometry::{Axis, Vec3};
use crate::pyramid::PyramidMetadata;
use crate::roi::{validate, Roi};

use super::region::{AxisRange, PixelRegion};

// =============================================================================
// Constants
// =============================================================================

/// Default fraction of a region that clipping may remove.
pub const DEFAULT_CLIP_TOLERANCE: f64 = 0.0;

/// Distance from `.5` below which a quotient is treated as an exact tie.
///
/// Physical coordinates are usually multiples of the pixel size, so a
/// quotient of `2.4999999999` is a tie polluted by floating point error.
const TIE_EPSILON: f64 = 1e-9;

// =============================================================================
// Rounding
// =============================================================================

/// Round to the nearest integer, resolving ties towards the even neighbour.
pub fn round_half_even(value: f64) -> f64 {
    let floor = value.floor();
    let fraction = value - floor;

    if (fraction - 0.5).abs() < TIE_EPSILON {
        if floor.rem_euclid(2.0) == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        value.round()
    }
}

// =============================================================================
// Conversion Result
// =============================================================================

/// Non-fatal conditions raised during a conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformWarning {
    /// The ROI is thinner than one pixel along `axis` at `level`; the region
    /// was widened to one pixel.
    SubPixelRoi {
        roi: String,
        level: usize,
        axis: Axis,
        extent: f64,
        pixel_size: f64,
    },

    /// Part of the region fell outside the level's array and was clipped
    /// (within tolerance).
    Clipped {
        roi: String,
        level: usize,
        removed_fraction: f64,
    },
}

impl fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformWarning::SubPixelRoi {
                roi,
                level,
                axis,
                extent,
                pixel_size,
            } => write!(
                f,
                "ROI {roi} is thinner than one pixel along {axis} at level {level} \
                 (extent {extent}, pixel size {pixel_size}); widened to 1 pixel"
            ),
            TransformWarning::Clipped {
                roi,
                level,
                removed_fraction,
            } => write!(
                f,
                "ROI {roi} clipped to the level {level} image ({removed_fraction:.4} removed)"
            ),
        }
    }
}

/// A converted region plus the warnings raised while converting it.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub region: PixelRegion,
    pub warnings: Vec<TransformWarning>,
}

impl Conversion {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

// =============================================================================
// Transform Engine
// =============================================================================

/// Converts ROIs between physical units and the pixel grids of a pyramid.
///
/// The engine borrows the caller's [`PyramidMetadata`] and keeps no other
/// state, so engines over different stores can be used concurrently.
#[derive(Debug, Clone, Copy)]
pub struct TransformEngine<'a> {
    pyramid: &'a PyramidMetadata,
    clip_tolerance: f64,
}

impl<'a> TransformEngine<'a> {
    pub fn new(pyramid: &'a PyramidMetadata) -> Self {
        Self {
            pyramid,
            clip_tolerance: DEFAULT_CLIP_TOLERANCE,
        }
    }

    /// Allow clipping to remove up to `fraction` of a region's pixels.
    pub fn with_clip_tolerance(mut self, fraction: f64) -> Self {
        self.clip_tolerance = fraction;
        self
    }

    pub fn pyramid(&self) -> &'a PyramidMetadata {
        self.pyramid
    }

    pub fn clip_tolerance(&self) -> f64 {
        self.clip_tolerance
    }

    /// Convert `roi` to the index grid of `level`.
    ///
    /// Clips against the level's declared shape when the pyramid has one.
    ///
    /// # Errors
    ///
    /// - `Roi` if the ROI breaks its invariants
    /// - `Pyramid` if the level does not exist
    /// - `RoiOutsideImage` if clipping removes more than the tolerance
    pub fn to_pixel_region(&self, roi: &Roi, level: usize) -> Result<Conversion, TransformError> {
        let shape = self.pyramid.shape_at(level)?;
        self.convert(roi, level, shape)
    }

    /// Convert `roi` to the index grid of `level`, clipping against an
    /// explicit array shape (typically the one reported by the array store).
    pub fn to_pixel_region_within(
        &self,
        roi: &Roi,
        level: usize,
        shape: [usize; 3],
    ) -> Result<Conversion, TransformError> {
        self.convert(roi, level, Some(shape))
    }

    /// Reconstruct the physical origin and extent covered by `region`.
    ///
    /// The returned ROI carries no identifier.
    pub fn to_physical(&self, region: &PixelRegion) -> Result<Roi, TransformError> {
        let pixel = self.pyramid.pixel_size_at(region.level)?;

        let mut origin = Vec3::default();
        let mut extent = Vec3::default();
        for axis in Axis::ALL {
            let range = region.axis(axis);
            origin[axis] = range.start as f64 * pixel[axis];
            extent[axis] = range.len() as f64 * pixel[axis];
        }

        Ok(Roi::new(origin, extent))
    }

    /// Move a region to another level through physical coordinates.
    pub fn reanchor(
        &self,
        region: &PixelRegion,
        target_level: usize,
    ) -> Result<Conversion, TransformError> {
        let roi = self.to_physical(region)?;
        self.to_pixel_region(&roi, target_level)
    }

    /// Convert a whole ROI set to `level`, in input order.
    pub fn convert_rois(
        &self,
        rois: &[Roi],
        level: usize,
    ) -> Result<Vec<Conversion>, TransformError> {
        let conversions = rois
            .iter()
            .map(|roi| self.to_pixel_region(roi, level))
            .collect::<Result<Vec<_>, _>>()?;

        let warned = conversions.iter().filter(|c| c.has_warnings()).count();
        debug!(
            level,
            rois = rois.len(),
            warned,
            "Converted ROI set to pixel regions"
        );
        Ok(conversions)
    }

    fn convert(
        &self,
        roi: &Roi,
        level: usize,
        shape: Option<[usize; 3]>,
    ) -> Result<Conversion, TransformError> {
        validate(roi, None)?;
        let pixel = self.pyramid.pixel_size_at(level)?;

        let mut bounds = [(0_i64, 0_i64); 3];
        let mut warnings = Vec::new();

        for axis in Axis::ALL {
            let size = pixel[axis];
            let mut start = round_half_even(roi.origin[axis] / size);
            let mut end = round_half_even(roi.end(axis) / size);

            if end <= start {
                // Widen towards the image when rounding lands on the far edge
                if let Some(limit) = shape.map(|s| s[axis.index()] as f64) {
                    if limit > 0.0 && start >= limit && roi.origin[axis] < limit * size {
                        start = limit - 1.0;
                    }
                }
                end = start + 1.0;
                let warning = TransformWarning::SubPixelRoi {
                    roi: roi.display_name(),
                    level,
                    axis,
                    extent: roi.extent[axis],
                    pixel_size: size,
                };
                warn!("{warning}");
                warnings.push(warning);
            }

            bounds[axis.index()] = (start as i64, end as i64);
        }

        if let Some(shape) = shape {
            self.clip(roi, level, &mut bounds, shape, &mut warnings)?;
        }

        let range = |(start, end): (i64, i64)| AxisRange::new(start as usize, end as usize);
        let region = PixelRegion::new(level, range(bounds[0]), range(bounds[1]), range(bounds[2]));

        Ok(Conversion { region, warnings })
    }

    fn clip(
        &self,
        roi: &Roi,
        level: usize,
        bounds: &mut [(i64, i64); 3],
        shape: [usize; 3],
        warnings: &mut Vec<TransformWarning>,
    ) -> Result<(), TransformError> {
        let requested: f64 = bounds.iter().map(|(s, e)| (e - s) as f64).product();

        let mut clipped = *bounds;
        for (range, &limit) in clipped.iter_mut().zip(shape.iter()) {
            range.0 = range.0.max(0);
            range.1 = range.1.min(limit as i64);
        }

        let kept: f64 = clipped
            .iter()
            .map(|(s, e)| (e - s).max(0) as f64)
            .product();
        let removed_fraction = 1.0 - kept / requested;

        if removed_fraction <= 0.0 {
            return Ok(());
        }

        if kept == 0.0 || removed_fraction > self.clip_tolerance {
            return Err(TransformError::RoiOutsideImage {
                roi: roi.display_name(),
                level,
                removed_fraction,
                tolerance: self.clip_tolerance,
            });
        }

        let warning = TransformWarning::Clipped {
            roi: roi.display_name(),
            level,
            removed_fraction,
        };
        warn!("{warning}");
        warnings.push(warning);
        *bounds = clipped;
        Ok(())
    }
}

// =============================================================================
// Region Set Checks
// =============================================================================

/// Check that a set of field-of-view (or well) regions starts at pixel 0
/// along Y and X.
///
/// Tables built from stage positions that were never re-anchored fail here.
pub fn check_anchored(regions: &[PixelRegion]) -> Result<(), TransformError> {
    let min_y = regions.iter().map(|r| r.y.start).min();
    let min_x = regions.iter().map(|r| r.x.start).min();

    match (min_y, min_x) {
        (Some(min_y), Some(min_x)) if (min_y, min_x) != (0, 0) => {
            Err(TransformError::UnanchoredRegions { min_y, min_x })
        }
        _ => Ok(()),
    }
}
