//! Pyramid level model.
//!
//! A multiscale image stores the same field at several resolutions. Level 0
//! is the finest; every further level has pixel sizes that are equal or
//! larger along each axis. This module holds the per-level physical pixel
//! sizes and answers the two questions the transform engine asks: "how large
//! is a pixel at level L" and "by how much does level B scale relative to A".
//!
//! # Pyramid Checks
//!
//! On construction:
//! 1. Every pixel size is finite and at least [`MIN_PIXEL_SIZE`]
//! 2. Pixel sizes never decrease with the level index (per axis)
//! 3. Consecutive ratios that are not whole numbers flag the pyramid as
//!    *inexact* (logged, not fatal)
//! 4. Whether the ratios form a geometric progression per axis is recorded;
//!    [`PyramidMetadata::scale_factor`] refuses to answer when they do not

use tracing::warn;

use crate::error::PyramidError;
use crate::geometry::{Axis, Vec3};

// =============================================================================
// Constants
// =============================================================================

/// Default relative tolerance for comparing pixel-size ratios.
pub const DEFAULT_PYRAMID_TOLERANCE: f64 = 1e-3;

/// Pixel sizes below this are treated as corrupt metadata.
pub const MIN_PIXEL_SIZE: f64 = 1e-9;

// =============================================================================
// PyramidLevel
// =============================================================================

/// Descriptor of a single resolution level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidLevel {
    /// Index of this level in the pyramid (0 = finest)
    pub level_index: usize,

    /// Physical size of one pixel, `(z, y, x)`
    pub pixel_size: Vec3,

    /// Downsampling factor relative to level 0 (1.0 on every axis for level 0)
    pub downsample: Vec3,

    /// Declared array shape `(z, y, x)`, when known
    pub shape: Option<[usize; 3]>,
}

// =============================================================================
// PyramidMetadata
// =============================================================================

/// Caller-owned description of one store's resolution levels.
///
/// The engine never caches pyramid information globally: every transform
/// borrows the metadata of the store it works on.
#[derive(Debug, Clone)]
pub struct PyramidMetadata {
    levels: Vec<PyramidLevel>,
    tolerance: f64,
    inexact: bool,
    progression_issue: Option<String>,
}

impl PyramidMetadata {
    /// Build a pyramid from explicit per-level pixel sizes, using the default
    /// tolerance.
    pub fn from_pixel_sizes(pixel_sizes: Vec<Vec3>) -> Result<Self, PyramidError> {
        Self::with_tolerance(pixel_sizes, DEFAULT_PYRAMID_TOLERANCE)
    }

    /// Build a pyramid from explicit per-level pixel sizes.
    ///
    /// # Errors
    ///
    /// - `InvalidMetadata` if no level is given or the tolerance is not a
    ///   finite non-negative number
    /// - `InvalidPixelSize` if a size is non-finite or below [`MIN_PIXEL_SIZE`]
    /// - `InconsistentPyramid` if a size decreases with the level index
    pub fn with_tolerance(pixel_sizes: Vec<Vec3>, tolerance: f64) -> Result<Self, PyramidError> {
        if pixel_sizes.is_empty() {
            return Err(PyramidError::InvalidMetadata(
                "pyramid has no levels".to_string(),
            ));
        }
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(PyramidError::InvalidMetadata(format!(
                "tolerance must be a finite non-negative number, got {tolerance}"
            )));
        }

        for (level, size) in pixel_sizes.iter().enumerate() {
            check_pixel_size(level, *size)?;
        }

        let base = pixel_sizes[0];
        let mut inexact = false;

        for level in 1..pixel_sizes.len() {
            let ratio = consecutive_ratio(&pixel_sizes, level);
            for axis in Axis::ALL {
                let r = ratio[axis];
                if r < 1.0 - tolerance {
                    return Err(PyramidError::InconsistentPyramid {
                        reason: format!(
                            "pixel size along {axis} decreases from level {} ({}) to level {level} ({})",
                            level - 1,
                            pixel_sizes[level - 1][axis],
                            pixel_sizes[level][axis],
                        ),
                    });
                }
                if (r - r.round()).abs() > tolerance * r {
                    inexact = true;
                }
            }
        }

        if inexact {
            warn!(
                levels = pixel_sizes.len(),
                "Pyramid has non-integer downsampling factors; conversions are inexact"
            );
        }

        let progression_issue = find_progression_issue(&pixel_sizes, tolerance);

        let levels = pixel_sizes
            .into_iter()
            .enumerate()
            .map(|(level_index, pixel_size)| PyramidLevel {
                level_index,
                pixel_size,
                downsample: pixel_size.zip_with(base, |p, b| p / b),
                shape: None,
            })
            .collect();

        Ok(Self {
            levels,
            tolerance,
            inexact,
            progression_issue,
        })
    }

    /// Build a pyramid from the level-0 pixel size and the downsampling
    /// factor of every further level relative to level 0.
    pub fn from_factors(
        level0: Vec3,
        factors: &[Vec3],
        tolerance: f64,
    ) -> Result<Self, PyramidError> {
        let mut sizes = Vec::with_capacity(factors.len() + 1);
        sizes.push(level0);
        sizes.extend(
            factors
                .iter()
                .map(|factor| level0.zip_with(*factor, |p, f| p * f)),
        );
        Self::with_tolerance(sizes, tolerance)
    }

    /// Build a pyramid with `num_levels` levels and a constant YX coarsening
    /// between consecutive levels (Z is never coarsened).
    pub fn from_coarsening(
        level0: Vec3,
        num_levels: usize,
        coarsening_xy: u32,
    ) -> Result<Self, PyramidError> {
        let sizes = (0..num_levels)
            .map(|level| {
                let factor = f64::from(coarsening_xy).powi(level as i32);
                Vec3::new(level0.z, level0.y * factor, level0.x * factor)
            })
            .collect();
        Self::from_pixel_sizes(sizes)
    }

    /// Attach declared array shapes, one per level.
    pub fn with_shapes(mut self, shapes: Vec<[usize; 3]>) -> Result<Self, PyramidError> {
        if shapes.len() != self.levels.len() {
            return Err(PyramidError::InvalidMetadata(format!(
                "{} shape(s) given for a pyramid of {} level(s)",
                shapes.len(),
                self.levels.len()
            )));
        }
        for (level, shape) in self.levels.iter_mut().zip(shapes) {
            level.shape = Some(shape);
        }
        Ok(self)
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Whether some consecutive downsampling factor is not a whole number.
    pub fn is_inexact(&self) -> bool {
        self.inexact
    }

    /// Descriptor of `level`.
    pub fn level(&self, level: usize) -> Result<&PyramidLevel, PyramidError> {
        self.levels.get(level).ok_or(PyramidError::LevelOutOfRange {
            level,
            num_levels: self.levels.len(),
        })
    }

    /// Physical pixel size `(z, y, x)` at `level`.
    pub fn pixel_size_at(&self, level: usize) -> Result<Vec3, PyramidError> {
        Ok(self.level(level)?.pixel_size)
    }

    /// Declared array shape at `level`, if any.
    pub fn shape_at(&self, level: usize) -> Result<Option<[usize; 3]>, PyramidError> {
        Ok(self.level(level)?.shape)
    }

    /// Per-axis ratio `pixel_size(level_b) / pixel_size(level_a)`.
    ///
    /// # Errors
    ///
    /// - `LevelOutOfRange` if either level does not exist
    /// - `InconsistentPyramid` if the levels do not form a geometric
    ///   progression per axis within the tolerance
    pub fn scale_factor(&self, level_a: usize, level_b: usize) -> Result<Vec3, PyramidError> {
        let a = self.pixel_size_at(level_a)?;
        let b = self.pixel_size_at(level_b)?;

        if let Some(reason) = &self.progression_issue {
            return Err(PyramidError::InconsistentPyramid {
                reason: reason.clone(),
            });
        }

        Ok(b.zip_with(a, |pb, pa| pb / pa))
    }

    /// Linear YX coarsening factor between consecutive levels.
    ///
    /// Only homogeneous coarsening is supported: the factor must be the same
    /// along Y and X and for every pair of consecutive levels. Returns
    /// `None` for a single-level pyramid.
    pub fn coarsening_xy(&self) -> Result<Option<u32>, PyramidError> {
        let sizes: Vec<Vec3> = self.levels.iter().map(|l| l.pixel_size).collect();
        let mut current: Option<u32> = None;

        for level in 1..sizes.len() {
            let ratio = consecutive_ratio(&sizes, level);
            let ratio_y = ratio.y.round() as u32;
            let ratio_x = ratio.x.round() as u32;

            if ratio_x != ratio_y {
                return Err(PyramidError::InconsistentPyramid {
                    reason: format!(
                        "inhomogeneous coarsening between levels {} and {level}: y={ratio_y}, x={ratio_x}",
                        level - 1
                    ),
                });
            }
            match current {
                None => current = Some(ratio_x),
                Some(c) if c != ratio_x => {
                    return Err(PyramidError::InconsistentPyramid {
                        reason: format!(
                            "inhomogeneous coarsening across levels: {c} then {ratio_x} at level {level}"
                        ),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(current)
    }
}

fn check_pixel_size(level: usize, size: Vec3) -> Result<(), PyramidError> {
    for axis in Axis::ALL {
        let value = size[axis];
        if !value.is_finite() {
            return Err(PyramidError::InvalidPixelSize {
                level,
                reason: format!("{axis} pixel size is not finite ({value})"),
            });
        }
        if value < MIN_PIXEL_SIZE {
            return Err(PyramidError::InvalidPixelSize {
                level,
                reason: format!("{axis} pixel size {value} is below {MIN_PIXEL_SIZE}"),
            });
        }
    }
    Ok(())
}

/// Ratio of the pixel size at `level` to the one at `level - 1`.
fn consecutive_ratio(sizes: &[Vec3], level: usize) -> Vec3 {
    sizes[level].zip_with(sizes[level - 1], |p, q| p / q)
}

/// Describe why the consecutive ratios are not uniform per axis, if they
/// are not.
fn find_progression_issue(sizes: &[Vec3], tolerance: f64) -> Option<String> {
    if sizes.len() < 3 {
        return None;
    }

    let first = consecutive_ratio(sizes, 1);
    for level in 2..sizes.len() {
        let ratio = consecutive_ratio(sizes, level);
        for axis in Axis::ALL {
            if (ratio[axis] - first[axis]).abs() > tolerance * first[axis] {
                return Some(format!(
                    "{axis} ratio between levels {} and {level} is {}, expected {} \
                     (levels do not form a geometric progression)",
                    level - 1,
                    ratio[axis],
                    first[axis]
                ));
            }
        }
    }
    None
}
