use std::fmt;

use thiserror::Error;

use crate::geometry::Axis;

/// Errors related to pyramid metadata
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// Requested level exceeds the configured pyramid depth
    #[error("Level {level} out of range: pyramid has {num_levels} level(s)")]
    LevelOutOfRange { level: usize, num_levels: usize },

    /// Pixel sizes do not form a usable pyramid
    #[error("Inconsistent pyramid: {reason}")]
    InconsistentPyramid { reason: String },

    /// A pixel size is non-finite or too small
    #[error("Invalid pixel size at level {level}: {reason}")]
    InvalidPixelSize { level: usize, reason: String },

    /// Multiscale metadata is missing, malformed or unsupported
    #[error("Invalid multiscale metadata: {0}")]
    InvalidMetadata(String),
}

/// Which part of an ROI a constraint applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiField {
    Origin,
    Extent,
}

impl fmt::Display for RoiField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoiField::Origin => f.write_str("origin"),
            RoiField::Extent => f.write_str("extent"),
        }
    }
}

/// A single ROI constraint violation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoiViolation {
    #[error("{field} along {axis} is not finite ({value})")]
    NonFinite {
        axis: Axis,
        field: RoiField,
        value: f64,
    },

    #[error("extent along {axis} must be strictly positive, got {value}")]
    NonPositiveExtent { axis: Axis, value: f64 },

    #[error("origin along {axis} is negative ({value})")]
    NegativeOrigin { axis: Axis, value: f64 },

    #[error("ROI ends at {end} along {axis}, beyond the image extent {limit}")]
    ExceedsImage { axis: Axis, end: f64, limit: f64 },
}

/// All violations found for one ROI of a set
#[derive(Debug, Clone, PartialEq)]
pub struct RoiFailure {
    /// Position of the ROI in the input set
    pub index: usize,

    /// Display name of the ROI (identifier, or origin when unnamed)
    pub roi: String,

    pub violations: Vec<RoiViolation>,
}

impl fmt::Display for RoiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}: {}",
            self.index,
            self.roi,
            join_violations(&self.violations)
        )
    }
}

fn join_violations(violations: &[RoiViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_failures(failures: &[RoiFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Errors raised by ROI validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoiError {
    /// A single ROI breaks one or more constraints
    #[error("Invalid ROI {roi}: {}", join_violations(.violations))]
    InvalidRoi {
        roi: String,
        violations: Vec<RoiViolation>,
    },

    /// Aggregated failures of a batch validation
    #[error("{} invalid ROI(s) in set: {}", .failures.len(), join_failures(.failures))]
    InvalidRoiSet { failures: Vec<RoiFailure> },
}

/// Errors raised while converting between physical and pixel coordinates
#[derive(Debug, Clone, Error)]
pub enum TransformError {
    /// Pyramid metadata error
    #[error("Pyramid error: {0}")]
    Pyramid(#[from] PyramidError),

    /// Input ROI is invalid
    #[error("ROI error: {0}")]
    Roi(#[from] RoiError),

    /// Clipping to the level's array shape removes too much of the region
    #[error(
        "ROI {roi} lies outside the level {level} image: clipping removes {removed_fraction:.4} \
         of the region (tolerance {tolerance})"
    )]
    RoiOutsideImage {
        roi: String,
        level: usize,
        removed_fraction: f64,
        tolerance: f64,
    },

    /// Field-of-view regions do not start at pixel index 0
    #[error(
        "Regions are not anchored at pixel 0: minimum start is y={min_y}, x={min_x} \
         (reset the ROI origins first)"
    )]
    UnanchoredRegions { min_y: usize, min_x: usize },
}

/// Errors raised by the overlap resolver
#[derive(Debug, Clone, Error)]
pub enum OverlapError {
    /// Pyramid metadata error
    #[error("Pyramid error: {0}")]
    Pyramid(#[from] PyramidError),

    /// Input ROIs are invalid
    #[error("ROI error: {0}")]
    Roi(#[from] RoiError),

    /// Overlaps remain after the maximum number of passes
    #[error("Overlaps persist after {passes} pass(es) between ROI(s): {}", .rois.join(", "))]
    UnresolvableOverlap { passes: usize, rois: Vec<String> },

    /// Trimming would leave an ROI with a non-positive extent
    #[error(
        "Trimming ROI {roi} against {other} along {axis} leaves a non-positive extent ({extent})"
    )]
    OverlapResolutionDegenerate {
        roi: String,
        other: String,
        axis: Axis,
        extent: f64,
    },
}

/// Errors raised at the array-store boundary
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Coordinate transform error
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Store does not have the requested level
    #[error("Pyramid error: {0}")]
    Pyramid(#[from] PyramidError),

    /// Requested index range exceeds the stored shape
    #[error("Region {region} out of bounds for {store}: level shape is {shape:?}")]
    RegionOutOfBounds {
        store: String,
        region: String,
        shape: [usize; 3],
    },

    /// Label region shape differs from the intensity region shape
    #[error("Label region shape {label:?} does not match intensity region shape {intensity:?}")]
    LabelShapeMismatch {
        intensity: [usize; 3],
        label: [usize; 3],
    },

    /// Reader returned an array of the wrong shape
    #[error("Reader {store} returned shape {actual:?} for a region of shape {expected:?}")]
    RegionShapeMismatch {
        store: String,
        expected: [usize; 3],
        actual: Vec<usize>,
    },

    /// Array cannot be upscaled to the requested shape
    #[error("Cannot upscale array of shape {source_shape:?} to {target_shape:?}: {reason}")]
    UpscaleMismatch {
        source_shape: [usize; 3],
        target_shape: [usize; 3],
        reason: String,
    },

    /// Region has more than one Z plane
    #[error("Region has {z} Z plane(s) and cannot be squeezed to 2D")]
    NotTwoDimensional { z: usize },
}

/// Errors raised by the ROI table codec
#[derive(Debug, Clone, Error)]
pub enum TableError {
    /// Declared schema version is not supported
    #[error("Unsupported ROI table schema version {found:?} (supported: {})", .supported.join(", "))]
    SchemaVersionMismatch {
        found: String,
        supported: Vec<String>,
    },

    /// Table content is not valid
    #[error("Failed to parse ROI table: {0}")]
    Parse(String),

    /// Reading or writing the table failed
    #[error("ROI table I/O error: {0}")]
    Io(String),

    /// Table rows are not valid ROIs
    #[error("ROI error: {0}")]
    Roi(#[from] RoiError),
}
