//! ROI invariant checks.
//!
//! Validation never mutates its input. A single ROI reports every constraint
//! it breaks; a batch reports every bad ROI of the set at once, so a task run
//! surfaces all problems in one go instead of one per attempt.
//!
//! # Constraints
//!
//! - every origin and extent component is finite
//! - every extent component is strictly positive
//! - no origin component is negative
//! - when an image extent is supplied, `origin + extent` stays within it

use tracing::debug;

use crate::error::{RoiError, RoiFailure, RoiField, RoiViolation};
use crate::geometry::{Axis, Vec3};

use super::model::Roi;

/// Slack allowed when comparing an ROI end against the image extent, so that
/// ROIs computed as `n * pixel_size` are not rejected for rounding noise.
const EXTENT_EPSILON: f64 = 1e-9;

// =============================================================================
// Validation Report
// =============================================================================

/// Outcome of validating a set of ROIs.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Number of ROIs checked
    pub checked: usize,

    /// One entry per invalid ROI, in input order
    pub failures: Vec<RoiFailure>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Convert to `Err(InvalidRoiSet)` if any ROI failed.
    pub fn into_result(self) -> Result<(), RoiError> {
        if self.failures.is_empty() {
            Ok(())
        } else {
            Err(RoiError::InvalidRoiSet {
                failures: self.failures,
            })
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

/// List every constraint `roi` breaks. An empty list means the ROI is valid.
pub fn check_roi(roi: &Roi, image_extent: Option<Vec3>) -> Vec<RoiViolation> {
    let mut violations = Vec::new();

    for axis in Axis::ALL {
        let origin = roi.origin[axis];
        let extent = roi.extent[axis];

        let mut finite = true;
        if !origin.is_finite() {
            violations.push(RoiViolation::NonFinite {
                axis,
                field: RoiField::Origin,
                value: origin,
            });
            finite = false;
        }
        if !extent.is_finite() {
            violations.push(RoiViolation::NonFinite {
                axis,
                field: RoiField::Extent,
                value: extent,
            });
            finite = false;
        }
        if !finite {
            continue;
        }

        if extent <= 0.0 {
            violations.push(RoiViolation::NonPositiveExtent {
                axis,
                value: extent,
            });
        }
        if origin < 0.0 {
            violations.push(RoiViolation::NegativeOrigin {
                axis,
                value: origin,
            });
        }
        if let Some(limit) = image_extent {
            let end = origin + extent;
            if end > limit[axis] + EXTENT_EPSILON {
                violations.push(RoiViolation::ExceedsImage {
                    axis,
                    end,
                    limit: limit[axis],
                });
            }
        }
    }

    violations
}

/// Validate a single ROI against its invariants and, optionally, the
/// physical extent of the image it belongs to.
pub fn validate(roi: &Roi, image_extent: Option<Vec3>) -> Result<(), RoiError> {
    let violations = check_roi(roi, image_extent);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(RoiError::InvalidRoi {
            roi: roi.display_name(),
            violations,
        })
    }
}

/// Check every ROI of a set and collect all failures.
pub fn validate_report(rois: &[Roi], image_extent: Option<Vec3>) -> ValidationReport {
    let mut report = ValidationReport {
        checked: rois.len(),
        failures: Vec::new(),
    };

    for (index, roi) in rois.iter().enumerate() {
        let violations = check_roi(roi, image_extent);
        if !violations.is_empty() {
            debug!(
                roi = %roi.display_name(),
                count = violations.len(),
                "ROI failed validation"
            );
            report.failures.push(RoiFailure {
                index,
                roi: roi.display_name(),
                violations,
            });
        }
    }

    report
}

/// Validate a whole ROI set, reporting every bad ROI in a single error.
pub fn validate_all(rois: &[Roi], image_extent: Option<Vec3>) -> Result<(), RoiError> {
    validate_report(rois, image_extent).into_result()
}
