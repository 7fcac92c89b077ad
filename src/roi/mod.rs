//! ROI model and validation.
//!
//! - [`Roi`]: immutable cuboid in physical units with an optional identifier
//! - [`validate`] / [`validate_all`]: invariant checks, single and fail-slow batch
//! - [`reset_origin`]: re-anchor stage-coordinate ROI sets at zero

mod model;
mod validation;

pub use model::{reset_origin, Roi};
pub use validation::{check_roi, validate, validate_all, validate_report, ValidationReport};
