//! Coordinate transforms between physical ROIs and pyramid index grids.

mod engine;
mod region;

pub use engine::{
    check_anchored, round_half_even, Conversion, TransformEngine, TransformWarning,
    DEFAULT_CLIP_TOLERANCE,
};
pub use region::{AxisRange, PixelRegion};
