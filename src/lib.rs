//! # ngff-roi
//!
//! Region-of-interest handling for multiscale OME-NGFF image pyramids.
//!
//! This library represents ROIs in physical units, converts them into
//! pixel-index regions at any pyramid level, resolves overlaps between ROIs
//! of the same acquisition and drives masked, per-ROI extraction of pixel
//! data from a chunked array store.
//!
//! ## Features
//!
//! - **Deterministic transforms**: banker's rounding, sub-pixel widening and
//!   explicit clipping between physical units and index grids
//! - **Overlap resolution**: iterate-until-stable trimming with a hard pass
//!   cap and order-independent output
//! - **Masked loading**: restrict a region to one labelled object without
//!   touching the source store
//! - **ROI tables**: versioned, unit-tagged JSON tables validated at ingestion
//!
//! ## Architecture
//!
//! - [`pyramid`] - Pyramid metadata and OME-NGFF multiscales parsing
//! - [`roi`] - ROI value type and validation
//! - [`transform`] - Physical-to-pixel transform engine
//! - [`overlap`] - Overlap graph and resolver
//! - [`io`] - Array-store reader boundary and label upscaling
//! - [`loader`] - Masked region loader
//! - [`table`] - ROI table codec
//! - [`config`] - Engine and CLI configuration
//!
//! ## Example
//!
//! ```rust
//! use ngff_roi::{PyramidMetadata, Roi, TransformEngine, Vec3};
//!
//! let pyramid = PyramidMetadata::from_pixel_sizes(vec![
//!     Vec3::new(1.0, 0.5, 0.5),
//!     Vec3::new(1.0, 1.0, 1.0),
//! ])
//! .unwrap();
//!
//! let engine = TransformEngine::new(&pyramid);
//! let roi = Roi::from_xyz(10.0, 10.0, 0.0, 20.0, 20.0, 2.0);
//!
//! let conversion = engine.to_pixel_region(&roi, 1).unwrap();
//! assert_eq!(conversion.region.to_indices(), [0, 2, 10, 30, 10, 30]);
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod loader;
pub mod overlap;
pub mod pyramid;
pub mod roi;
pub mod table;
pub mod transform;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{
    LoadError, OverlapError, PyramidError, RoiError, RoiFailure, RoiField, RoiViolation,
    TableError, TransformError,
};
pub use geometry::{Axis, Vec3};
pub use io::{upscale_array, ArrayReader, InMemoryPyramid};
pub use loader::{LoadedPlane, LoadedRegion, MaskMode, RegionLoader};
pub use overlap::{OverlapGraph, OverlapResolver, Resolution, Trim};
pub use pyramid::{NgffImageMeta, PyramidLevel, PyramidMetadata};
pub use roi::{reset_origin, validate, validate_all, validate_report, Roi, ValidationReport};
pub use table::{PhysicalUnit, RoiRecord, RoiTable};
pub use transform::{
    check_anchored, round_half_even, AxisRange, Conversion, PixelRegion, TransformEngine,
    TransformWarning,
};
