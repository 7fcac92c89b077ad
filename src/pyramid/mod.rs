//! Pyramid metadata.
//!
//! - [`PyramidMetadata`]: validated per-level pixel sizes, scale factors and
//!   YX coarsening
//! - [`NgffImageMeta`]: OME-NGFF `multiscales` attributes, the usual source
//!   of a store's pyramid description

mod metadata;
mod ngff;

pub use metadata::{PyramidLevel, PyramidMetadata, DEFAULT_PYRAMID_TOLERANCE, MIN_PIXEL_SIZE};
pub use ngff::{CoordinateTransformation, Multiscale, NgffAxis, NgffDataset, NgffImageMeta};
