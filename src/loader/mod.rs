//! Masked region loading.
//!
//! [`RegionLoader`] turns an ROI into an index region through the transform
//! engine, reads it from an [`ArrayReader`](crate::io::ArrayReader) and
//! optionally restricts it to the pixels of one labelled object.

mod loaded;
mod masked;

pub use loaded::{LoadedPlane, LoadedRegion, MaskMode};
pub use masked::RegionLoader;
