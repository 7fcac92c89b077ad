//! Array-store boundary.
//!
//! - [`ArrayReader`]: blocking reads of index regions from a multiscale store
//! - [`InMemoryPyramid`]: a store backed by in-memory arrays
//! - [`upscale_array`]: align coarser label arrays with intensity regions

mod array_reader;
mod upscale;

pub use array_reader::{check_region_bounds, ArrayReader, InMemoryPyramid};
pub use upscale::upscale_array;
