use ndarray::Array3;

use crate::error::{LoadError, PyramidError};
use crate::transform::PixelRegion;

/// Trait for reading index regions from a chunked multiscale array store.
///
/// This abstraction lets the region loader work with any storage engine
/// (Zarr on disk, object storage, in-memory arrays) without knowing how
/// chunks are laid out. Implementations must be thread-safe; caching,
/// retries and backpressure are their own concern.
pub trait ArrayReader: Send + Sync {
    /// Element type of the stored arrays.
    type Elem: Clone + Send + Sync;

    /// Get a unique identifier for this store (for logging and errors).
    fn identifier(&self) -> &str;

    /// Number of pyramid levels held by the store.
    fn num_levels(&self) -> usize;

    /// Stored shape `(z, y, x)` of `level`.
    ///
    /// Returns `LevelOutOfRange` if the store has no such level.
    fn shape(&self, level: usize) -> Result<[usize; 3], LoadError>;

    /// Read exactly `region` from the level named by `region.level`.
    ///
    /// Returns `RegionOutOfBounds` if the region exceeds the stored shape.
    /// The returned array must have shape `region.shape()`.
    fn read_region(&self, region: &PixelRegion) -> Result<Array3<Self::Elem>, LoadError>;
}

/// Check that `region` lies within `shape`, as stores must before reading.
pub fn check_region_bounds(
    identifier: &str,
    region: &PixelRegion,
    shape: [usize; 3],
) -> Result<(), LoadError> {
    if region.fits_within(shape) {
        Ok(())
    } else {
        Err(LoadError::RegionOutOfBounds {
            store: identifier.to_string(),
            region: region.to_string(),
            shape,
        })
    }
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// A pyramid held entirely in memory, one array per level.
///
/// Useful for small images, label arrays computed on the fly and tests.
#[derive(Debug, Clone)]
pub struct InMemoryPyramid<T> {
    identifier: String,
    levels: Vec<Array3<T>>,
}

impl<T> InMemoryPyramid<T> {
    pub fn new(identifier: impl Into<String>, levels: Vec<Array3<T>>) -> Self {
        Self {
            identifier: identifier.into(),
            levels,
        }
    }

    /// A single-level store.
    pub fn single(identifier: impl Into<String>, level0: Array3<T>) -> Self {
        Self::new(identifier, vec![level0])
    }

    /// Full array of `level`, if present.
    pub fn level(&self, level: usize) -> Option<&Array3<T>> {
        self.levels.get(level)
    }

    fn level_array(&self, level: usize) -> Result<&Array3<T>, LoadError> {
        self.levels.get(level).ok_or_else(|| {
            LoadError::Pyramid(PyramidError::LevelOutOfRange {
                level,
                num_levels: self.levels.len(),
            })
        })
    }
}

impl<T: Clone + Send + Sync> ArrayReader for InMemoryPyramid<T> {
    type Elem = T;

    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn shape(&self, level: usize) -> Result<[usize; 3], LoadError> {
        let (z, y, x) = self.level_array(level)?.dim();
        Ok([z, y, x])
    }

    fn read_region(&self, region: &PixelRegion) -> Result<Array3<T>, LoadError> {
        let array = self.level_array(region.level)?;
        let (z, y, x) = array.dim();
        check_region_bounds(&self.identifier, region, [z, y, x])?;
        Ok(region.slice(array).to_owned())
    }
}
