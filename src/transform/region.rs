//! Pixel-index regions.

use std::fmt;

use ndarray::{s, Array3, ArrayView3};
use serde::{Deserialize, Serialize};

use crate::geometry::Axis;

/// Half-open index range `[start, end)` along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AxisRange {
    pub start: usize,
    pub end: usize,
}

impl AxisRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// An ROI expressed in the index grid of one pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRegion {
    /// Pyramid level whose grid the ranges refer to
    pub level: usize,

    pub z: AxisRange,
    pub y: AxisRange,
    pub x: AxisRange,
}

impl PixelRegion {
    pub const fn new(level: usize, z: AxisRange, y: AxisRange, x: AxisRange) -> Self {
        Self { level, z, y, x }
    }

    /// Build a region from the flat `[s_z, e_z, s_y, e_y, s_x, e_x]` form.
    ///
    /// Returns `None` if any range is empty.
    pub fn from_indices(level: usize, indices: [usize; 6]) -> Option<Self> {
        let [s_z, e_z, s_y, e_y, s_x, e_x] = indices;
        let region = Self::new(
            level,
            AxisRange::new(s_z, e_z),
            AxisRange::new(s_y, e_y),
            AxisRange::new(s_x, e_x),
        );
        if Axis::ALL.iter().any(|&a| region.axis(a).is_empty()) {
            None
        } else {
            Some(region)
        }
    }

    pub fn axis(&self, axis: Axis) -> AxisRange {
        match axis {
            Axis::Z => self.z,
            Axis::Y => self.y,
            Axis::X => self.x,
        }
    }

    /// Flat `[s_z, e_z, s_y, e_y, s_x, e_x]` form used by downstream tasks.
    pub fn to_indices(&self) -> [usize; 6] {
        [
            self.z.start,
            self.z.end,
            self.y.start,
            self.y.end,
            self.x.start,
            self.x.end,
        ]
    }

    /// Array shape `(z, y, x)` of the region.
    pub fn shape(&self) -> [usize; 3] {
        [self.z.len(), self.y.len(), self.x.len()]
    }

    pub fn num_pixels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Whether every range lies within an array of shape `shape`.
    pub fn fits_within(&self, shape: [usize; 3]) -> bool {
        Axis::ALL
            .iter()
            .all(|&a| self.axis(a).end <= shape[a.index()])
    }

    /// View of this region inside a full-level array.
    ///
    /// # Panics
    ///
    /// Panics if the region does not fit within `array`; check with
    /// [`PixelRegion::fits_within`] first.
    pub fn slice<'a, T>(&self, array: &'a Array3<T>) -> ArrayView3<'a, T> {
        array.slice(s![
            self.z.start..self.z.end,
            self.y.start..self.y.end,
            self.x.start..self.x.end
        ])
    }
}

impl fmt::Display for PixelRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "level {} z:{} y:{} x:{}",
            self.level, self.z, self.y, self.x
        )
    }
}
