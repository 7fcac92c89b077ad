//! Axis and three-component vector types shared by every subsystem.
//!
//! All spatial quantities in this crate are ordered `(z, y, x)`, the axis
//! order of OME-NGFF image arrays. Physical values are in micrometers unless
//! a table explicitly declares another unit.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

// =============================================================================
// Axis
// =============================================================================

/// A spatial axis of a `(z, y, x)` image array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Z,
    Y,
    X,
}

impl Axis {
    /// All axes in array order.
    pub const ALL: [Axis; 3] = [Axis::Z, Axis::Y, Axis::X];

    /// Position of this axis in a `(z, y, x)` array.
    pub const fn index(self) -> usize {
        match self {
            Axis::Z => 0,
            Axis::Y => 1,
            Axis::X => 2,
        }
    }

    /// Lowercase axis name, as used in OME-NGFF `axes` metadata.
    pub const fn name(self) -> &'static str {
        match self {
            Axis::Z => "z",
            Axis::Y => "y",
            Axis::X => "x",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Vec3
// =============================================================================

/// Three floating point components, one per spatial axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub z: f64,
    pub y: f64,
    pub x: f64,
}

impl Vec3 {
    pub const fn new(z: f64, y: f64, x: f64) -> Self {
        Self { z, y, x }
    }

    /// The same value on every axis.
    pub const fn splat(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Apply `f` to every component.
    pub fn map(self, mut f: impl FnMut(f64) -> f64) -> Self {
        Self::new(f(self.z), f(self.y), f(self.x))
    }

    /// Combine two vectors component-wise.
    pub fn zip_with(self, other: Vec3, mut f: impl FnMut(f64, f64) -> f64) -> Self {
        Self::new(f(self.z, other.z), f(self.y, other.y), f(self.x, other.x))
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.z, self.y, self.x]
    }

    pub fn is_finite(self) -> bool {
        self.z.is_finite() && self.y.is_finite() && self.x.is_finite()
    }

    /// Product of the three components.
    pub fn product(self) -> f64 {
        self.z * self.y * self.x
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

impl Index<Axis> for Vec3 {
    type Output = f64;

    fn index(&self, axis: Axis) -> &f64 {
        match axis {
            Axis::Z => &self.z,
            Axis::Y => &self.y,
            Axis::X => &self.x,
        }
    }
}

impl IndexMut<Axis> for Vec3 {
    fn index_mut(&mut self, axis: Axis) -> &mut f64 {
        match axis {
            Axis::Z => &mut self.z,
            Axis::Y => &mut self.y,
            Axis::X => &mut self.x,
        }
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(z={}, y={}, x={})", self.z, self.y, self.x)
    }
}
