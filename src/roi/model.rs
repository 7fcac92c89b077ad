//! The ROI value type.
//!
//! An [`Roi`] is an axis-aligned cuboid in physical units. ROIs are plain
//! values: every operation that changes geometry returns a new instance.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::geometry::{Axis, Vec3};

/// A rectangular (or cuboid) region of interest in physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Stable identifier, e.g. the field-of-view name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Optional link to an acquired region of the sample
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Corner with the smallest coordinates
    pub origin: Vec3,

    /// Size along each axis
    pub extent: Vec3,
}

impl Roi {
    pub fn new(origin: Vec3, extent: Vec3) -> Self {
        Self {
            id: None,
            label: None,
            origin,
            extent,
        }
    }

    /// Build an ROI from the column layout of ROI tables
    /// (`x, y, z, len_x, len_y, len_z`).
    pub fn from_xyz(x: f64, y: f64, z: f64, len_x: f64, len_y: f64, len_z: f64) -> Self {
        Self::new(Vec3::new(z, y, x), Vec3::new(len_z, len_y, len_x))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Upper bound along `axis` (`origin + extent`).
    pub fn end(&self, axis: Axis) -> f64 {
        self.origin[axis] + self.extent[axis]
    }

    /// Upper corner of the cuboid.
    pub fn end_point(&self) -> Vec3 {
        self.origin.zip_with(self.extent, |o, e| o + e)
    }

    pub fn volume(&self) -> f64 {
        self.extent.product()
    }

    /// Name used in logs and error messages.
    ///
    /// Falls back to the origin for ROIs without an identifier.
    pub fn display_name(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("@{}", self.origin),
        }
    }

    /// A copy of this ROI spanning `[start, end)` along `axis`.
    pub fn with_axis_range(&self, axis: Axis, start: f64, end: f64) -> Self {
        let mut roi = self.clone();
        roi.origin[axis] = start;
        roi.extent[axis] = end - start;
        roi
    }

    /// A copy of this ROI moved by `offset`.
    pub fn translated(&self, offset: Vec3) -> Self {
        let mut roi = self.clone();
        roi.origin = self.origin.zip_with(offset, |o, d| o + d);
        roi
    }

    /// Deterministic total order used wherever ROI sets must be processed
    /// independently of input order.
    ///
    /// Identifiers compare lexicographically and ROIs without one sort last;
    /// ties fall back to origin, extent (both `z, y, x`) and label.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        let by_id = match (&self.id, &other.id) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };

        by_id
            .then_with(|| cmp_vec3(&self.origin, &other.origin))
            .then_with(|| cmp_vec3(&self.extent, &other.extent))
            .then_with(|| self.label.cmp(&other.label))
    }
}

fn cmp_vec3(a: &Vec3, b: &Vec3) -> Ordering {
    Axis::ALL
        .iter()
        .map(|&axis| a[axis].total_cmp(&b[axis]))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Translate a set of ROIs so the smallest origin along every axis is zero.
///
/// Acquisition metadata reports stage positions, which can start anywhere
/// (including negative values). Image arrays start at index 0, so tables
/// built from stage positions are re-anchored before conversion.
pub fn reset_origin(rois: &[Roi]) -> Vec<Roi> {
    if rois.is_empty() {
        return Vec::new();
    }

    let min = rois.iter().fold(Vec3::splat(f64::INFINITY), |acc, roi| {
        acc.zip_with(roi.origin, f64::min)
    });
    let offset = min.map(|m| -m);

    rois.iter().map(|roi| roi.translated(offset)).collect()
}
