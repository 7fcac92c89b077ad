//! OME-NGFF 0.4 multiscale metadata.
//!
//! Zarr image groups describe their pyramid in the `multiscales` attribute:
//! a list of axes and one dataset per level, each carrying a `scale`
//! coordinate transformation with the physical pixel size of that level.
//!
//! ```json
//! {
//!   "multiscales": [{
//!     "axes": [{"name": "c", "type": "channel"},
//!              {"name": "z", "type": "space"},
//!              {"name": "y", "type": "space"},
//!              {"name": "x", "type": "space"}],
//!     "datasets": [
//!       {"path": "0", "coordinateTransformations": [{"type": "scale", "scale": [1, 1, 0.5, 0.5]}]},
//!       {"path": "1", "coordinateTransformations": [{"type": "scale", "scale": [1, 1, 1, 1]}]}
//!     ]
//!   }]
//! }
//! ```
//!
//! Only a subset is supported: a single multiscale, no global
//! `coordinateTransformations`, exactly one `scale` per dataset.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::PyramidError;
use crate::geometry::Vec3;

use super::metadata::{PyramidMetadata, MIN_PIXEL_SIZE};

const MIN_AXES: usize = 2;
const MAX_AXES: usize = 5;

// =============================================================================
// Serde Models
// =============================================================================

/// One entry of the `axes` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgffAxis {
    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A `scale` or `translation` coordinate transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoordinateTransformation {
    Scale { scale: Vec<f64> },
    Translation { translation: Vec<f64> },
}

/// One pyramid level of a multiscale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgffDataset {
    pub path: String,

    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<CoordinateTransformation>,
}

impl NgffDataset {
    /// The unique `scale` transformation of this dataset.
    pub fn scale(&self) -> Result<&[f64], PyramidError> {
        let mut scales = self
            .coordinate_transformations
            .iter()
            .filter_map(|t| match t {
                CoordinateTransformation::Scale { scale } => Some(scale.as_slice()),
                CoordinateTransformation::Translation { .. } => None,
            });

        match (scales.next(), scales.next()) {
            (Some(scale), None) => Ok(scale),
            (None, _) => Err(PyramidError::InvalidMetadata(format!(
                "dataset {:?} has no scale transformation",
                self.path
            ))),
            (Some(_), Some(_)) => Err(PyramidError::InvalidMetadata(format!(
                "dataset {:?} has more than one scale transformation",
                self.path
            ))),
        }
    }
}

/// A single multiscale image description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscale {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub axes: Vec<NgffAxis>,

    pub datasets: Vec<NgffDataset>,

    #[serde(
        rename = "coordinateTransformations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinate_transformations: Option<Vec<CoordinateTransformation>>,
}

/// The subset of image-group attributes this crate reads.
///
/// Other attributes (e.g. `omero` channel metadata) are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgffImageMeta {
    pub multiscales: Vec<Multiscale>,
}

// =============================================================================
// Accessors
// =============================================================================

impl NgffImageMeta {
    /// Parse image-group attributes from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, PyramidError> {
        serde_json::from_str(json).map_err(|e| {
            PyramidError::InvalidMetadata(format!("cannot parse multiscales attributes: {e}"))
        })
    }

    /// Read image-group attributes from a `.zattrs` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PyramidError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            PyramidError::InvalidMetadata(format!("cannot read {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded multiscales attributes");
        Self::from_json_str(&json)
    }

    /// The single supported multiscale.
    pub fn multiscale(&self) -> Result<&Multiscale, PyramidError> {
        let multiscale = match self.multiscales.as_slice() {
            [single] => single,
            [] => {
                return Err(PyramidError::InvalidMetadata(
                    "no multiscale found".to_string(),
                ))
            }
            many => {
                return Err(PyramidError::InvalidMetadata(format!(
                    "only images with one multiscale are supported (found {})",
                    many.len()
                )))
            }
        };

        if multiscale.coordinate_transformations.is_some() {
            return Err(PyramidError::InvalidMetadata(
                "global coordinateTransformations at the multiscales level are not supported"
                    .to_string(),
            ));
        }
        if multiscale.datasets.is_empty() {
            return Err(PyramidError::InvalidMetadata(
                "multiscale has no datasets".to_string(),
            ));
        }
        if !(MIN_AXES..=MAX_AXES).contains(&multiscale.axes.len()) {
            return Err(PyramidError::InvalidMetadata(format!(
                "multiscale must have between {MIN_AXES} and {MAX_AXES} axes (found {})",
                multiscale.axes.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = multiscale.axes.iter().find(|a| !seen.insert(a.name.as_str())) {
            return Err(PyramidError::InvalidMetadata(format!(
                "duplicate axis {:?}",
                dup.name
            )));
        }

        Ok(multiscale)
    }

    pub fn num_levels(&self) -> Result<usize, PyramidError> {
        Ok(self.multiscale()?.datasets.len())
    }

    /// Axis names in array order.
    pub fn axis_names(&self) -> Result<Vec<&str>, PyramidError> {
        Ok(self
            .multiscale()?
            .axes
            .iter()
            .map(|a| a.name.as_str())
            .collect())
    }

    /// Physical pixel sizes `(z, y, x)` for every level.
    ///
    /// Images without a `z` axis get a Z pixel size of 1.
    pub fn pixel_sizes_zyx(&self) -> Result<Vec<Vec3>, PyramidError> {
        let multiscale = self.multiscale()?;
        let (z_index, y_index, x_index) = spatial_indices(multiscale)?;

        if z_index.is_none() {
            warn!(
                axes = ?self.axis_names()?,
                "Z axis is not present, Z pixel size is set to 1"
            );
        }

        multiscale
            .datasets
            .iter()
            .enumerate()
            .map(|(level, dataset)| {
                let scale = dataset.scale()?;
                if scale.len() != multiscale.axes.len() {
                    return Err(PyramidError::InvalidMetadata(format!(
                        "scale of dataset {:?} has {} values for {} axes",
                        dataset.path,
                        scale.len(),
                        multiscale.axes.len()
                    )));
                }
                let size = Vec3::new(
                    z_index.map_or(1.0, |i| scale[i]),
                    scale[y_index],
                    scale[x_index],
                );
                if size.to_array().iter().any(|&v| v < MIN_PIXEL_SIZE) {
                    return Err(PyramidError::InvalidPixelSize {
                        level,
                        reason: format!("pixel sizes are too small: {size}"),
                    });
                }
                Ok(size)
            })
            .collect()
    }

    /// Build the pyramid model for this image.
    pub fn to_pyramid(&self, tolerance: f64) -> Result<PyramidMetadata, PyramidError> {
        PyramidMetadata::with_tolerance(self.pixel_sizes_zyx()?, tolerance)
    }

    /// Homogeneous YX coarsening factor between consecutive levels.
    pub fn coarsening_xy(&self, tolerance: f64) -> Result<Option<u32>, PyramidError> {
        self.to_pyramid(tolerance)?.coarsening_xy()
    }

    /// Copies of the datasets whose YX scale is multiplied by
    /// `coarsening_xy ^ reference_level`.
    ///
    /// Used when a derived pyramid (e.g. a label image) is computed at
    /// `reference_level` and stored with that level as its own level 0.
    pub fn rescale_datasets(
        &self,
        coarsening_xy: u32,
        reference_level: u32,
    ) -> Result<Vec<NgffDataset>, PyramidError> {
        let multiscale = self.multiscale()?;
        let (_, y_index, x_index) = spatial_indices(multiscale)?;
        let prefactor = f64::from(coarsening_xy).powi(reference_level as i32);

        Ok(multiscale
            .datasets
            .iter()
            .map(|dataset| NgffDataset {
                path: dataset.path.clone(),
                coordinate_transformations: dataset
                    .coordinate_transformations
                    .iter()
                    .map(|t| match t {
                        CoordinateTransformation::Scale { scale } => {
                            let mut scale = scale.clone();
                            for i in [y_index, x_index] {
                                if let Some(v) = scale.get_mut(i) {
                                    *v *= prefactor;
                                }
                            }
                            CoordinateTransformation::Scale { scale }
                        }
                        other => other.clone(),
                    })
                    .collect(),
            })
            .collect())
    }
}

/// Positions of the `z` (optional), `y` and `x` axes.
fn spatial_indices(
    multiscale: &Multiscale,
) -> Result<(Option<usize>, usize, usize), PyramidError> {
    let find = |name: &str| multiscale.axes.iter().position(|a| a.name == name);
    let missing = |name: &str| PyramidError::InvalidMetadata(format!("missing {name} axis"));

    let y = find("y").ok_or_else(|| missing("y"))?;
    let x = find("x").ok_or_else(|| missing("x"))?;
    Ok((find("z"), y, x))
}
