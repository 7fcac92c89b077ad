use ndarray::{Array2, Array3, Axis as NdAxis};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::transform::{PixelRegion, TransformWarning};

/// What a masked load does with pixels outside the requested label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum MaskMode {
    /// Set masked pixels to zero
    #[default]
    Zero,
    /// Keep pixel values and report them through the validity mask only
    MarkInvalid,
}

/// Pixel data extracted for one ROI.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRegion<T> {
    /// Sub-array of shape `region.shape()`
    pub data: Array3<T>,
    /// Index region the data was read from
    pub region: PixelRegion,
    /// `true` where the pixel belongs to the requested label (masked loads)
    pub valid: Option<Array3<bool>>,
    /// Warnings raised while converting the ROI
    pub warnings: Vec<TransformWarning>,
}

/// A single Z plane of a loaded region.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedPlane<T> {
    pub data: Array2<T>,
    pub region: PixelRegion,
    pub valid: Option<Array2<bool>>,
}

impl<T> LoadedRegion<T> {
    pub fn shape(&self) -> [usize; 3] {
        let (z, y, x) = self.data.dim();
        [z, y, x]
    }

    /// Number of pixels belonging to the requested label, if masked.
    pub fn num_valid(&self) -> Option<usize> {
        self.valid
            .as_ref()
            .map(|valid| valid.iter().filter(|&&v| v).count())
    }

    /// Drop the singleton Z axis of a 2D region.
    ///
    /// Returns `NotTwoDimensional` if the region spans more than one plane.
    pub fn into_2d(self) -> Result<LoadedPlane<T>, LoadError> {
        let z = self.data.len_of(NdAxis(0));
        if z != 1 {
            return Err(LoadError::NotTwoDimensional { z });
        }

        Ok(LoadedPlane {
            data: self.data.index_axis_move(NdAxis(0), 0),
            region: self.region,
            valid: self.valid.map(|v| v.index_axis_move(NdAxis(0), 0)),
        })
    }
}
