//! ROI-driven region loading with optional label masking.

use ndarray::{Array3, Zip};
use num_traits::Zero;
use tracing::debug;

use crate::error::LoadError;
use crate::geometry::Axis;
use crate::io::{upscale_array, ArrayReader};
use crate::roi::Roi;
use crate::transform::{AxisRange, PixelRegion, TransformEngine};

use super::loaded::{LoadedRegion, MaskMode};

/// Loads pixel data for ROIs from an [`ArrayReader`].
///
/// The loader never writes to a store: masking is applied to the in-memory
/// copy returned by the reader.
#[derive(Debug, Clone, Copy)]
pub struct RegionLoader<'a> {
    engine: TransformEngine<'a>,
    mask_mode: MaskMode,
}

impl<'a> RegionLoader<'a> {
    pub fn new(engine: TransformEngine<'a>) -> Self {
        Self {
            engine,
            mask_mode: MaskMode::default(),
        }
    }

    pub fn with_mask_mode(mut self, mask_mode: MaskMode) -> Self {
        self.mask_mode = mask_mode;
        self
    }

    pub fn engine(&self) -> &TransformEngine<'a> {
        &self.engine
    }

    pub fn mask_mode(&self) -> MaskMode {
        self.mask_mode
    }

    /// Convert `roi` at `level` and read exactly that region.
    ///
    /// Clipping uses the shape reported by the reader.
    pub fn load<R: ArrayReader>(
        &self,
        roi: &Roi,
        level: usize,
        reader: &R,
    ) -> Result<LoadedRegion<R::Elem>, LoadError> {
        let shape = reader.shape(level)?;
        let conversion = self.engine.to_pixel_region_within(roi, level, shape)?;
        let data = read_checked(reader, &conversion.region)?;

        debug!(
            roi = %roi.display_name(),
            store = reader.identifier(),
            region = %conversion.region,
            "Loaded region"
        );

        Ok(LoadedRegion {
            data,
            region: conversion.region,
            valid: None,
            warnings: conversion.warnings,
        })
    }

    /// Load `roi` and keep only the pixels whose co-registered label equals
    /// `label_id`.
    ///
    /// The label store is read at the same level and region as the
    /// intensity store.
    ///
    /// # Errors
    ///
    /// Returns `LabelShapeMismatch` if the label region does not have the
    /// intensity region's shape.
    pub fn load_masked<R, L>(
        &self,
        roi: &Roi,
        level: usize,
        reader: &R,
        labels: &L,
        label_id: L::Elem,
    ) -> Result<LoadedRegion<R::Elem>, LoadError>
    where
        R: ArrayReader,
        R::Elem: Zero,
        L: ArrayReader,
        L::Elem: PartialEq,
    {
        let loaded = self.load(roi, level, reader)?;
        let region = loaded.region;

        let label_shape = labels.shape(level)?;
        if !region.fits_within(label_shape) {
            return Err(LoadError::LabelShapeMismatch {
                intensity: region.shape(),
                label: clipped_shape(&region, label_shape),
            });
        }
        let label_data = labels.read_region(&region)?;

        self.apply_mask(loaded, &label_data, &label_id, roi)
    }

    /// Like [`RegionLoader::load_masked`], for label arrays stored at a
    /// coarser level than the intensity data.
    ///
    /// The YX upscaling factor is the ratio of the intensity and label
    /// level shapes. The label window covering the intensity region is read
    /// at `label_level`, repeated by that factor and cut at the region's
    /// offset within the coarse grid, so label pixels stay aligned with
    /// intensity pixels for any region start. Pixels beyond the upscaled
    /// label array count as background.
    pub fn load_masked_upscaled<R, L>(
        &self,
        roi: &Roi,
        level: usize,
        reader: &R,
        labels: &L,
        label_level: usize,
        label_id: L::Elem,
    ) -> Result<LoadedRegion<R::Elem>, LoadError>
    where
        R: ArrayReader,
        R::Elem: Zero,
        L: ArrayReader,
        L::Elem: PartialEq + Zero,
    {
        if label_level == level {
            return self.load_masked(roi, level, reader, labels, label_id);
        }

        let loaded = self.load(roi, level, reader)?;
        let region = loaded.region;
        let fine_shape = reader.shape(level)?;
        let label_shape = labels.shape(label_level)?;

        let mut factors = [1_usize; 3];
        let mut window = [region.z, region.y, region.x];
        for axis in [Axis::Y, Axis::X] {
            let i = axis.index();
            let factor = fine_shape[i] / label_shape[i].max(1);
            if factor == 0 {
                return Err(LoadError::UpscaleMismatch {
                    source_shape: label_shape,
                    target_shape: fine_shape,
                    reason: format!("{axis} label size exceeds the intensity size"),
                });
            }
            let range = region.axis(axis);
            factors[i] = factor;
            window[i] = AxisRange::new(
                range.start / factor,
                range.end.div_ceil(factor).min(label_shape[i]),
            );
        }

        let (z, y, x) = loaded.data.dim();
        let label_data = if window.iter().any(AxisRange::is_empty) {
            Array3::zeros((z, y, x))
        } else {
            let label_region = PixelRegion::new(label_level, window[0], window[1], window[2]);
            let coarse = read_checked(labels, &label_region)?;
            let (cz, cy, cx) = coarse.dim();
            let upscaled = upscale_array(
                coarse.view(),
                [cz, cy * factors[1], cx * factors[2]],
                &[Axis::Y, Axis::X],
                false,
            )?;

            let offset = Axis::ALL.map(|axis| {
                let i = axis.index();
                region.axis(axis).start - window[i].start * factors[i]
            });
            debug!(
                store = labels.identifier(),
                window = %label_region,
                ?factors,
                ?offset,
                "Upscaled label window"
            );

            Array3::from_shape_fn((z, y, x), |(k, j, i)| {
                upscaled
                    .get((k + offset[0], j + offset[1], i + offset[2]))
                    .cloned()
                    .unwrap_or_else(<L::Elem as Zero>::zero)
            })
        };

        self.apply_mask(loaded, &label_data, &label_id, roi)
    }

    fn apply_mask<T, U>(
        &self,
        mut loaded: LoadedRegion<T>,
        label_data: &Array3<U>,
        label_id: &U,
        roi: &Roi,
    ) -> Result<LoadedRegion<T>, LoadError>
    where
        T: Clone + Zero,
        U: PartialEq,
    {
        let (z, y, x) = label_data.dim();
        if [z, y, x] != loaded.shape() {
            return Err(LoadError::LabelShapeMismatch {
                intensity: loaded.shape(),
                label: [z, y, x],
            });
        }

        let valid = label_data.map(|label| label == label_id);

        if self.mask_mode == MaskMode::Zero {
            Zip::from(&mut loaded.data)
                .and(&valid)
                .for_each(|value, &keep| {
                    if !keep {
                        *value = T::zero();
                    }
                });
        }

        let kept = valid.iter().filter(|&&v| v).count();
        debug!(
            roi = %roi.display_name(),
            kept,
            total = valid.len(),
            mode = ?self.mask_mode,
            "Applied label mask"
        );

        loaded.valid = Some(valid);
        Ok(loaded)
    }
}

fn read_checked<R: ArrayReader>(
    reader: &R,
    region: &PixelRegion,
) -> Result<Array3<R::Elem>, LoadError> {
    let data = reader.read_region(region)?;
    if data.shape() != &region.shape()[..] {
        return Err(LoadError::RegionShapeMismatch {
            store: reader.identifier().to_string(),
            expected: region.shape(),
            actual: data.shape().to_vec(),
        });
    }
    Ok(data)
}

fn clipped_shape(region: &PixelRegion, shape: [usize; 3]) -> [usize; 3] {
    Axis::ALL.map(|axis| {
        let range = region.axis(axis);
        range.end.min(shape[axis.index()]).saturating_sub(range.start)
    })
}
