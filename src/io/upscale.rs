//! Nearest-neighbour upscaling of label arrays.
//!
//! Label pyramids are often written starting at a coarser level than the
//! intensity data they annotate. Before masking, such a label region is
//! repeated by an integer factor along Y and X (or any chosen axes) so it
//! lines up with the intensity region pixel for pixel.

use ndarray::{Array3, ArrayView3};
use num_traits::Zero;

use crate::error::LoadError;
use crate::geometry::Axis;

/// Upscale `array` to `target_shape` by repeating elements along `axes`.
///
/// Along every axis in `axes`, the target size must be an integer multiple
/// of the source size. With `pad_with_zeros`, a non-multiple target is also
/// accepted: the array is repeated by the floor factor and the remainder is
/// filled with zeros. Axes not listed must keep their size.
///
/// # Errors
///
/// Returns `UpscaleMismatch` if a listed axis would shrink, a listed axis is
/// not an exact multiple (without padding), or an unlisted axis differs.
pub fn upscale_array<T>(
    array: ArrayView3<'_, T>,
    target_shape: [usize; 3],
    axes: &[Axis],
    pad_with_zeros: bool,
) -> Result<Array3<T>, LoadError>
where
    T: Clone + Zero,
{
    let (z, y, x) = array.dim();
    let source_shape = [z, y, x];
    let mismatch = |reason: String| LoadError::UpscaleMismatch {
        source_shape,
        target_shape,
        reason,
    };

    let mut factors = [1_usize; 3];
    for axis in Axis::ALL {
        let i = axis.index();
        let (source, target) = (source_shape[i], target_shape[i]);

        if !axes.contains(&axis) {
            if source != target {
                return Err(mismatch(format!(
                    "{axis} is not an upscaling axis but sizes differ ({source} vs {target})"
                )));
            }
            continue;
        }

        if source == 0 || target < source {
            return Err(mismatch(format!(
                "{axis} cannot be upscaled from {source} to {target}"
            )));
        }
        if target % source != 0 && !pad_with_zeros {
            return Err(mismatch(format!(
                "{axis} target size {target} is not a multiple of {source}"
            )));
        }
        factors[i] = target / source;
    }

    if factors == [1, 1, 1] && source_shape == target_shape {
        return Ok(array.to_owned());
    }

    let covered = [
        source_shape[0] * factors[0],
        source_shape[1] * factors[1],
        source_shape[2] * factors[2],
    ];

    Ok(Array3::from_shape_fn(
        (target_shape[0], target_shape[1], target_shape[2]),
        |(k, j, i)| {
            if k < covered[0] && j < covered[1] && i < covered[2] {
                array[[k / factors[0], j / factors[1], i / factors[2]]].clone()
            } else {
                T::zero()
            }
        },
    ))
}
