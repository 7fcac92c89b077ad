//! Property tests for transforms and overlap resolution.
//!
//! Tests verify:
//! - Index bounds stay within one pixel of the physical bounds
//! - No ROI ever converts to an empty region
//! - Regions moved between levels agree with direct conversion
//! - Resolved grids are overlap-free, order-independent and stable

use proptest::prelude::*;

use ngff_roi::overlap::DEFAULT_MAX_PASSES;
use ngff_roi::{Axis, OverlapResolver, Roi, TransformEngine};

use super::test_utils::{any_overlap, coarsening_pyramid};

const LEVELS: usize = 4;

fn roi_strategy(min_extent: f64) -> impl Strategy<Value = Roi> {
    (
        (0.0..1000.0f64, 0.0..1000.0f64, 0.0..20.0f64),
        (min_extent..400.0f64, min_extent..400.0f64, min_extent..10.0f64),
    )
        .prop_map(|((x, y, z), (len_x, len_y, len_z))| {
            Roi::from_xyz(x, y, z, len_x, len_y, len_z)
        })
}

/// `rows x cols` grid of 100 um tiles spaced 90 um apart, each shifted by up
/// to 10 um along Y and X.
fn jittered_grid() -> impl Strategy<Value = Vec<Roi>> {
    (1usize..=4, 1usize..=4)
        .prop_flat_map(|(rows, cols)| {
            (
                Just((rows, cols)),
                prop::collection::vec((0.0..10.0f64, 0.0..10.0f64), rows * cols),
            )
        })
        .prop_map(|((rows, cols), jitter)| {
            let mut rois = Vec::with_capacity(rows * cols);
            for row in 0..rows {
                for col in 0..cols {
                    let index = row * cols + col;
                    let (jy, jx) = jitter[index];
                    rois.push(
                        Roi::from_xyz(
                            col as f64 * 90.0 + jx,
                            row as f64 * 90.0 + jy,
                            0.0,
                            100.0,
                            100.0,
                            3.0,
                        )
                        .with_id(format!("FOV_{:02}", index + 1)),
                    );
                }
            }
            rois
        })
}

proptest! {
    #[test]
    fn prop_bounds_within_one_pixel(roi in roi_strategy(0.05), level in 0..LEVELS) {
        let pyramid = coarsening_pyramid(LEVELS);
        let engine = TransformEngine::new(&pyramid);
        let pixel = pyramid.pixel_size_at(level).unwrap();

        let region = engine.to_pixel_region(&roi, level).unwrap().region;
        for axis in Axis::ALL {
            let p = pixel[axis];
            let range = region.axis(axis);
            let start = range.start as f64 * p;
            let extent = range.len() as f64 * p;

            prop_assert!((start - roi.origin[axis]).abs() <= p / 2.0 + 1e-6);
            prop_assert!((extent - roi.extent[axis]).abs() <= p + 1e-6);
        }
    }

    #[test]
    fn prop_regions_never_empty(roi in roi_strategy(0.001), level in 0..LEVELS) {
        let pyramid = coarsening_pyramid(LEVELS);
        let engine = TransformEngine::new(&pyramid);

        let region = engine.to_pixel_region(&roi, level).unwrap().region;
        prop_assert!(region.shape().iter().all(|&n| n >= 1));
    }

    #[test]
    fn prop_reanchor_agrees_with_direct(
        roi in roi_strategy(20.0),
        fine in 0..LEVELS,
        step in 1..LEVELS,
    ) {
        let coarse = (fine + step).min(LEVELS - 1);
        let pyramid = coarsening_pyramid(LEVELS);
        let engine = TransformEngine::new(&pyramid);

        let fine_region = engine.to_pixel_region(&roi, fine).unwrap().region;
        let via_fine = engine.reanchor(&fine_region, coarse).unwrap().region;
        let direct = engine.to_pixel_region(&roi, coarse).unwrap().region;

        for axis in Axis::ALL {
            let (a, b) = (via_fine.axis(axis), direct.axis(axis));
            prop_assert!(a.start.abs_diff(b.start) <= 1);
            prop_assert!(a.end.abs_diff(b.end) <= 1);
        }
    }

    #[test]
    fn prop_resolved_grid_has_no_overlap(rois in jittered_grid(), level in 0..LEVELS) {
        let pyramid = coarsening_pyramid(LEVELS);
        let resolver = OverlapResolver::new(&pyramid, level).unwrap();

        let resolution = resolver.resolve(&rois).unwrap();
        prop_assert!(!any_overlap(&resolution.rois));
        prop_assert!(resolution.passes <= DEFAULT_MAX_PASSES);
        prop_assert_eq!(resolution.rois.len(), rois.len());
        prop_assert!(resolution.rois.iter().all(|r| r.extent.x > 0.0 && r.extent.y > 0.0));
    }

    #[test]
    fn prop_resolution_ignores_input_order(
        (rois, shuffled) in jittered_grid()
            .prop_flat_map(|rois| (Just(rois.clone()), Just(rois).prop_shuffle())),
    ) {
        let pyramid = coarsening_pyramid(LEVELS);
        let resolver = OverlapResolver::new(&pyramid, 1).unwrap();

        let a = resolver.resolve(&rois).unwrap();
        let b = resolver.resolve(&shuffled).unwrap();
        prop_assert_eq!(a.rois, b.rois);
    }

    #[test]
    fn prop_resolution_is_idempotent(rois in jittered_grid()) {
        let pyramid = coarsening_pyramid(LEVELS);
        let resolver = OverlapResolver::new(&pyramid, 0).unwrap();

        let first = resolver.resolve(&rois).unwrap();
        let second = resolver.resolve(&first.rois).unwrap();
        prop_assert!(second.is_unchanged());
        prop_assert_eq!(second.rois, first.rois);
    }
}
