//! Coordinate transform integration tests.
//!
//! Tests verify:
//! - ROI to pixel-region conversion at several levels
//! - Sub-pixel ROIs at coarse levels become 1-pixel regions
//! - Re-anchoring through physical units stays within one pixel
//! - Stage-coordinate tables are re-anchored before conversion
//! - Pyramids built from `.zattrs` drive the same conversions

use ngff_roi::{
    check_anchored, reset_origin, Axis, NgffImageMeta, PixelRegion, Roi, TransformEngine,
    TransformError, TransformWarning, Vec3,
};

use super::test_utils::{coarsening_pyramid, fov_grid, two_level_pyramid, zattrs_json};

// =============================================================================
// Level Conversion
// =============================================================================

#[test]
fn test_roi_converted_at_each_level() {
    let pyramid = two_level_pyramid();
    let engine = TransformEngine::new(&pyramid);
    let roi = Roi::new(Vec3::new(0.0, 10.0, 10.0), Vec3::new(2.0, 20.0, 20.0));

    let level1 = engine.to_pixel_region(&roi, 1).unwrap().region;
    assert_eq!(level1.to_string(), "level 1 z:[0, 2) y:[10, 30) x:[10, 30)");

    let level0 = engine.to_pixel_region(&roi, 0).unwrap().region;
    assert_eq!(level0.to_string(), "level 0 z:[0, 2) y:[20, 60) x:[20, 60)");
}

#[test]
fn test_half_pixel_bounds_round_to_even() {
    let pyramid = coarsening_pyramid(3);
    let engine = TransformEngine::new(&pyramid);

    // Level 2 pixel is 2 um: 5 / 2 = 2.5 -> 2, 13 / 2 = 6.5 -> 6
    let roi = Roi::from_xyz(5.0, 7.0, 0.0, 8.0, 8.0, 1.0);
    let region = engine.to_pixel_region(&roi, 2).unwrap().region;
    assert_eq!(region.x.start, 2);
    assert_eq!(region.x.end, 6);

    // 7 / 2 = 3.5 -> 4, 15 / 2 = 7.5 -> 8
    assert_eq!(region.y.start, 4);
    assert_eq!(region.y.end, 8);
}

#[test]
fn test_sub_pixel_roi_at_coarse_level() {
    let pyramid = coarsening_pyramid(5);
    let engine = TransformEngine::new(&pyramid);
    // 2 um wide, level 4 pixel is 8 um
    let roi = Roi::from_xyz(41.0, 40.0, 0.0, 2.0, 2.0, 1.0).with_id("nucleus_17");

    let conversion = engine.to_pixel_region(&roi, 4).unwrap();
    let region = conversion.region;
    assert_eq!(region.shape(), [1, 1, 1]);
    assert_eq!(region.x.start, 5);
    assert_eq!(conversion.warnings.len(), 2);

    let axes: Vec<Axis> = conversion
        .warnings
        .iter()
        .map(|w| match w {
            TransformWarning::SubPixelRoi { axis, roi, .. } => {
                assert_eq!(roi, "nucleus_17");
                *axis
            }
            other => panic!("unexpected warning: {other:?}"),
        })
        .collect();
    assert_eq!(axes, vec![Axis::Y, Axis::X]);
}

#[test]
fn test_sub_pixel_roi_at_image_edge() {
    let pyramid = two_level_pyramid().with_shapes(vec![[1, 200, 200], [1, 100, 100]]).unwrap();
    let engine = TransformEngine::new(&pyramid);
    // Inside the image, but both bounds round to the far edge at level 1
    let roi = Roi::from_xyz(99.7, 10.0, 0.0, 0.2, 5.0, 1.0).with_id("border_cell");

    let conversion = engine.to_pixel_region(&roi, 1).unwrap();
    assert_eq!(conversion.region.x.start, 99);
    assert_eq!(conversion.region.x.end, 100);
    assert!(matches!(
        conversion.warnings.as_slice(),
        [TransformWarning::SubPixelRoi { axis: Axis::X, .. }]
    ));
}

#[test]
fn test_clip_tolerance_controls_partial_rois() {
    let pyramid = two_level_pyramid().with_shapes(vec![[1, 200, 200], [1, 100, 100]]).unwrap();
    // About a tenth of the ROI lies beyond the right edge
    let roi = Roi::from_xyz(90.0, 0.0, 0.0, 100.0 / 9.0, 50.0, 1.0);

    let strict = TransformEngine::new(&pyramid);
    assert!(matches!(
        strict.to_pixel_region(&roi, 1),
        Err(TransformError::RoiOutsideImage { level: 1, .. })
    ));

    let lenient = TransformEngine::new(&pyramid).with_clip_tolerance(0.2);
    let conversion = lenient.to_pixel_region(&roi, 1).unwrap();
    assert_eq!(conversion.region.x.end, 100);
    assert!(matches!(
        conversion.warnings.as_slice(),
        [TransformWarning::Clipped { .. }]
    ));
}

// =============================================================================
// Re-anchoring
// =============================================================================

#[test]
fn test_reanchor_matches_direct_conversion() {
    let pyramid = coarsening_pyramid(4);
    let engine = TransformEngine::new(&pyramid);
    let roi = Roi::from_xyz(123.4, 56.7, 0.0, 210.3, 98.1, 3.0);

    let fine = engine.to_pixel_region(&roi, 0).unwrap().region;
    for level in 1..4 {
        let via_fine = engine.reanchor(&fine, level).unwrap().region;
        let direct = engine.to_pixel_region(&roi, level).unwrap().region;

        for axis in Axis::ALL {
            let (a, b) = (via_fine.axis(axis), direct.axis(axis));
            assert!(a.start.abs_diff(b.start) <= 1, "start differs at level {level}");
            assert!(a.end.abs_diff(b.end) <= 1, "end differs at level {level}");
        }
    }
}

#[test]
fn test_to_physical_inverts_exact_regions() {
    let pyramid = coarsening_pyramid(3);
    let engine = TransformEngine::new(&pyramid);
    let region = PixelRegion::from_indices(1, [0, 3, 10, 20, 4, 8]).unwrap();

    let roi = engine.to_physical(&region).unwrap();
    assert_eq!(roi.origin, Vec3::new(0.0, 10.0, 4.0));
    assert_eq!(roi.extent, Vec3::new(3.0, 10.0, 4.0));
    assert_eq!(engine.to_pixel_region(&roi, 1).unwrap().region, region);
}

// =============================================================================
// Stage Coordinates
// =============================================================================

#[test]
fn test_stage_coordinates_reanchored() {
    let pyramid = two_level_pyramid();
    let engine = TransformEngine::new(&pyramid);

    let stage: Vec<Roi> = fov_grid(2, 2, 100.0, 100.0, 1.0)
        .into_iter()
        .map(|roi| roi.translated(Vec3::new(0.0, 1520.0, -830.0)))
        .collect();

    // Negative stage positions are not valid image coordinates
    assert!(engine.convert_rois(&stage, 0).is_err());

    let anchored = reset_origin(&stage);
    let regions: Vec<PixelRegion> = engine
        .convert_rois(&anchored, 0)
        .unwrap()
        .into_iter()
        .map(|c| c.region)
        .collect();
    assert!(check_anchored(&regions).is_ok());
    assert_eq!(regions[3].to_indices(), [0, 1, 200, 400, 200, 400]);
}

#[test]
fn test_unanchored_regions_detected() {
    let pyramid = two_level_pyramid();
    let engine = TransformEngine::new(&pyramid);

    let shifted: Vec<Roi> = fov_grid(1, 2, 100.0, 100.0, 1.0)
        .into_iter()
        .map(|roi| roi.translated(Vec3::new(0.0, 50.0, 0.0)))
        .collect();
    let regions: Vec<PixelRegion> = engine
        .convert_rois(&shifted, 0)
        .unwrap()
        .into_iter()
        .map(|c| c.region)
        .collect();

    assert!(matches!(
        check_anchored(&regions),
        Err(TransformError::UnanchoredRegions { min_y: 100, min_x: 0 })
    ));
}

// =============================================================================
// NGFF Metadata
// =============================================================================

#[test]
fn test_pyramid_from_zattrs() {
    let meta = NgffImageMeta::from_json_str(&zattrs_json(1.0, 0.1625, 5)).unwrap();
    let pyramid = meta.to_pyramid(1e-3).unwrap();

    assert_eq!(pyramid.num_levels(), 5);
    assert_eq!(pyramid.coarsening_xy().unwrap(), Some(2));
    assert!(!pyramid.is_inexact());

    let factor = pyramid.scale_factor(0, 3).unwrap();
    assert!((factor.x - 8.0).abs() < 1e-9);
    assert!((factor.z - 1.0).abs() < 1e-9);

    let engine = TransformEngine::new(&pyramid);
    let fov = Roi::from_xyz(416.0, 0.0, 0.0, 416.0, 351.0, 2.0);
    let region = engine.to_pixel_region(&fov, 0).unwrap().region;
    assert_eq!(region.to_indices(), [0, 2, 0, 2160, 2560, 5120]);
}

#[test]
fn test_pyramid_from_zattrs_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".zattrs");
    std::fs::write(&path, zattrs_json(1.0, 0.5, 2)).unwrap();

    let meta = NgffImageMeta::from_path(&path).unwrap();
    assert_eq!(meta.num_levels().unwrap(), 2);
    assert_eq!(meta.to_pyramid(1e-3).unwrap().pixel_size_at(1).unwrap(), Vec3::new(1.0, 1.0, 1.0));
}
