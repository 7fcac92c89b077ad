//! Region loader integration tests.
//!
//! Tests verify:
//! - The loader requests exactly the converted region from the store
//! - Label masking zeroes or flags pixels without touching the store
//! - Coarse label arrays are upscaled before masking
//! - Misbehaving readers and out-of-image ROIs are reported as errors

use ndarray::Array3;

use ngff_roi::{
    InMemoryPyramid, LoadError, MaskMode, RegionLoader, Roi, TransformEngine, TransformError,
};

use super::test_utils::{fov_grid, gradient_store, two_level_pyramid, MisbehavingReader, TrackingReader};

/// Level 0 `[2, 80, 80]` labels: 7 for x < 40, background elsewhere.
fn half_labels() -> InMemoryPyramid<u32> {
    InMemoryPyramid::new(
        "mem://plate.zarr/B/03/0/labels/nuclei",
        vec![
            Array3::from_shape_fn((2, 80, 80), |(_, _, x)| if x < 40 { 7 } else { 0 }),
            Array3::from_shape_fn((2, 40, 40), |(_, _, x)| if x < 20 { 7 } else { 0 }),
        ],
    )
}

// =============================================================================
// Plain Loads
// =============================================================================

#[test]
fn test_loader_requests_exactly_the_converted_region() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = TrackingReader::new(gradient_store([2, 80, 80], 2));

    let roi = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 1.0);
    let loaded = loader.load(&roi, 1, &reader).unwrap();

    assert_eq!(reader.request_count(), 1);
    assert_eq!(reader.requests(), vec![loaded.region]);
    assert_eq!(loaded.region.to_indices(), [0, 1, 5, 15, 10, 30]);
    assert_eq!(loaded.shape(), [1, 10, 20]);

    // Values are level-0 coordinates y * 1000 + x
    assert_eq!(loaded.data[[0, 0, 0]], 10_020);
    assert_eq!(loaded.data[[0, 9, 19]], 28_058);
}

#[test]
fn test_each_field_of_view_loaded() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = TrackingReader::new(gradient_store([1, 80, 80], 2));

    for roi in fov_grid(2, 2, 20.0, 20.0, 1.0) {
        let loaded = loader.load(&roi, 0, &reader).unwrap();
        assert_eq!(loaded.shape(), [1, 40, 40]);

        let (y0, x0) = (loaded.region.y.start, loaded.region.x.start);
        assert_eq!(loaded.data[[0, 0, 0]], (y0 * 1000 + x0) as u32);
    }
    assert_eq!(reader.request_count(), 4);
}

#[test]
fn test_roi_outside_image_is_never_read() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = TrackingReader::new(gradient_store([1, 80, 80], 2));

    // Store covers 40 um along X
    let roi = Roi::from_xyz(100.0, 0.0, 0.0, 10.0, 10.0, 1.0);
    let err = loader.load(&roi, 0, &reader).unwrap_err();

    assert!(matches!(
        err,
        LoadError::Transform(TransformError::RoiOutsideImage { .. })
    ));
    assert_eq!(reader.request_count(), 0);
}

#[test]
fn test_misbehaving_reader_detected() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let roi = Roi::from_xyz(0.0, 0.0, 0.0, 10.0, 10.0, 1.0);

    match loader.load(&roi, 0, &MisbehavingReader).unwrap_err() {
        LoadError::RegionShapeMismatch {
            store,
            expected,
            actual,
        } => {
            assert_eq!(store, "broken://store");
            assert_eq!(expected, [1, 20, 20]);
            assert_eq!(actual, vec![1, 1, 1]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Masked Loads
// =============================================================================

#[test]
fn test_masked_load_zeroes_other_labels() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = TrackingReader::new(gradient_store([2, 80, 80], 2));

    // Level 0 x [20, 60): left half inside label 7
    let roi = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 1.0);
    let loaded = loader.load_masked(&roi, 0, &reader, &half_labels(), 7).unwrap();

    assert_eq!(loaded.shape(), [1, 20, 40]);
    assert_eq!(loaded.num_valid(), Some(400));
    assert_eq!(loaded.data[[0, 0, 5]], 10_025);
    assert_eq!(loaded.data[[0, 0, 25]], 0);
    assert_eq!(reader.request_count(), 1);

    // Store keeps the original values
    let stored = reader.inner().level(0).unwrap();
    assert_eq!(stored[[0, 10, 45]], 10_045);
}

#[test]
fn test_masked_load_mark_invalid_keeps_values() {
    let pyramid = two_level_pyramid();
    let loader =
        RegionLoader::new(TransformEngine::new(&pyramid)).with_mask_mode(MaskMode::MarkInvalid);
    let reader = gradient_store([2, 80, 80], 2);

    let roi = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 1.0);
    let loaded = loader.load_masked(&roi, 0, &reader, &half_labels(), 7).unwrap();

    assert_eq!(loaded.data[[0, 0, 25]], 10_045);
    let valid = loaded.valid.as_ref().unwrap();
    assert!(valid[[0, 0, 5]]);
    assert!(!valid[[0, 0, 25]]);
}

#[test]
fn test_coarse_labels_match_fine_labels() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = gradient_store([2, 80, 80], 2);
    let labels = half_labels();

    let roi = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 1.0);
    let fine = loader.load_masked(&roi, 0, &reader, &labels, 7).unwrap();
    let upscaled = loader
        .load_masked_upscaled(&roi, 0, &reader, &labels, 1, 7)
        .unwrap();

    assert_eq!(upscaled.shape(), fine.shape());
    assert_eq!(upscaled.valid, fine.valid);
    assert_eq!(upscaled.data, fine.data);
}

#[test]
fn test_coarse_labels_aligned_for_odd_region_start() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = gradient_store([2, 80, 80], 2);
    let labels = half_labels();

    // Level 0 x [21, 61) starts halfway through coarse column 10
    let roi = Roi::from_xyz(10.5, 5.0, 0.0, 20.0, 10.0, 1.0);
    let fine = loader.load_masked(&roi, 0, &reader, &labels, 7).unwrap();
    let upscaled = loader
        .load_masked_upscaled(&roi, 0, &reader, &labels, 1, 7)
        .unwrap();

    assert_eq!(fine.region.x.start, 21);
    assert_eq!(fine.num_valid(), Some(380));
    assert_eq!(upscaled.valid, fine.valid);
    assert_eq!(upscaled.data, fine.data);
    assert_eq!(upscaled.data[[0, 0, 18]], 10_039);
    assert_eq!(upscaled.data[[0, 0, 19]], 0);
}

#[test]
fn test_label_store_too_small() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = gradient_store([1, 80, 80], 2);
    let labels = InMemoryPyramid::single("labels", Array3::<u32>::zeros((1, 40, 40)));

    let roi = Roi::from_xyz(10.0, 10.0, 0.0, 20.0, 20.0, 1.0);
    match loader.load_masked(&roi, 0, &reader, &labels, 1).unwrap_err() {
        LoadError::LabelShapeMismatch { intensity, label } => {
            assert_eq!(intensity, [1, 40, 40]);
            assert_eq!(label, [1, 20, 20]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// =============================================================================
// Planes
// =============================================================================

#[test]
fn test_single_plane_drops_z() {
    let pyramid = two_level_pyramid();
    let loader = RegionLoader::new(TransformEngine::new(&pyramid));
    let reader = gradient_store([2, 80, 80], 2);

    let roi = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 1.0);
    let plane = loader
        .load_masked(&roi, 0, &reader, &half_labels(), 7)
        .unwrap()
        .into_2d()
        .unwrap();
    assert_eq!(plane.data.dim(), (20, 40));
    assert_eq!(plane.valid.unwrap().dim(), (20, 40));

    let volume = Roi::from_xyz(10.0, 5.0, 0.0, 20.0, 10.0, 2.0);
    let loaded = loader.load(&volume, 0, &reader).unwrap();
    assert!(matches!(
        loaded.into_2d(),
        Err(LoadError::NotTwoDimensional { z: 2 })
    ));
}
