//! ROI table integration tests.
//!
//! Tests verify:
//! - Tables written to disk drive resolution and come back unchanged
//! - Non-micrometer tables are converted at ingestion
//! - Unsupported schema versions and invalid rows are rejected with detail

use ngff_roi::{
    OverlapResolver, PhysicalUnit, RoiError, RoiTable, TableError, TransformEngine, Vec3,
};

use super::test_utils::{any_overlap, coarsening_pyramid, fov_grid, two_level_pyramid};

// =============================================================================
// File Pipeline
// =============================================================================

#[test]
fn test_resolve_table_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("FOV_ROI_table.json");
    let output = dir.path().join("FOV_ROI_table_resolved.json");

    RoiTable::from_rois(&fov_grid(2, 2, 100.0, 90.0, 1.0))
        .write_to_path(&input)
        .unwrap();

    let pyramid = coarsening_pyramid(3);
    let resolver = OverlapResolver::new(&pyramid, 0).unwrap();

    let rois = RoiTable::read_from_path(&input).unwrap().to_rois().unwrap();
    assert!(any_overlap(&rois));
    let resolution = resolver.resolve(&rois).unwrap();

    let resolved = RoiTable::from_rois(&resolution.rois);
    resolved.write_to_path(&output).unwrap();

    let read_back = RoiTable::read_from_path(&output).unwrap();
    assert_eq!(read_back, resolved);
    assert_eq!(read_back.digest().unwrap(), resolved.digest().unwrap());
    assert_eq!(read_back.to_rois().unwrap(), resolution.rois);

    // Second run over the resolved table changes nothing
    let again = resolver.resolve(&read_back.to_rois().unwrap()).unwrap();
    assert!(again.is_unchanged());
    assert_eq!(
        RoiTable::from_rois(&again.rois).digest().unwrap(),
        resolved.digest().unwrap()
    );
}

#[test]
fn test_missing_table_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = RoiTable::read_from_path(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, TableError::Io(_)));
}

// =============================================================================
// Units
// =============================================================================

#[test]
fn test_nanometer_table_converted() {
    let json = r#"{
        "schema_version": "1",
        "unit": "nanometer",
        "rois": [
            {"id": "cell_1", "x": 1500, "y": 1500, "z": 0, "len_x": 2000, "len_y": 2000, "len_z": 1000}
        ]
    }"#;

    let table = RoiTable::from_json_str(json).unwrap();
    assert_eq!(table.unit, PhysicalUnit::Nanometer);

    let rois = table.to_rois().unwrap();
    assert!((rois[0].origin.x - 1.5).abs() < 1e-12);
    assert!((rois[0].extent.z - 1.0).abs() < 1e-12);

    let pyramid = two_level_pyramid();
    let region = TransformEngine::new(&pyramid)
        .to_pixel_region(&rois[0], 0)
        .unwrap()
        .region;
    assert_eq!(region.to_indices(), [0, 1, 3, 7, 3, 7]);
}

#[test]
fn test_millimeter_output_reads_back() {
    let rois = fov_grid(1, 2, 100.0, 100.0, 1.0);
    let table = RoiTable::from_rois_in(&rois, PhysicalUnit::Millimeter);
    assert!((table.rois[1].x - 0.1).abs() < 1e-12);

    let json = table.to_json_string().unwrap();
    let decoded = RoiTable::from_json_str(&json).unwrap().to_rois().unwrap();
    for (a, b) in decoded.iter().zip(&rois) {
        assert_eq!(a.id, b.id);
        assert!((a.origin.x - b.origin.x).abs() < 1e-9);
        assert!((a.extent.y - b.extent.y).abs() < 1e-9);
    }
}

// =============================================================================
// Rejection
// =============================================================================

#[test]
fn test_future_schema_file_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.json");
    std::fs::write(
        &path,
        r#"{"schema_version": "2", "unit": "micrometer", "rois": [], "shapes": {}}"#,
    )
    .unwrap();

    match RoiTable::read_from_path(&path).unwrap_err() {
        TableError::SchemaVersionMismatch { found, supported } => {
            assert_eq!(found, "2");
            assert_eq!(supported, vec!["1".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_numeric_schema_version_accepted() {
    let table =
        RoiTable::from_json_str(r#"{"schema_version": 1, "unit": "micrometer", "rois": []}"#)
            .unwrap();
    assert_eq!(table.schema_version, "1");
    assert!(table.is_empty());
}

#[test]
fn test_every_bad_row_reported() {
    let json = r#"{
        "schema_version": "1",
        "unit": "micrometer",
        "rois": [
            {"id": "ok", "x": 0, "y": 0, "z": 0, "len_x": 10, "len_y": 10, "len_z": 1},
            {"id": "flat", "x": 20, "y": 0, "z": 0, "len_x": -5, "len_y": 10, "len_z": 1},
            {"id": "stage", "x": -1, "y": 0, "z": 0, "len_x": 10, "len_y": 10, "len_z": 1}
        ]
    }"#;
    let table = RoiTable::from_json_str(json).unwrap();

    // Decoding alone does not validate
    assert_eq!(table.decode().len(), 3);

    match table.to_rois().unwrap_err() {
        TableError::Roi(RoiError::InvalidRoiSet { failures }) => {
            let indices: Vec<usize> = failures.iter().map(|f| f.index).collect();
            assert_eq!(indices, vec![1, 2]);
            assert_eq!(failures[0].roi, "flat");
            assert_eq!(failures[1].roi, "stage");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_rows_checked_against_image_extent() {
    let table = RoiTable::from_rois(&fov_grid(1, 2, 100.0, 100.0, 1.0));

    assert!(table.to_rois_within(Some(Vec3::new(1.0, 100.0, 200.0))).is_ok());
    assert!(matches!(
        table.to_rois_within(Some(Vec3::new(1.0, 100.0, 150.0))),
        Err(TableError::Roi(RoiError::InvalidRoiSet { .. }))
    ));
}
