//! ROI table codec.
//!
//! An ROI table is an ordered sequence of records with a fixed column
//! schema (`x, y, z, len_x, len_y, len_z`, identifier, label) plus an
//! explicit physical unit and a schema version:
//!
//! ```json
//! {
//!   "schema_version": "1",
//!   "unit": "micrometer",
//!   "rois": [
//!     { "id": "FOV_1", "x": 0.0, "y": 0.0, "z": 0.0,
//!       "len_x": 416.0, "len_y": 351.0, "len_z": 2.0 }
//!   ]
//! }
//! ```
//!
//! Decoding is the ingestion boundary: every ROI is converted to
//! micrometers and validated (fail-slow) before it reaches the engine.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::TableError;
use crate::geometry::Vec3;
use crate::roi::{validate_all, Roi};

/// Schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: &str = "1";

/// Schema versions this crate can read.
pub const SUPPORTED_SCHEMA_VERSIONS: &[&str] = &["1"];

// =============================================================================
// Units
// =============================================================================

/// Physical unit of a table's coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalUnit {
    #[default]
    Micrometer,
    Nanometer,
    Millimeter,
}

impl PhysicalUnit {
    /// Number of micrometers in one unit.
    pub fn micrometers(self) -> f64 {
        match self {
            PhysicalUnit::Micrometer => 1.0,
            PhysicalUnit::Nanometer => 1e-3,
            PhysicalUnit::Millimeter => 1e3,
        }
    }
}

// =============================================================================
// Records
// =============================================================================

/// One row of an ROI table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub len_x: f64,
    pub len_y: f64,
    pub len_z: f64,
}

impl RoiRecord {
    fn from_roi(roi: &Roi, unit: PhysicalUnit) -> Self {
        let scale = unit.micrometers();
        Self {
            id: roi.id.clone(),
            label: roi.label.clone(),
            x: roi.origin.x / scale,
            y: roi.origin.y / scale,
            z: roi.origin.z / scale,
            len_x: roi.extent.x / scale,
            len_y: roi.extent.y / scale,
            len_z: roi.extent.z / scale,
        }
    }

    fn into_roi(self, unit: PhysicalUnit) -> Roi {
        let scale = unit.micrometers();
        Roi {
            id: self.id,
            label: self.label,
            origin: Vec3::new(self.z, self.y, self.x).map(|v| v * scale),
            extent: Vec3::new(self.len_z, self.len_y, self.len_x).map(|v| v * scale),
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// An ordered ROI table with an explicit unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiTable {
    pub schema_version: String,
    pub unit: PhysicalUnit,
    pub rois: Vec<RoiRecord>,
}

impl RoiTable {
    /// Encode ROIs (in micrometers) as a micrometer table.
    pub fn from_rois(rois: &[Roi]) -> Self {
        Self::from_rois_in(rois, PhysicalUnit::Micrometer)
    }

    /// Encode ROIs (in micrometers) as a table in `unit`.
    pub fn from_rois_in(rois: &[Roi], unit: PhysicalUnit) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            unit,
            rois: rois.iter().map(|r| RoiRecord::from_roi(r, unit)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rois.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Convert rows to ROIs in micrometers without validating them.
    pub fn decode(&self) -> Vec<Roi> {
        self.rois
            .iter()
            .cloned()
            .map(|r| r.into_roi(self.unit))
            .collect()
    }

    /// Decode to validated ROIs in micrometers, preserving row order.
    pub fn to_rois(&self) -> Result<Vec<Roi>, TableError> {
        self.to_rois_within(None)
    }

    /// Decode and validate against a physical image extent `(z, y, x)` in
    /// micrometers.
    ///
    /// Every row is checked before failing; the error lists all bad rows.
    pub fn to_rois_within(&self, image_extent: Option<Vec3>) -> Result<Vec<Roi>, TableError> {
        let rois = self.decode();
        validate_all(&rois, image_extent)?;
        Ok(rois)
    }

    /// Parse a table, checking the schema version before the rows.
    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| TableError::Parse(e.to_string()))?;

        let found = match value.get("schema_version") {
            Some(Value::String(version)) => version.clone(),
            Some(Value::Number(version)) => version.to_string(),
            Some(other) => {
                return Err(TableError::Parse(format!(
                    "schema_version must be a string, found {other}"
                )))
            }
            None => return Err(TableError::Parse("missing schema_version".to_string())),
        };

        if !SUPPORTED_SCHEMA_VERSIONS.contains(&found.as_str()) {
            return Err(TableError::SchemaVersionMismatch {
                found,
                supported: SUPPORTED_SCHEMA_VERSIONS
                    .iter()
                    .map(|v| v.to_string())
                    .collect(),
            });
        }

        let mut table: RoiTable =
            serde_json::from_value(value).map_err(|e| TableError::Parse(e.to_string()))?;
        table.schema_version = found;
        debug!(rows = table.len(), unit = ?table.unit, "Parsed ROI table");
        Ok(table)
    }

    pub fn to_json_string(&self) -> Result<String, TableError> {
        serde_json::to_string_pretty(self).map_err(|e| TableError::Parse(e.to_string()))
    }

    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| TableError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string()?)
            .map_err(|e| TableError::Io(format!("{}: {e}", path.display())))?;
        info!(rows = self.len(), path = %path.display(), "Wrote ROI table");
        Ok(())
    }

    /// Hex SHA-256 of the compact JSON encoding.
    ///
    /// Equal tables (same rows in the same order) have equal digests.
    pub fn digest(&self) -> Result<String, TableError> {
        let bytes = serde_json::to_vec(self).map_err(|e| TableError::Parse(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}
