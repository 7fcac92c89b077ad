//! Configuration management for ngff-roi.
//!
//! Two layers:
//! - [`EngineConfig`]: the tunables of the library (tolerances, pass cap,
//!   mask mode), usable without the CLI
//! - [`Cli`]: command-line arguments via clap, every tunable a subcommand
//!   uses also settable through an environment variable with the
//!   `NGFF_ROI_` prefix. No subcommand loads pixels, so the mask mode is
//!   library-only.
//!
//! # Environment Variables
//!
//! - `NGFF_ROI_PYRAMID_TOLERANCE` - Relative tolerance of pyramid checks (default: 1e-3)
//! - `NGFF_ROI_CLIP_TOLERANCE` - Fraction of a region clipping may remove (default: 0)
//! - `NGFF_ROI_MAX_PASSES` - Overlap resolution pass cap (default: 10)
//! - `NGFF_ROI_ZATTRS` - Path of the image group's `.zattrs`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::geometry::Vec3;
use crate::loader::{MaskMode, RegionLoader};
use crate::overlap::DEFAULT_MAX_PASSES;
use crate::pyramid::{PyramidMetadata, DEFAULT_PYRAMID_TOLERANCE};
use crate::transform::{TransformEngine, DEFAULT_CLIP_TOLERANCE};

/// Upper bound on the overlap pass cap.
pub const MAX_PASSES_LIMIT: usize = 1000;

// =============================================================================
// Engine Configuration
// =============================================================================

/// Tunables shared by the transform engine, resolver and loader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Relative tolerance for pyramid progression and integer-factor checks
    pub pyramid_tolerance: f64,

    /// Fraction of a region that clipping may remove without failing
    pub clip_tolerance: f64,

    /// Maximum detect/trim passes of the overlap resolver
    pub max_passes: usize,

    /// Treatment of pixels outside the requested label
    pub mask_mode: MaskMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pyramid_tolerance: DEFAULT_PYRAMID_TOLERANCE,
            clip_tolerance: DEFAULT_CLIP_TOLERANCE,
            max_passes: DEFAULT_MAX_PASSES,
            mask_mode: MaskMode::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.pyramid_tolerance.is_finite() || self.pyramid_tolerance < 0.0 {
            return Err("pyramid_tolerance must be a finite, non-negative number".to_string());
        }

        if !(0.0..=1.0).contains(&self.clip_tolerance) {
            return Err("clip_tolerance must be between 0 and 1".to_string());
        }

        if self.max_passes == 0 || self.max_passes > MAX_PASSES_LIMIT {
            return Err(format!(
                "max_passes must be between 1 and {MAX_PASSES_LIMIT}"
            ));
        }

        Ok(())
    }

    /// Transform engine over `pyramid` with this clip tolerance.
    pub fn transform_engine<'a>(&self, pyramid: &'a PyramidMetadata) -> TransformEngine<'a> {
        TransformEngine::new(pyramid).with_clip_tolerance(self.clip_tolerance)
    }

    /// Region loader over `pyramid` with this clip tolerance and mask mode.
    pub fn region_loader<'a>(&self, pyramid: &'a PyramidMetadata) -> RegionLoader<'a> {
        RegionLoader::new(self.transform_engine(pyramid)).with_mask_mode(self.mask_mode)
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// ngff-roi - ROI transforms and overlap resolution for OME-NGFF pyramids.
///
/// Converts physical-unit ROI tables to pixel regions at any pyramid level,
/// validates them and resolves overlaps between fields of view.
#[derive(Parser, Debug, Clone)]
#[command(name = "ngff-roi")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the pyramid levels described by an image group's `.zattrs`.
    Inspect(InspectConfig),

    /// Validate an ROI table, reporting every invalid row.
    Validate(ValidateConfig),

    /// Print the pixel region of every ROI at one pyramid level.
    Regions(RegionsConfig),

    /// Resolve overlaps in an ROI table and write the resolved table.
    Resolve(ResolveConfig),
}

/// Engine tunables shared by the subcommands.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Relative tolerance of pyramid progression checks.
    #[arg(long, default_value_t = DEFAULT_PYRAMID_TOLERANCE, env = "NGFF_ROI_PYRAMID_TOLERANCE")]
    pub pyramid_tolerance: f64,

    /// Fraction of a region that clipping to the image may remove.
    #[arg(long, default_value_t = DEFAULT_CLIP_TOLERANCE, env = "NGFF_ROI_CLIP_TOLERANCE")]
    pub clip_tolerance: f64,

    /// Maximum number of overlap resolution passes.
    #[arg(long, default_value_t = DEFAULT_MAX_PASSES, env = "NGFF_ROI_MAX_PASSES")]
    pub max_passes: usize,
}

impl EngineArgs {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            pyramid_tolerance: self.pyramid_tolerance,
            clip_tolerance: self.clip_tolerance,
            max_passes: self.max_passes,
            ..EngineConfig::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Path of the image group's `.zattrs` file.
    #[arg(env = "NGFF_ROI_ZATTRS")]
    pub zattrs: PathBuf,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateConfig {
    /// Path of the ROI table.
    pub table: PathBuf,

    /// Physical image extent `z,y,x` in micrometers.
    #[arg(long, value_parser = parse_vec3)]
    pub image_extent: Option<Vec3>,
}

#[derive(Args, Debug, Clone)]
pub struct RegionsConfig {
    /// Path of the ROI table.
    pub table: PathBuf,

    /// Path of the image group's `.zattrs` file.
    #[arg(long, env = "NGFF_ROI_ZATTRS")]
    pub zattrs: PathBuf,

    /// Pyramid level to convert to.
    #[arg(short, long, default_value_t = 0)]
    pub level: usize,

    /// Translate the ROIs so their minimum origin is zero first.
    #[arg(long, default_value_t = false)]
    pub reset_origin: bool,

    /// Fail unless the regions start at pixel 0 along Y and X.
    #[arg(long, default_value_t = false)]
    pub check_anchored: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveConfig {
    /// Path of the ROI table.
    pub table: PathBuf,

    /// Path of the image group's `.zattrs` file.
    #[arg(long, env = "NGFF_ROI_ZATTRS")]
    pub zattrs: PathBuf,

    /// Level whose pixel grid trims are snapped to.
    #[arg(long, default_value_t = 0)]
    pub reference_level: usize,

    /// Where to write the resolved table (stdout if omitted).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Parse `z,y,x` into a vector.
pub fn parse_vec3(value: &str) -> Result<Vec3, String> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in {value:?}: {e}"))?;

    match parts.as_slice() {
        [z, y, x] => Ok(Vec3::new(*z, *y, *x)),
        _ => Err(format!("expected three values z,y,x, got {value:?}")),
    }
}

// =============================================================================
// Tests
// =============================================================================
