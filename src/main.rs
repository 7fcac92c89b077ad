//! ngff-roi - ROI transforms and overlap resolution for OME-NGFF pyramids.
//!
//! This binary wraps the library for inspection and batch use on ROI tables.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ngff_roi::{
    check_anchored,
    config::{Cli, Command, EngineConfig, InspectConfig, RegionsConfig, ResolveConfig, ValidateConfig},
    reset_origin, validate_report, NgffImageMeta, OverlapResolver, PyramidMetadata, Roi,
    RoiTable,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Inspect(config) => run_inspect(config),
        Command::Validate(config) => run_validate(config),
        Command::Regions(config) => run_regions(config),
        Command::Resolve(config) => run_resolve(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "ngff_roi=debug"
    } else {
        "ngff_roi=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Log `message` and turn it into a failing exit code.
fn fail(message: impl std::fmt::Display) -> ExitCode {
    error!("{}", message);
    ExitCode::FAILURE
}

fn load_pyramid(zattrs: &std::path::Path, config: &EngineConfig) -> Result<PyramidMetadata, String> {
    let meta = NgffImageMeta::from_path(zattrs).map_err(|e| e.to_string())?;
    meta.to_pyramid(config.pyramid_tolerance)
        .map_err(|e| e.to_string())
}

fn load_rois(path: &std::path::Path) -> Result<Vec<Roi>, String> {
    RoiTable::read_from_path(path)
        .and_then(|table| table.to_rois())
        .map_err(|e| e.to_string())
}

// =============================================================================
// Inspect Command
// =============================================================================

fn run_inspect(config: InspectConfig) -> ExitCode {
    let engine = config.engine.engine_config();
    if let Err(e) = engine.validate() {
        return fail(format!("Configuration error: {e}"));
    }

    let pyramid = match load_pyramid(&config.zattrs, &engine) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    println!("Pyramid: {}", config.zattrs.display());
    println!("═════════════════════════════════");
    for level in pyramid.levels() {
        println!(
            "  level {}: pixel size {}  downsample {}",
            level.level_index, level.pixel_size, level.downsample
        );
    }
    println!();
    println!("Inexact pyramid: {}", pyramid.is_inexact());
    match pyramid.coarsening_xy() {
        Ok(Some(factor)) => println!("coarsening_xy: {factor}"),
        Ok(None) => println!("coarsening_xy: (single level)"),
        Err(e) => println!("coarsening_xy: unavailable ({e})"),
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Validate Command
// =============================================================================

fn run_validate(config: ValidateConfig) -> ExitCode {
    let table = match RoiTable::read_from_path(&config.table) {
        Ok(t) => t,
        Err(e) => return fail(e),
    };

    let rois = table.decode();

    let report = validate_report(&rois, config.image_extent);
    if report.is_valid() {
        println!("✓ {} ROI(s) valid", report.checked);
        return ExitCode::SUCCESS;
    }

    println!(
        "✗ {} of {} ROI(s) invalid",
        report.failures.len(),
        report.checked
    );
    for failure in &report.failures {
        println!("  {failure}");
    }
    ExitCode::FAILURE
}

// =============================================================================
// Regions Command
// =============================================================================

fn run_regions(config: RegionsConfig) -> ExitCode {
    let engine_config = config.engine.engine_config();
    if let Err(e) = engine_config.validate() {
        return fail(format!("Configuration error: {e}"));
    }

    let pyramid = match load_pyramid(&config.zattrs, &engine_config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let mut rois = match load_rois(&config.table) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };
    if config.reset_origin {
        rois = reset_origin(&rois);
    }

    let engine = engine_config.transform_engine(&pyramid);
    let conversions = match engine.convert_rois(&rois, config.level) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    if config.check_anchored {
        let regions: Vec<_> = conversions.iter().map(|c| c.region).collect();
        if let Err(e) = check_anchored(&regions) {
            return fail(e);
        }
    }

    for (roi, conversion) in rois.iter().zip(&conversions) {
        let [s_z, e_z, s_y, e_y, s_x, e_x] = conversion.region.to_indices();
        println!(
            "{}\t{s_z}\t{e_z}\t{s_y}\t{e_y}\t{s_x}\t{e_x}",
            roi.display_name()
        );
    }

    ExitCode::SUCCESS
}

// =============================================================================
// Resolve Command
// =============================================================================

fn run_resolve(config: ResolveConfig) -> ExitCode {
    let engine_config = config.engine.engine_config();
    if let Err(e) = engine_config.validate() {
        return fail(format!("Configuration error: {e}"));
    }

    let pyramid = match load_pyramid(&config.zattrs, &engine_config) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let rois = match load_rois(&config.table) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let resolver = match OverlapResolver::new(&pyramid, config.reference_level) {
        Ok(r) => r.with_max_passes(engine_config.max_passes),
        Err(e) => return fail(e),
    };
    let resolution = match resolver.resolve(&rois) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    for trim in &resolution.trims {
        info!(
            "Pass {}: trimmed {} | {} along {} at {}",
            trim.pass, trim.lower, trim.upper, trim.axis, trim.boundary
        );
    }

    let table = RoiTable::from_rois(&resolution.rois);
    let digest = match table.digest() {
        Ok(d) => d,
        Err(e) => return fail(e),
    };

    match config.output {
        Some(ref path) => {
            if let Err(e) = table.write_to_path(path) {
                return fail(e);
            }
        }
        None => match table.to_json_string() {
            Ok(json) => println!("{json}"),
            Err(e) => return fail(e),
        },
    }

    info!(
        "Resolved {} ROI(s) with {} trim(s) in {} pass(es)",
        resolution.rois.len(),
        resolution.trims.len(),
        resolution.passes
    );
    eprintln!("sha256: {digest}");

    ExitCode::SUCCESS
}
