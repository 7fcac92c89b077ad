//! Overlap detection and resolution for ROI sets sharing a reference level.
//!
//! - [`OverlapGraph`]: transient graph of pairwise-intersecting ROIs
//! - [`OverlapResolver`]: iterate-until-stable trimming with a pass cap

mod graph;
mod resolver;

pub use graph::{overlap_lengths, overlaps, OverlapEdge, OverlapGraph, OVERLAP_EPSILON};
pub use resolver::{OverlapResolver, Resolution, Trim, DEFAULT_MAX_PASSES};
