//! Overlap resolution.
//!
//! # Algorithm
//!
//! The resolver is an explicit state machine with a hard pass cap:
//!
//! ```text
//! Detect(pass) --graph empty--> Done
//!      |
//!      +--edges--> Trim(pass, graph) --> Detect(pass + 1)
//!                                   \--pass == max--> UnresolvableOverlap
//! ```
//!
//! ROIs are sorted into canonical order first, so edges are visited in the
//! same order whatever the input order. Each edge is re-tested against the
//! current (partially trimmed) set before trimming.
//!
//! A trim picks the axis of thinnest overlap, ignoring axes where both ROIs
//! span the same range (Z for every field of view of a stack). Ties prefer
//! X, then Y, then Z. The cut is placed at the overlap midpoint snapped to
//! the reference level's pixel grid with banker's rounding, so both ROIs end
//! up exactly adjacent.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::OverlapError;
use crate::geometry::{Axis, Vec3};
use crate::pyramid::PyramidMetadata;
use crate::roi::{validate_all, Roi};
use crate::transform::round_half_even;

use super::graph::{overlap_lengths, OverlapGraph, OVERLAP_EPSILON};

/// Default cap on detect/trim passes.
pub const DEFAULT_MAX_PASSES: usize = 10;

/// Axis preference when overlaps are equally thin.
const TIE_ORDER: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

// =============================================================================
// Results
// =============================================================================

/// One trim applied to an overlapping pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Trim {
    /// ROI whose upper bound moved down
    pub lower: String,
    /// ROI whose lower bound moved up
    pub upper: String,
    pub axis: Axis,
    /// Shared boundary after the trim
    pub boundary: f64,
    /// Total extent removed from both ROIs along `axis`
    pub removed: f64,
    /// 1-based pass number
    pub pass: usize,
}

/// Outcome of resolving one ROI set.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Non-overlapping ROIs in canonical order
    pub rois: Vec<Roi>,
    pub trims: Vec<Trim>,
    /// Number of passes that trimmed something
    pub passes: usize,
}

impl Resolution {
    /// Whether the input set had no overlap to begin with.
    pub fn is_unchanged(&self) -> bool {
        self.trims.is_empty()
    }

    pub fn total_trimmed(&self) -> f64 {
        self.trims.iter().map(|t| t.removed).sum()
    }
}

enum State {
    Detect { pass: usize },
    Trim { pass: usize, graph: OverlapGraph },
    Done { passes: usize },
}

// =============================================================================
// Overlap Resolver
// =============================================================================

/// Restores the no-overlap invariant on ROI sets sharing a reference level.
#[derive(Debug, Clone, Copy)]
pub struct OverlapResolver<'a> {
    pyramid: &'a PyramidMetadata,
    reference_level: usize,
    max_passes: usize,
}

impl<'a> OverlapResolver<'a> {
    /// Create a resolver snapping cuts to the grid of `reference_level`.
    pub fn new(pyramid: &'a PyramidMetadata, reference_level: usize) -> Result<Self, OverlapError> {
        pyramid.level(reference_level)?;
        Ok(Self {
            pyramid,
            reference_level,
            max_passes: DEFAULT_MAX_PASSES,
        })
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn reference_level(&self) -> usize {
        self.reference_level
    }

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    /// Resolve overlaps in `rois`, returning a new set.
    ///
    /// The input is never modified. The output is sorted in canonical order
    /// (see [`Roi::canonical_cmp`]), so any permutation of the same input
    /// yields the same output.
    ///
    /// # Errors
    ///
    /// - `Roi` if any input ROI breaks its invariants (all are reported)
    /// - `UnresolvableOverlap` if overlaps persist after `max_passes` passes
    /// - `OverlapResolutionDegenerate` if a trim would leave an ROI with a
    ///   non-positive extent
    pub fn resolve(&self, rois: &[Roi]) -> Result<Resolution, OverlapError> {
        validate_all(rois, None)?;
        let pixel = self.pyramid.pixel_size_at(self.reference_level)?;

        let mut current = rois.to_vec();
        current.sort_by(Roi::canonical_cmp);
        let mut trims = Vec::new();

        let mut state = State::Detect { pass: 1 };
        let passes = loop {
            state = match state {
                State::Detect { pass } => {
                    let graph = OverlapGraph::build(&current);
                    if graph.is_empty() {
                        State::Done { passes: pass - 1 }
                    } else if pass > self.max_passes {
                        let names = graph
                            .involved()
                            .into_iter()
                            .map(|i| current[i].display_name())
                            .collect();
                        return Err(OverlapError::UnresolvableOverlap {
                            passes: self.max_passes,
                            rois: names,
                        });
                    } else {
                        debug!(pass, edges = graph.num_edges(), "Detected overlaps");
                        State::Trim { pass, graph }
                    }
                }
                State::Trim { pass, graph } => {
                    for edge in graph.edges() {
                        let trim = self.trim_pair(&mut current, edge.a, edge.b, pixel, pass)?;
                        trims.extend(trim);
                    }
                    State::Detect { pass: pass + 1 }
                }
                State::Done { passes } => break passes,
            };
        };

        check_resolved(&current)?;

        if trims.is_empty() {
            debug!(rois = current.len(), "No overlaps to resolve");
        } else {
            info!(
                rois = current.len(),
                trims = trims.len(),
                passes,
                "Resolved overlapping ROIs"
            );
        }

        Ok(Resolution {
            rois: current,
            trims,
            passes,
        })
    }

    /// Resolve many unrelated ROI sets in parallel.
    ///
    /// Results are returned in input order; a failing set does not affect
    /// the others.
    pub fn resolve_batch(&self, sets: &[Vec<Roi>]) -> Vec<Result<Resolution, OverlapError>> {
        sets.par_iter().map(|rois| self.resolve(rois)).collect()
    }

    fn trim_pair(
        &self,
        rois: &mut [Roi],
        i: usize,
        j: usize,
        pixel: Vec3,
        pass: usize,
    ) -> Result<Option<Trim>, OverlapError> {
        // Earlier trims in this pass may already have separated the pair.
        let Some(overlap) = overlap_lengths(&rois[i], &rois[j]) else {
            return Ok(None);
        };

        let axis = trim_axis(&rois[i], &rois[j], overlap);
        let (lower, upper) = order_along(rois, i, j, axis);

        let overlap_start = rois[upper].origin[axis];
        let overlap_end = rois[lower].end(axis).min(rois[upper].end(axis));
        let midpoint = 0.5 * (overlap_start + overlap_end);

        // Snapping may leave the overlap interval; clamping keeps both ROIs
        // from growing.
        let size = pixel[axis];
        let boundary = (round_half_even(midpoint / size) * size).clamp(overlap_start, overlap_end);

        let lower_start = rois[lower].origin[axis];
        let upper_end = rois[upper].end(axis);

        for (roi, other, extent) in [
            (lower, upper, boundary - lower_start),
            (upper, lower, upper_end - boundary),
        ] {
            if extent <= OVERLAP_EPSILON {
                warn!(
                    roi = %rois[roi].display_name(),
                    other = %rois[other].display_name(),
                    %axis,
                    extent,
                    "Trim would leave a non-positive extent"
                );
                return Err(OverlapError::OverlapResolutionDegenerate {
                    roi: rois[roi].display_name(),
                    other: rois[other].display_name(),
                    axis,
                    extent,
                });
            }
        }

        let removed = (rois[lower].end(axis) - boundary) + (boundary - overlap_start);
        rois[lower] = rois[lower].with_axis_range(axis, lower_start, boundary);
        rois[upper] = rois[upper].with_axis_range(axis, boundary, upper_end);

        let trim = Trim {
            lower: rois[lower].display_name(),
            upper: rois[upper].display_name(),
            axis,
            boundary,
            removed,
            pass,
        };
        debug!(
            lower = %trim.lower,
            upper = %trim.upper,
            %axis,
            boundary,
            "Trimmed overlapping pair"
        );
        Ok(Some(trim))
    }
}

/// Axis of thinnest overlap, skipping axes where both ranges coincide.
fn trim_axis(a: &Roi, b: &Roi, overlap: Vec3) -> Axis {
    let same_range = |axis: Axis| {
        (a.origin[axis] - b.origin[axis]).abs() <= OVERLAP_EPSILON
            && (a.end(axis) - b.end(axis)).abs() <= OVERLAP_EPSILON
    };

    thinnest(overlap, TIE_ORDER.into_iter().filter(|&axis| !same_range(axis)))
        .or_else(|| thinnest(overlap, TIE_ORDER.into_iter()))
        .unwrap_or(Axis::X)
}

fn thinnest(overlap: Vec3, candidates: impl Iterator<Item = Axis>) -> Option<Axis> {
    candidates.reduce(|best, axis| {
        if overlap[axis] < overlap[best] {
            axis
        } else {
            best
        }
    })
}

/// `(lower, upper)` along `axis`: smaller start first, then smaller end,
/// then canonical position.
fn order_along(rois: &[Roi], i: usize, j: usize, axis: Axis) -> (usize, usize) {
    let key = |k: usize| (rois[k].origin[axis], rois[k].end(axis));
    let (ki, kj) = (key(i), key(j));

    let i_first = ki.0 < kj.0 || (ki.0 == kj.0 && (ki.1 < kj.1 || (ki.1 == kj.1 && i < j)));
    if i_first {
        (i, j)
    } else {
        (j, i)
    }
}

fn check_resolved(rois: &[Roi]) -> Result<(), OverlapError> {
    let graph = OverlapGraph::build(rois);
    if !graph.is_empty() {
        return Err(OverlapError::UnresolvableOverlap {
            passes: 0,
            rois: graph
                .involved()
                .into_iter()
                .map(|i| rois[i].display_name())
                .collect(),
        });
    }

    for (index, roi) in rois.iter().enumerate() {
        if let Some(axis) = Axis::ALL
            .into_iter()
            .find(|&axis| roi.extent[axis] <= OVERLAP_EPSILON)
        {
            let other = rois
                .get(index + 1)
                .or_else(|| index.checked_sub(1).and_then(|k| rois.get(k)))
                .map(Roi::display_name)
                .unwrap_or_default();
            return Err(OverlapError::OverlapResolutionDegenerate {
                roi: roi.display_name(),
                other,
                axis,
                extent: roi.extent[axis],
            });
        }
    }

    Ok(())
}
