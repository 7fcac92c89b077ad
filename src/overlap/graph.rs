//! Pairwise overlap detection.

use crate::geometry::{Axis, Vec3};
use crate::roi::Roi;

/// Overlap lengths at or below this value count as touching, not overlapping.
pub const OVERLAP_EPSILON: f64 = 1e-9;

/// Per-axis intersection lengths of two ROIs.
///
/// Returns `None` unless the cuboids intersect with positive volume, i.e.
/// unless they overlap by more than [`OVERLAP_EPSILON`] along every axis.
pub fn overlap_lengths(a: &Roi, b: &Roi) -> Option<Vec3> {
    let mut lengths = Vec3::default();
    for axis in Axis::ALL {
        let start = a.origin[axis].max(b.origin[axis]);
        let end = a.end(axis).min(b.end(axis));
        let length = end - start;
        if length <= OVERLAP_EPSILON {
            return None;
        }
        lengths[axis] = length;
    }
    Some(lengths)
}

/// Whether two ROIs intersect with positive volume.
pub fn overlaps(a: &Roi, b: &Roi) -> bool {
    overlap_lengths(a, b).is_some()
}

/// An edge between two overlapping ROIs, by index into the input set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapEdge {
    /// Smaller index
    pub a: usize,
    /// Larger index
    pub b: usize,
    pub overlap: Vec3,
}

/// Undirected graph of pairwise-intersecting ROIs.
///
/// Built by an O(n²) bounding-box sweep; ROI sets are small (one ROI per
/// field of view of a well). Edges are ordered by `(a, b)`, so visiting them
/// in order is deterministic for a given ROI order.
#[derive(Debug, Clone, Default)]
pub struct OverlapGraph {
    edges: Vec<OverlapEdge>,
}

impl OverlapGraph {
    pub fn build(rois: &[Roi]) -> Self {
        let mut edges = Vec::new();
        for (a, first) in rois.iter().enumerate() {
            for (offset, second) in rois[a + 1..].iter().enumerate() {
                if let Some(overlap) = overlap_lengths(first, second) {
                    edges.push(OverlapEdge {
                        a,
                        b: a + 1 + offset,
                        overlap,
                    });
                }
            }
        }
        Self { edges }
    }

    pub fn edges(&self) -> &[OverlapEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Indices of the ROIs overlapping ROI `index`.
    pub fn neighbors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.edges.iter().filter_map(move |edge| {
            if edge.a == index {
                Some(edge.b)
            } else if edge.b == index {
                Some(edge.a)
            } else {
                None
            }
        })
    }

    /// Sorted indices of every ROI that has at least one edge.
    pub fn involved(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.edges.iter().flat_map(|e| [e.a, e.b]).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}
