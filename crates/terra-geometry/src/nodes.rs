// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulation node and constraint-segment lists
//!
//! Nodes are deduplicated with a tolerance: two points closer than
//! `epsilon` degrees in both longitude and latitude are the same node.
//! Lookups go through a hash grid with `epsilon`-sized cells, so only the
//! 3x3 neighborhood of a cell is ever scanned.

use rustc_hash::{FxHashMap, FxHashSet};
use terra_model::{GeoPoint, LonLat};

/// Where a node came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Grid corner
    Corner,
    /// Selected by the elevation fit
    Fit,
    /// Polygon contour vertex
    Polygon,
    /// Inserted by the triangulation engine
    Steiner,
    /// Fixed by a shared tile edge; elevation must not change
    Shared,
}

/// Deduplicating node list
#[derive(Clone, Debug)]
pub struct TriNodes {
    points: Vec<GeoPoint>,
    kinds: Vec<NodeKind>,
    cells: FxHashMap<(i64, i64), Vec<usize>>,
    epsilon: f64,
}

impl TriNodes {
    pub fn new(epsilon: f64) -> Self {
        Self {
            points: Vec::new(),
            kinds: Vec::new(),
            cells: FxHashMap::default(),
            epsilon,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.kinds.clear();
        self.cells.clear();
    }

    #[inline]
    fn cell(&self, p: LonLat) -> (i64, i64) {
        (
            (p.lon / self.epsilon).floor() as i64,
            (p.lat / self.epsilon).floor() as i64,
        )
    }

    /// Index of an existing node within tolerance of `p`
    pub fn find(&self, p: LonLat) -> Option<usize> {
        let (cx, cy) = self.cell(p);
        let mut best: Option<(usize, f64)> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) else {
                    continue;
                };
                for &i in bucket {
                    let q = &self.points[i];
                    let (ex, ey) = ((q.lon - p.lon).abs(), (q.lat - p.lat).abs());
                    if ex < self.epsilon && ey < self.epsilon {
                        let d = ex.max(ey);
                        if best.map_or(true, |(_, bd)| d < bd) {
                            best = Some((i, d));
                        }
                    }
                }
            }
        }
        best.map(|(i, _)| i)
    }

    /// Add `p` unless a node already exists within tolerance; returns the
    /// index of the new or existing node.
    pub fn unique_add(&mut self, p: GeoPoint, kind: NodeKind) -> usize {
        if let Some(i) = self.find(p.lon_lat()) {
            return i;
        }
        self.simple_add(p, kind)
    }

    /// Add `p` without a duplicate check
    pub fn simple_add(&mut self, p: GeoPoint, kind: NodeKind) -> usize {
        let i = self.points.len();
        let cell = self.cell(p.lon_lat());
        self.points.push(p);
        self.kinds.push(kind);
        self.cells.entry(cell).or_default().push(i);
        i
    }

    pub fn get(&self, i: usize) -> GeoPoint {
        self.points[i]
    }

    pub fn kind(&self, i: usize) -> NodeKind {
        self.kinds[i]
    }

    pub fn set_elev(&mut self, i: usize, elev: f64) {
        self.points[i].elev = elev;
    }

    pub fn set_kind(&mut self, i: usize, kind: NodeKind) {
        self.kinds[i] = kind;
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn kinds(&self) -> &[NodeKind] {
        &self.kinds
    }

    /// Iterate `(point, kind)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (GeoPoint, NodeKind)> + '_ {
        self.points.iter().copied().zip(self.kinds.iter().copied())
    }
}

/// Undirected constraint segments between node indices
///
/// Zero-length and repeated segments are ignored.
#[derive(Clone, Debug, Default)]
pub struct TriSegments {
    segments: Vec<(usize, usize)>,
    seen: FxHashSet<(usize, usize)>,
}

impl TriSegments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a segment; returns false if it was degenerate or already present
    pub fn unique_add(&mut self, a: usize, b: usize) -> bool {
        if a == b {
            return false;
        }
        let key = (a.min(b), a.max(b));
        if !self.seen.insert(key) {
            return false;
        }
        self.segments.push((a, b));
        true
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.seen.clear();
    }

    pub fn as_slice(&self) -> &[(usize, usize)] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_duplicates_merge() {
        let mut nodes = TriNodes::new(1e-7);
        let a = nodes.unique_add(GeoPoint::new(-122.5, 37.5, 10.0), NodeKind::Fit);
        let b = nodes.unique_add(GeoPoint::new(-122.5 + 5e-8, 37.5 - 5e-8, 99.0), NodeKind::Polygon);
        assert_eq!(a, b);
        assert_eq!(nodes.len(), 1);
        // First insertion wins
        assert_eq!(nodes.get(a).elev, 10.0);
        assert_eq!(nodes.kind(a), NodeKind::Fit);
    }

    #[test]
    fn test_distinct_nodes_kept() {
        let mut nodes = TriNodes::new(1e-7);
        nodes.unique_add(GeoPoint::new(0.0, 0.0, 0.0), NodeKind::Corner);
        nodes.unique_add(GeoPoint::new(3e-7, 0.0, 0.0), NodeKind::Corner);
        nodes.unique_add(GeoPoint::new(0.0, -3e-7, 0.0), NodeKind::Corner);
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn test_merge_across_cell_boundary() {
        let mut nodes = TriNodes::new(1e-7);
        // Straddle a cell edge in both axes
        let a = nodes.unique_add(GeoPoint::new(0.99e-7, 0.99e-7, 0.0), NodeKind::Fit);
        let b = nodes.unique_add(GeoPoint::new(1.01e-7, 1.01e-7, 0.0), NodeKind::Fit);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simple_add_skips_check() {
        let mut nodes = TriNodes::new(1e-7);
        nodes.simple_add(GeoPoint::new(1.0, 1.0, 0.0), NodeKind::Steiner);
        nodes.simple_add(GeoPoint::new(1.0, 1.0, 0.0), NodeKind::Steiner);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes.find(LonLat::new(1.0, 1.0)), Some(0));
    }

    #[test]
    fn test_segments_dedup() {
        let mut segs = TriSegments::new();
        assert!(segs.unique_add(0, 1));
        assert!(!segs.unique_add(1, 0));
        assert!(!segs.unique_add(2, 2));
        assert!(segs.unique_add(1, 2));
        assert_eq!(segs.as_slice(), &[(0, 1), (1, 2)]);
    }
}
