// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constrained triangulation engines
//!
//! The pipeline talks to triangulation through [`TriangulationEngine`] so
//! the engine can be swapped. [`DelaunayEngine`] is the built-in one: it
//! runs `delaunator` and makes the result conforming by splitting every
//! constraint segment that is missing from the triangulation at its
//! midpoint, then retriangulating. Optional quality refinement inserts
//! circumcenters of triangles whose smallest angle is below a threshold.
//!
//! Output points always start with the input points in input order;
//! inserted Steiner points follow.

use crate::error::{Error, Result};
use log::debug;
use nalgebra::Point2;
use rustc_hash::FxHashSet;

/// Segments shorter than this fraction of the input extent are not split
const MIN_SEGMENT_FRACTION: f64 = 1e-9;

/// Nodes closer than this fraction of the extent to a segment lie on it
const ON_SEGMENT_FRACTION: f64 = 1e-10;

/// Quality parameters for one triangulation call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QualityOptions {
    /// Minimum triangle angle in degrees; 0 disables refinement
    pub min_angle: f64,
    /// Cap on refinement Steiner points
    pub max_steiner: usize,
}

impl QualityOptions {
    /// No refinement: constraint recovery only
    pub fn none() -> Self {
        Self {
            min_angle: 0.0,
            max_steiner: 0,
        }
    }

    pub fn min_angle(min_angle: f64, max_steiner: usize) -> Self {
        Self {
            min_angle,
            max_steiner,
        }
    }
}

/// Result of a constrained triangulation
#[derive(Clone, Debug, Default)]
pub struct TriangulationOutput {
    /// Input points followed by inserted Steiner points
    pub points: Vec<Point2<f64>>,
    /// Constraint segments, possibly subdivided at Steiner points
    pub segments: Vec<(usize, usize)>,
    /// Counter-clockwise triangles indexing `points`
    pub triangles: Vec<[usize; 3]>,
}

impl TriangulationOutput {
    /// Number of points the engine added
    pub fn steiner_count(&self, input_len: usize) -> usize {
        self.points.len().saturating_sub(input_len)
    }
}

/// Constrained triangulation engine
pub trait TriangulationEngine: Send + Sync {
    /// Triangulate `points` so that every segment in `segments` is covered
    /// by triangle edges.
    ///
    /// # Arguments
    /// * `points` - Planar node positions (degrees lon/lat)
    /// * `segments` - Constraint segments as index pairs into `points`
    /// * `quality` - Refinement parameters
    ///
    /// # Returns
    /// The triangulation, or `Error::DegenerateTriangulation` if the input
    /// has fewer than three non-collinear points or the constraints cannot
    /// be recovered.
    fn triangulate(
        &self,
        points: &[Point2<f64>],
        segments: &[(usize, usize)],
        quality: &QualityOptions,
    ) -> Result<TriangulationOutput>;
}

/// Conforming Delaunay triangulation backed by `delaunator`
#[derive(Clone, Debug)]
pub struct DelaunayEngine {
    max_rounds: usize,
}

impl Default for DelaunayEngine {
    fn default() -> Self {
        Self { max_rounds: 32 }
    }
}

impl DelaunayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit on retriangulation rounds per phase
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Retriangulate until every constraint is an edge
    fn conform(
        &self,
        pts: &mut Vec<Point2<f64>>,
        segs: &mut Vec<(usize, usize)>,
        min_len: f64,
    ) -> Result<Vec<[usize; 3]>> {
        for round in 0..self.max_rounds {
            let triangles = delaunay(pts)?;
            let edges = edge_set(&triangles);

            let mut missing = 0;
            let mut next = Vec::with_capacity(segs.len());
            for &(a, b) in segs.iter() {
                if edges.contains(&edge_key(a, b)) {
                    next.push((a, b));
                    continue;
                }
                missing += 1;
                let (pa, pb) = (pts[a], pts[b]);
                if (pb - pa).norm() <= min_len {
                    return Err(Error::degenerate(format!(
                        "constraint segment ({:.9}, {:.9})-({:.9}, {:.9}) cannot be recovered",
                        pa.x, pa.y, pb.x, pb.y
                    )));
                }
                let m = pts.len();
                pts.push(nalgebra::center(&pa, &pb));
                next.push((a, m));
                next.push((m, b));
            }
            *segs = next;

            if missing == 0 {
                return Ok(triangles);
            }
            debug!("Conforming round {}: split {} segments", round, missing);
        }

        Err(Error::degenerate(format!(
            "constraints not recovered after {} rounds",
            self.max_rounds
        )))
    }

    /// One refinement sweep; returns the number of points added
    #[allow(clippy::too_many_arguments)]
    fn refine(
        &self,
        pts: &mut Vec<Point2<f64>>,
        segs: &mut Vec<(usize, usize)>,
        triangles: &[[usize; 3]],
        min_angle: f64,
        budget: usize,
        bounds: (Point2<f64>, Point2<f64>),
        min_len: f64,
    ) -> usize {
        let (lo, hi) = bounds;
        let margin = min_len;
        let mut split: FxHashSet<usize> = FxHashSet::default();
        let mut seen: FxHashSet<(u64, u64)> = FxHashSet::default();
        let mut centers = Vec::new();

        for t in triangles {
            if split.len() + centers.len() >= budget {
                break;
            }
            let (a, b, c) = (pts[t[0]], pts[t[1]], pts[t[2]]);
            if smallest_angle(&a, &b, &c) >= min_angle {
                continue;
            }
            let Some(cc) = circumcenter(&a, &b, &c) else {
                continue;
            };
            if (cc - a).norm() <= min_len * 100.0 {
                continue;
            }
            let inside = cc.x > lo.x + margin
                && cc.x < hi.x - margin
                && cc.y > lo.y + margin
                && cc.y < hi.y - margin;
            if !inside {
                continue;
            }

            // An encroached constraint is split instead of inserting cc
            let encroached = segs.iter().position(|&(s0, s1)| {
                let (p0, p1) = (pts[s0], pts[s1]);
                (p0 - cc).dot(&(p1 - cc)) < 0.0
            });
            match encroached {
                Some(si) => {
                    let (s0, s1) = segs[si];
                    if (pts[s1] - pts[s0]).norm() > 2.0 * min_len {
                        split.insert(si);
                    }
                }
                None => {
                    if seen.insert((cc.x.to_bits(), cc.y.to_bits())) {
                        centers.push(cc);
                    }
                }
            }
        }

        if !split.is_empty() {
            let mut next = Vec::with_capacity(segs.len() + split.len());
            for (i, &(a, b)) in segs.iter().enumerate() {
                if split.contains(&i) {
                    let mid = nalgebra::center(&pts[a], &pts[b]);
                    let m = pts.len();
                    pts.push(mid);
                    next.push((a, m));
                    next.push((m, b));
                } else {
                    next.push((a, b));
                }
            }
            *segs = next;
        }

        let added = split.len() + centers.len();
        pts.extend(centers);
        added
    }
}

impl TriangulationEngine for DelaunayEngine {
    fn triangulate(
        &self,
        points: &[Point2<f64>],
        segments: &[(usize, usize)],
        quality: &QualityOptions,
    ) -> Result<TriangulationOutput> {
        if points.len() < 3 {
            return Err(Error::degenerate(format!(
                "need at least 3 nodes, got {}",
                points.len()
            )));
        }
        if points.iter().any(|p| !(p.x.is_finite() && p.y.is_finite())) {
            return Err(Error::degenerate("non-finite node position"));
        }
        for &(a, b) in segments {
            if a >= points.len() || b >= points.len() {
                return Err(Error::degenerate(format!(
                    "segment ({}, {}) refers to a missing node",
                    a, b
                )));
            }
        }

        let bounds = bounding_box(points);
        let scale = (bounds.1 - bounds.0).norm();
        if scale == 0.0 {
            return Err(Error::degenerate("all nodes coincide"));
        }
        let min_len = scale * MIN_SEGMENT_FRACTION;

        let mut pts = points.to_vec();
        let mut segs = split_through_nodes(&pts, segments, scale * ON_SEGMENT_FRACTION);
        let mut triangles = self.conform(&mut pts, &mut segs, min_len)?;

        if quality.min_angle > 0.0 && quality.max_steiner > 0 {
            let min_angle = quality.min_angle.to_radians();
            let mut inserted = 0;
            for _ in 0..self.max_rounds {
                let budget = quality.max_steiner.saturating_sub(inserted);
                if budget == 0 {
                    break;
                }
                let added = self.refine(
                    &mut pts,
                    &mut segs,
                    &triangles,
                    min_angle,
                    budget,
                    bounds,
                    min_len,
                );
                if added == 0 {
                    break;
                }
                inserted += added;
                triangles = self.conform(&mut pts, &mut segs, min_len)?;
            }
            debug!("Quality refinement inserted {} points", inserted);
        }

        orient_ccw(&pts, &mut triangles);

        Ok(TriangulationOutput {
            points: pts,
            segments: segs,
            triangles,
        })
    }
}

// ============================================================================
// Geometry helpers
// ============================================================================

fn delaunay(pts: &[Point2<f64>]) -> Result<Vec<[usize; 3]>> {
    let coords: Vec<delaunator::Point> = pts
        .iter()
        .map(|p| delaunator::Point { x: p.x, y: p.y })
        .collect();
    let result = delaunator::triangulate(&coords);
    if result.triangles.is_empty() {
        return Err(Error::degenerate("all nodes are collinear"));
    }
    Ok(result
        .triangles
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect())
}

#[inline]
fn edge_key(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

fn edge_set(triangles: &[[usize; 3]]) -> FxHashSet<(usize, usize)> {
    let mut edges = FxHashSet::default();
    for t in triangles {
        edges.insert(edge_key(t[0], t[1]));
        edges.insert(edge_key(t[1], t[2]));
        edges.insert(edge_key(t[2], t[0]));
    }
    edges
}

fn bounding_box(pts: &[Point2<f64>]) -> (Point2<f64>, Point2<f64>) {
    let mut lo = Point2::new(f64::INFINITY, f64::INFINITY);
    let mut hi = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in pts {
        lo.x = lo.x.min(p.x);
        lo.y = lo.y.min(p.y);
        hi.x = hi.x.max(p.x);
        hi.y = hi.y.max(p.y);
    }
    (lo, hi)
}

/// Twice the signed area of `abc`; positive when counter-clockwise
#[inline]
fn orient(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

fn orient_ccw(pts: &[Point2<f64>], triangles: &mut [[usize; 3]]) {
    for t in triangles.iter_mut() {
        if orient(&pts[t[0]], &pts[t[1]], &pts[t[2]]) < 0.0 {
            t.swap(1, 2);
        }
    }
}

/// Subdivide segments at any node lying on them
fn split_through_nodes(
    pts: &[Point2<f64>],
    segments: &[(usize, usize)],
    tolerance: f64,
) -> Vec<(usize, usize)> {
    let mut out = Vec::with_capacity(segments.len());
    let mut seen = FxHashSet::default();

    for &(a, b) in segments {
        if a == b {
            continue;
        }
        let (pa, pb) = (pts[a], pts[b]);
        let d = pb - pa;
        let len2 = d.norm_squared();
        let len = len2.sqrt();

        let mut on: Vec<(f64, usize)> = pts
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != a && i != b)
            .filter_map(|(i, p)| {
                let v = *p - pa;
                let t = v.dot(&d) / len2;
                let dist = (v.x * d.y - v.y * d.x).abs() / len;
                (t > 0.0 && t < 1.0 && dist <= tolerance).then_some((t, i))
            })
            .collect();
        on.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut prev = a;
        for i in on.into_iter().map(|(_, i)| i).chain(std::iter::once(b)) {
            if seen.insert(edge_key(prev, i)) {
                out.push((prev, i));
            }
            prev = i;
        }
    }
    out
}

fn smallest_angle(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    let at = |p: &Point2<f64>, q: &Point2<f64>, r: &Point2<f64>| (q - p).angle(&(r - p));
    at(a, b, c).min(at(b, c, a)).min(at(c, a, b))
}

fn circumcenter(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> Option<Point2<f64>> {
    let (bx, by) = (b.x - a.x, b.y - a.y);
    let (cx, cy) = (c.x - a.x, c.y - a.y);
    let d = 2.0 * (bx * cy - by * cx);
    if d == 0.0 || !d.is_finite() {
        return None;
    }
    let b2 = bx * bx + by * by;
    let c2 = cx * cx + cy * cy;
    let ux = (cy * b2 - by * c2) / d;
    let uy = (bx * c2 - cx * b2) / d;
    let center = Point2::new(a.x + ux, a.y + uy);
    (center.x.is_finite() && center.y.is_finite()).then_some(center)
}
