// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared-edge reconciliation between neighboring tiles
//!
//! After the first triangulation pass a tile's boundary nodes are made to
//! agree with whatever its neighbors already published, so adjacent meshes
//! meet without cracks. The exchange goes through small JSON files:
//!
//! ```text
//! <shared_root>/<base_path>/<index>.<side>
//! ```
//!
//! `side` is one of `north south east west` (edge nodes, corners
//! included) or `sw se nw ne` (the single corner node). A file, once
//! written, is never replaced: the first tile to publish an edge fixes it.
//!
//! The stitcher walks a fixed sequence of states; calling an operation out
//! of order is an integrity error:
//!
//! ```text
//! NoNeighborData -> SharedEdgesLoaded -> Split -> SharedEdgesWritten -> Assembled
//! ```

use crate::array::ElevationGrid;
use crate::error::{Error, Result};
use crate::nodes::{NodeKind, TriNodes, TriSegments};
use log::{debug, info};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use terra_model::{bucket_span, Bucket, GeoPoint, LonLat, HALF_BUCKET_SPAN};

/// Step past a corner used to find the bucket diagonally across it
const CORNER_NUDGE: f64 = 1e-6;

/// One of the eight directions a tile shares nodes in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    North,
    South,
    East,
    West,
    #[serde(rename = "sw")]
    SouthWest,
    #[serde(rename = "se")]
    SouthEast,
    #[serde(rename = "nw")]
    NorthWest,
    #[serde(rename = "ne")]
    NorthEast,
}

impl Side {
    pub const ALL: [Side; 8] = [
        Side::North,
        Side::South,
        Side::East,
        Side::West,
        Side::SouthWest,
        Side::SouthEast,
        Side::NorthWest,
        Side::NorthEast,
    ];

    /// File extension for this side
    pub fn suffix(&self) -> &'static str {
        match self {
            Side::North => "north",
            Side::South => "south",
            Side::East => "east",
            Side::West => "west",
            Side::SouthWest => "sw",
            Side::SouthEast => "se",
            Side::NorthWest => "nw",
            Side::NorthEast => "ne",
        }
    }

    /// The side a neighbor in this direction shares with us
    pub fn opposite(&self) -> Side {
        match self {
            Side::North => Side::South,
            Side::South => Side::North,
            Side::East => Side::West,
            Side::West => Side::East,
            Side::SouthWest => Side::NorthEast,
            Side::SouthEast => Side::NorthWest,
            Side::NorthWest => Side::SouthEast,
            Side::NorthEast => Side::SouthWest,
        }
    }

    /// Bucket offset `(dx, dy)` of the neighbor in this direction
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Side::North => (0, 1),
            Side::South => (0, -1),
            Side::East => (1, 0),
            Side::West => (-1, 0),
            Side::SouthWest => (-1, -1),
            Side::SouthEast => (1, -1),
            Side::NorthWest => (-1, 1),
            Side::NorthEast => (1, 1),
        }
    }

    pub fn is_corner(&self) -> bool {
        matches!(
            self,
            Side::SouthWest | Side::SouthEast | Side::NorthWest | Side::NorthEast
        )
    }
}

/// Content of one shared-edge file
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SharedEdge {
    /// Bucket that published the edge
    pub bucket_index: u32,
    /// Side of the publishing bucket
    pub side: Side,
    /// Nodes ordered along the edge (west to east or south to north)
    pub points: Vec<GeoPoint>,
}

/// Path of a shared-edge file
pub fn shared_path(shared_root: &Path, bucket: &Bucket, side: Side) -> PathBuf {
    shared_root
        .join(bucket.gen_base_path())
        .join(format!("{}.{}", bucket.gen_index(), side.suffix()))
}

/// Read one shared-edge file
pub fn read_shared_edge(path: &Path) -> Result<SharedEdge> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::format(format!("{}: {}", path.display(), e)))
}

/// Write one shared-edge file unless it already exists
///
/// Returns false when an existing file was left in place.
pub fn write_shared_edge(path: &Path, edge: &SharedEdge) -> Result<bool> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == IoErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };
    file.write_all(serde_json::to_string(edge)?.as_bytes())?;
    Ok(true)
}

/// Stitcher progress
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StitchState {
    NoNeighborData,
    SharedEdgesLoaded,
    Split,
    SharedEdgesWritten,
    Assembled,
}

/// Node and segment lists after stitching, ready for the second pass
#[derive(Clone, Debug)]
pub struct AssembledTile {
    pub nodes: TriNodes,
    pub segments: TriSegments,
}

/// Nodes published by one neighbor, restricted to our boundary
#[derive(Clone, Debug)]
struct NeighborEdge {
    /// Our side the nodes lie on
    side: Side,
    /// Stretch of that side the neighbor spans, along the edge axis
    coverage: (f64, f64),
    /// Published nodes that lie on our side
    points: Vec<GeoPoint>,
    /// Every published node, ordered along the edge
    line: Vec<GeoPoint>,
}

/// Tile extent in degrees
#[derive(Clone, Copy, Debug)]
struct Extent {
    min_lon: f64,
    max_lon: f64,
    min_lat: f64,
    max_lat: f64,
}

impl Extent {
    fn of(bucket: &Bucket) -> Self {
        Self {
            min_lon: bucket.min_lon(),
            max_lon: bucket.max_lon(),
            min_lat: bucket.min_lat(),
            max_lat: bucket.max_lat(),
        }
    }

    fn corner(&self, side: Side) -> Option<LonLat> {
        match side {
            Side::SouthWest => Some(LonLat::new(self.min_lon, self.min_lat)),
            Side::SouthEast => Some(LonLat::new(self.max_lon, self.min_lat)),
            Side::NorthWest => Some(LonLat::new(self.min_lon, self.max_lat)),
            Side::NorthEast => Some(LonLat::new(self.max_lon, self.max_lat)),
            _ => None,
        }
    }

    /// Position along the axis of an edge side
    fn along(side: Side, p: LonLat) -> f64 {
        match side {
            Side::North | Side::South => p.lon,
            _ => p.lat,
        }
    }

    /// Whether `p` lies on `side` within `eps`
    fn on_side(&self, side: Side, p: LonLat, eps: f64) -> bool {
        let in_lon = p.lon > self.min_lon - eps && p.lon < self.max_lon + eps;
        let in_lat = p.lat > self.min_lat - eps && p.lat < self.max_lat + eps;
        match side {
            Side::North => (p.lat - self.max_lat).abs() < eps && in_lon,
            Side::South => (p.lat - self.min_lat).abs() < eps && in_lon,
            Side::East => (p.lon - self.max_lon).abs() < eps && in_lat,
            Side::West => (p.lon - self.min_lon).abs() < eps && in_lat,
            corner => self.corner(corner).is_some_and(|c| {
                (p.lon - c.lon).abs() < eps && (p.lat - c.lat).abs() < eps
            }),
        }
    }

    fn is_corner(&self, p: LonLat, eps: f64) -> bool {
        Side::ALL
            .into_iter()
            .filter(Side::is_corner)
            .any(|s| self.on_side(s, p, eps))
    }

    fn edge_sides(&self, p: LonLat, eps: f64) -> Vec<Side> {
        [Side::North, Side::South, Side::East, Side::West]
            .into_iter()
            .filter(|&s| self.on_side(s, p, eps))
            .collect()
    }
}

/// Reconciles one tile's boundary with its neighbors
pub struct TileStitcher {
    shared_root: PathBuf,
    bucket: Bucket,
    extent: Extent,
    epsilon: f64,
    state: StitchState,
    neighbors: Vec<NeighborEdge>,
    /// Final boundary nodes, all sides
    boundary: Vec<GeoPoint>,
    /// Interior nodes with their origin
    body: Vec<(GeoPoint, NodeKind)>,
    /// Constraint segments by endpoint position
    segments: Vec<(LonLat, LonLat)>,
}

impl TileStitcher {
    /// Create a stitcher for `bucket` exchanging files under `shared_root`
    pub fn new(shared_root: impl Into<PathBuf>, bucket: Bucket, epsilon: f64) -> Self {
        Self {
            shared_root: shared_root.into(),
            extent: Extent::of(&bucket),
            bucket,
            epsilon,
            state: StitchState::NoNeighborData,
            neighbors: Vec::new(),
            boundary: Vec::new(),
            body: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn state(&self) -> StitchState {
        self.state
    }

    fn expect_state(&self, expected: StitchState, op: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::integrity(format!(
                "stitcher: {} called in state {:?}, expected {:?}",
                op, self.state, expected
            )));
        }
        Ok(())
    }

    /// Every other bucket touching `side`
    ///
    /// Rows north and south may use a different bucket width, so an edge
    /// can border one wider bucket or several narrower ones. A diagonal
    /// bucket only counts if one of its corners is our corner.
    fn neighbors_on(&self, side: Side) -> Vec<Bucket> {
        let extent = &self.extent;
        let mut found = Vec::new();
        match side {
            Side::East | Side::West => {
                let (dx, dy) = side.offset();
                found.push(self.bucket.sibling(dx, dy));
            }
            Side::North | Side::South => {
                let lat = if side == Side::North {
                    extent.max_lat + HALF_BUCKET_SPAN
                } else {
                    extent.min_lat - HALF_BUCKET_SPAN
                };
                if lat.abs() < 90.0 {
                    let width = self.bucket.get_width();
                    let step = bucket_span(lat).min(width);
                    let count = (width / step).round().max(1.0) as usize;
                    for k in 0..count {
                        found.push(Bucket::new(extent.min_lon + (k as f64 + 0.5) * step, lat));
                    }
                }
            }
            corner => {
                if let Some(c) = extent.corner(corner) {
                    let (dx, dy) = corner.offset();
                    let lat = c.lat + dy as f64 * HALF_BUCKET_SPAN;
                    if lat.abs() < 90.0 {
                        let candidate = Bucket::new(c.lon + dx as f64 * CORNER_NUDGE, lat);
                        let shares_corner = Extent::of(&candidate)
                            .corner(corner.opposite())
                            .is_some_and(|o| {
                                (o.lon - c.lon).abs() < self.epsilon
                                    && (o.lat - c.lat).abs() < self.epsilon
                            });
                        if shares_corner {
                            found.push(candidate);
                        }
                    }
                }
            }
        }
        found.sort_by_key(Bucket::gen_index);
        found.dedup();
        found.retain(|n| *n != self.bucket);
        found
    }

    /// Load every shared-edge file neighbors have published toward us.
    ///
    /// Returns the number of files read.
    pub fn load_neighbor_shared(&mut self) -> Result<usize> {
        self.expect_state(StitchState::NoNeighborData, "load_neighbor_shared")?;

        for side in Side::ALL {
            for neighbor in self.neighbors_on(side) {
                let path = shared_path(&self.shared_root, &neighbor, side.opposite());
                if !path.exists() {
                    continue;
                }

                let edge = read_shared_edge(&path)?;
                if edge.side != side.opposite() {
                    return Err(Error::format(format!(
                        "{}: holds side {:?}, expected {:?}",
                        path.display(),
                        edge.side,
                        side.opposite()
                    )));
                }

                let points: Vec<GeoPoint> = edge
                    .points
                    .iter()
                    .filter(|p| self.extent.on_side(side, p.lon_lat(), self.epsilon))
                    .copied()
                    .collect();
                let coverage = match side {
                    Side::North | Side::South => (neighbor.min_lon(), neighbor.max_lon()),
                    Side::East | Side::West => (neighbor.min_lat(), neighbor.max_lat()),
                    _ => (f64::NEG_INFINITY, f64::INFINITY),
                };
                debug!(
                    "Loaded {} shared nodes for {:?} side from {}",
                    points.len(),
                    side,
                    neighbor.gen_index()
                );
                self.neighbors.push(NeighborEdge {
                    side,
                    coverage,
                    points,
                    line: edge.points,
                });
            }
        }

        self.state = StitchState::SharedEdgesLoaded;
        Ok(self.neighbors.len())
    }

    /// Neighbor edges that fix the position of boundary point `p`
    fn covering(&self, p: LonLat) -> Vec<&NeighborEdge> {
        self.neighbors
            .iter()
            .filter(|n| {
                if !self.extent.on_side(n.side, p, self.epsilon) {
                    return false;
                }
                if n.side.is_corner() {
                    return true;
                }
                let t = Extent::along(n.side, p);
                t > n.coverage.0 - self.epsilon && t < n.coverage.1 + self.epsilon
            })
            .collect()
    }

    /// Separate boundary from interior nodes and snap the boundary onto
    /// neighbor data.
    ///
    /// A boundary node covered by a neighbor is replaced by the neighbor's
    /// node at the same place. Without an exact match our own tile corners
    /// stay, with the height of the neighbor edge at that point. Other
    /// nodes are dropped, unless a constraint segment ends there, in which
    /// case they move to the nearest neighbor node. Uncovered boundary nodes stay and take their
    /// elevation from `grid`. Every neighbor node becomes a boundary node.
    pub fn split_tile(
        &mut self,
        nodes: &TriNodes,
        segments: &[(usize, usize)],
        grid: &ElevationGrid,
    ) -> Result<()> {
        self.expect_state(StitchState::SharedEdgesLoaded, "split_tile")?;
        let eps = self.epsilon;

        let endpoints: FxHashSet<usize> = segments.iter().flat_map(|&(a, b)| [a, b]).collect();
        let mut moved: Vec<Option<LonLat>> = vec![None; nodes.len()];
        let mut boundary: Vec<GeoPoint> = Vec::new();
        let mut dropped = 0;
        let mut snapped = 0;

        for (i, (p, kind)) in nodes.iter().enumerate() {
            let pos = p.lon_lat();
            if self.extent.edge_sides(pos, eps).is_empty() {
                self.body.push((p, kind));
                moved[i] = Some(pos);
                continue;
            }

            let covering = self.covering(pos);
            if covering.is_empty() {
                let own = GeoPoint::new(p.lon, p.lat, grid.elevation_at_degrees(p.lon, p.lat));
                boundary.push(own);
                moved[i] = Some(pos);
                continue;
            }

            let candidates = covering.iter().flat_map(|n| n.points.iter());
            let exact = candidates
                .clone()
                .find(|q| (q.lon - p.lon).abs() < eps && (q.lat - p.lat).abs() < eps);
            if let Some(q) = exact {
                moved[i] = Some(q.lon_lat());
            } else if self.extent.is_corner(pos, eps) {
                // A wider neighbor has no node where our corner meets its edge
                let elev = edge_elevation(&covering, pos)
                    .unwrap_or_else(|| grid.elevation_at_degrees(p.lon, p.lat));
                boundary.push(GeoPoint::new(p.lon, p.lat, elev));
                moved[i] = Some(pos);
            } else if endpoints.contains(&i) {
                let nearest = candidates.min_by(|a, b| {
                    planar_distance(a.lon_lat(), pos).total_cmp(&planar_distance(b.lon_lat(), pos))
                });
                match nearest {
                    Some(q) => {
                        moved[i] = Some(q.lon_lat());
                        snapped += 1;
                    }
                    None => {
                        // Neighbor published nothing on this stretch
                        let own =
                            GeoPoint::new(p.lon, p.lat, grid.elevation_at_degrees(p.lon, p.lat));
                        boundary.push(own);
                        moved[i] = Some(pos);
                    }
                }
            } else {
                dropped += 1;
            }
        }

        for neighbor in &self.neighbors {
            boundary.extend(neighbor.points.iter().copied());
        }
        self.boundary = boundary;

        for &(a, b) in segments {
            match (moved.get(a).copied().flatten(), moved.get(b).copied().flatten()) {
                (Some(pa), Some(pb)) => {
                    let same = (pa.lon - pb.lon).abs() < eps && (pa.lat - pb.lat).abs() < eps;
                    if !same {
                        self.segments.push((pa, pb));
                    }
                }
                _ => {
                    return Err(Error::integrity(format!(
                        "segment ({}, {}) lost an endpoint while stitching",
                        a, b
                    )))
                }
            }
        }

        debug!(
            "Split tile {}: {} interior, {} boundary, {} dropped, {} snapped",
            self.bucket.gen_index(),
            self.body.len(),
            self.boundary.len(),
            dropped,
            snapped
        );
        self.state = StitchState::Split;
        Ok(())
    }

    /// Final boundary nodes on one side, ordered along the edge
    pub fn side_nodes(&self, side: Side) -> Vec<GeoPoint> {
        let eps = self.epsilon;
        let mut seen = TriNodes::new(eps);
        let mut points: Vec<GeoPoint> = Vec::new();
        for p in &self.boundary {
            if self.extent.on_side(side, p.lon_lat(), eps) {
                let before = seen.len();
                seen.unique_add(*p, NodeKind::Shared);
                if seen.len() > before {
                    points.push(*p);
                }
            }
        }
        points.sort_by(|a, b| {
            Extent::along(side, a.lon_lat()).total_cmp(&Extent::along(side, b.lon_lat()))
        });
        points
    }

    /// Publish our boundary for every side that has no file yet.
    ///
    /// Returns the number of files written.
    pub fn write_shared(&mut self) -> Result<usize> {
        self.expect_state(StitchState::Split, "write_shared")?;

        let mut written = 0;
        for side in Side::ALL {
            let points = self.side_nodes(side);
            if points.is_empty() {
                continue;
            }
            let path = shared_path(&self.shared_root, &self.bucket, side);
            let edge = SharedEdge {
                bucket_index: self.bucket.gen_index(),
                side,
                points,
            };
            if write_shared_edge(&path, &edge)? {
                written += 1;
            } else {
                debug!("Keeping existing {}", path.display());
            }
        }

        info!(
            "Tile {}: wrote {} shared-edge files",
            self.bucket.gen_index(),
            written
        );
        self.state = StitchState::SharedEdgesWritten;
        Ok(written)
    }

    /// Merge boundary and interior nodes into fresh lists for pass 2.
    ///
    /// Boundary nodes come first and are marked [`NodeKind::Shared`].
    pub fn assemble_tile(&mut self) -> Result<AssembledTile> {
        self.expect_state(StitchState::SharedEdgesWritten, "assemble_tile")?;

        let mut nodes = TriNodes::new(self.epsilon);
        for p in &self.boundary {
            nodes.unique_add(*p, NodeKind::Shared);
        }
        for &(p, kind) in &self.body {
            nodes.unique_add(p, kind);
        }

        let mut segments = TriSegments::new();
        for &(pa, pb) in &self.segments {
            match (nodes.find(pa), nodes.find(pb)) {
                (Some(a), Some(b)) => {
                    segments.unique_add(a, b);
                }
                _ => {
                    return Err(Error::integrity(format!(
                        "segment endpoint ({}, {}) missing after assembly",
                        pa.lon, pa.lat
                    )))
                }
            }
        }

        self.state = StitchState::Assembled;
        Ok(AssembledTile { nodes, segments })
    }
}

/// Height of the first neighbor edge passing through `p`, interpolated
/// between the published nodes on either side
fn edge_elevation(edges: &[&NeighborEdge], p: LonLat) -> Option<f64> {
    edges
        .iter()
        .filter(|n| !n.side.is_corner())
        .find_map(|n| {
            let t = Extent::along(n.side, p);
            n.line.windows(2).find_map(|w| {
                let t0 = Extent::along(n.side, w[0].lon_lat());
                let t1 = Extent::along(n.side, w[1].lon_lat());
                (t1 > t0 && t0 <= t && t <= t1)
                    .then(|| w[0].elev + (t - t0) / (t1 - t0) * (w[1].elev - w[0].elev))
            })
        })
}

fn planar_distance(a: LonLat, b: LonLat) -> f64 {
    (a.lon - b.lon).hypot(a.lat - b.lat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terra_parser::DemHeader;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("terra-stitch-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    /// Flat grid exactly covering `bucket`
    fn grid_for(bucket: &Bucket, elev: f64) -> ElevationGrid {
        ElevationGrid::from_fn(
            DemHeader {
                origin_x: bucket.min_lon() * 3600.0,
                origin_y: bucket.min_lat() * 3600.0,
                cols: 6,
                col_step: bucket.get_width() * 3600.0 / 5.0,
                rows: 6,
                row_step: bucket.get_height() * 3600.0 / 5.0,
            },
            |_, _| elev,
        )
        .unwrap()
    }

    fn corner_nodes(bucket: &Bucket, elev: f64) -> TriNodes {
        let mut nodes = TriNodes::new(1e-7);
        for (lon, lat) in [
            (bucket.min_lon(), bucket.min_lat()),
            (bucket.max_lon(), bucket.min_lat()),
            (bucket.max_lon(), bucket.max_lat()),
            (bucket.min_lon(), bucket.max_lat()),
        ] {
            nodes.unique_add(GeoPoint::new(lon, lat, elev), NodeKind::Corner);
        }
        nodes
    }

    fn run(root: &Path, bucket: Bucket, nodes: &TriNodes, segs: &[(usize, usize)], elev: f64) -> AssembledTile {
        let mut stitcher = TileStitcher::new(root, bucket, 1e-7);
        stitcher.load_neighbor_shared().unwrap();
        stitcher.split_tile(nodes, segs, &grid_for(&bucket, elev)).unwrap();
        stitcher.write_shared().unwrap();
        stitcher.assemble_tile().unwrap()
    }

    #[test]
    fn test_side_relations() {
        for side in Side::ALL {
            assert_eq!(side.opposite().opposite(), side);
            let (dx, dy) = side.offset();
            let (ox, oy) = side.opposite().offset();
            assert_eq!((dx + ox, dy + oy), (0, 0));
        }
        assert!(Side::NorthEast.is_corner());
        assert_eq!(Side::SouthWest.suffix(), "sw");
    }

    #[test]
    fn test_shared_edge_round_trip_is_bit_exact() {
        let root = scratch("roundtrip");
        let edge = SharedEdge {
            bucket_index: 42,
            side: Side::East,
            points: vec![
                GeoPoint::new(0.1 + 0.2, 1.0 / 3.0, -0.0),
                GeoPoint::new(-122.123_456_789_012_35, 37.5, 1e-300),
            ],
        };
        let path = root.join("a").join("42.east");
        assert!(write_shared_edge(&path, &edge).unwrap());
        let back = read_shared_edge(&path).unwrap();
        for (a, b) in edge.points.iter().zip(&back.points) {
            assert_eq!(a.lon.to_bits(), b.lon.to_bits());
            assert_eq!(a.lat.to_bits(), b.lat.to_bits());
            assert_eq!(a.elev.to_bits(), b.elev.to_bits());
        }
        assert_eq!(back.side, Side::East);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_existing_file_not_overwritten() {
        let root = scratch("first-writer");
        let path = root.join("7.north");
        let first = SharedEdge {
            bucket_index: 7,
            side: Side::North,
            points: vec![GeoPoint::new(0.0, 1.0, 5.0)],
        };
        let second = SharedEdge {
            points: vec![GeoPoint::new(0.0, 1.0, 99.0)],
            ..first.clone()
        };
        assert!(write_shared_edge(&path, &first).unwrap());
        assert!(!write_shared_edge(&path, &second).unwrap());
        assert_eq!(read_shared_edge(&path).unwrap(), first);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_out_of_order_call_rejected() {
        let mut stitcher = TileStitcher::new("/nonexistent", Bucket::new(0.01, 0.01), 1e-7);
        let err = stitcher.write_shared().unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
        assert_eq!(stitcher.state(), StitchState::NoNeighborData);
    }

    #[test]
    fn test_lone_tile_publishes_all_sides() {
        let root = scratch("lone");
        let bucket = Bucket::new(0.01, 0.01);
        let nodes = corner_nodes(&bucket, 0.0);
        let tile = run(&root, bucket, &nodes, &[], 100.0);

        assert_eq!(tile.nodes.len(), 4);
        // Boundary elevations come from the grid
        assert!(tile.nodes.points().iter().all(|p| p.elev == 100.0));
        assert!(tile.nodes.kinds().iter().all(|&k| k == NodeKind::Shared));
        for side in Side::ALL {
            assert!(shared_path(&root, &bucket, side).exists(), "{:?}", side);
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_neighbor_edge_adopted() {
        let root = scratch("adopt");
        let west = Bucket::new(0.01, 0.01);
        let east = west.sibling(1, 0);

        // West tile has a polygon vertex on its east edge
        let mut west_nodes = corner_nodes(&west, 0.0);
        let mid_lat = west.min_lat() + 0.05;
        west_nodes.unique_add(GeoPoint::new(west.max_lon(), mid_lat, 0.0), NodeKind::Polygon);
        run(&root, west, &west_nodes, &[], 10.0);

        // East tile's own vertex is slightly off and is a segment endpoint
        let mut east_nodes = corner_nodes(&east, 0.0);
        let own = east_nodes.unique_add(
            GeoPoint::new(east.min_lon(), mid_lat + 1e-5, 0.0),
            NodeKind::Polygon,
        );
        let inner = east_nodes.unique_add(
            GeoPoint::new(east.get_center_lon(), east.get_center_lat(), 0.0),
            NodeKind::Polygon,
        );
        let tile = run(&root, east, &east_nodes, &[(own, inner)], 20.0);

        let published = read_shared_edge(&shared_path(&root, &west, Side::East)).unwrap();
        let shared_mid = published
            .points
            .iter()
            .find(|p| (p.lat - mid_lat).abs() < 1e-9)
            .copied()
            .unwrap();

        let adopted = tile.nodes.find(shared_mid.lon_lat()).unwrap();
        let got = tile.nodes.get(adopted);
        assert_eq!(got.lon.to_bits(), shared_mid.lon.to_bits());
        assert_eq!(got.lat.to_bits(), shared_mid.lat.to_bits());
        assert_eq!(got.elev, 10.0);
        assert!(tile.nodes.find(LonLat::new(east.min_lon(), mid_lat + 1e-5)).is_none());

        // Constraint now ends on the adopted node
        assert_eq!(tile.segments.len(), 1);
        let (a, b) = tile.segments.as_slice()[0];
        assert!(a == adopted || b == adopted);

        // Shared corners carry the west tile's elevation
        let sw = tile.nodes.find(LonLat::new(east.min_lon(), east.min_lat())).unwrap();
        assert_eq!(tile.nodes.get(sw).elev, 10.0);
        let se = tile.nodes.find(LonLat::new(east.max_lon(), east.min_lat())).unwrap();
        assert_eq!(tile.nodes.get(se).elev, 20.0);
        let _ = fs::remove_dir_all(&root);
    }

    fn has_node(tile: &AssembledTile, lon: f64, lat: f64) -> Option<GeoPoint> {
        tile.nodes
            .find(LonLat::new(lon, lat))
            .map(|i| tile.nodes.get(i))
    }

    #[test]
    fn test_neighbors_across_band_change() {
        // 22 degrees north: 1/8 degree wide buckets below, 1/4 above
        let wide = Bucket::new(0.2, 22.05);
        let narrow_west = Bucket::new(0.05, 21.9);
        let narrow_east = Bucket::new(0.2, 21.9);
        assert_eq!(wide.get_width(), 0.25);
        assert_eq!(narrow_east.get_width(), 0.125);

        let stitcher = TileStitcher::new("/nonexistent", wide, 1e-7);
        assert_eq!(
            stitcher.neighbors_on(Side::South),
            {
                let mut v = vec![narrow_west, narrow_east];
                v.sort_by_key(Bucket::gen_index);
                v
            }
        );

        let stitcher = TileStitcher::new("/nonexistent", narrow_east, 1e-7);
        assert_eq!(stitcher.neighbors_on(Side::North), vec![wide]);
        // The wide bucket's corner is not ours, its eastern neighbor's is
        assert!(stitcher.neighbors_on(Side::NorthWest).is_empty());
        assert_eq!(
            stitcher.neighbors_on(Side::NorthEast),
            vec![wide.sibling(1, 0)]
        );
    }

    #[test]
    fn test_narrow_tile_keeps_corners_under_wide_neighbor() {
        let root = scratch("band-wide-first");
        let wide = Bucket::new(0.2, 22.05);
        let narrow = Bucket::new(0.2, 21.9);
        run(&root, wide, &corner_nodes(&wide, 0.0), &[], 10.0);
        let tile = run(&root, narrow, &corner_nodes(&narrow, 0.0), &[], 20.0);

        let (w, e, s, n) = (narrow.min_lon(), narrow.max_lon(), narrow.min_lat(), narrow.max_lat());
        let nw = has_node(&tile, w, n).expect("NW corner kept");
        let ne = has_node(&tile, e, n).expect("NE corner kept");
        assert!(has_node(&tile, w, s).is_some());
        assert!(has_node(&tile, e, s).is_some());

        // Mid-edge corner sits on the wide tile's flat southern edge
        assert_eq!(nw.elev, 10.0);
        assert_eq!(ne.elev, 10.0);

        // And is published for later neighbors
        let north = read_shared_edge(&shared_path(&root, &narrow, Side::North)).unwrap();
        assert!(north.points.iter().any(|p| p.lon == w && p.lat == n));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_wide_tile_adopts_all_narrow_neighbors() {
        let root = scratch("band-narrow-first");
        let wide = Bucket::new(0.2, 22.05);
        let narrow_west = Bucket::new(0.05, 21.9);
        let narrow_east = Bucket::new(0.2, 21.9);

        let mut west_nodes = corner_nodes(&narrow_west, 0.0);
        west_nodes.unique_add(GeoPoint::new(0.06, narrow_west.max_lat(), 0.0), NodeKind::Polygon);
        run(&root, narrow_west, &west_nodes, &[], 20.0);
        run(&root, narrow_east, &corner_nodes(&narrow_east, 0.0), &[], 30.0);

        let tile = run(&root, wide, &corner_nodes(&wide, 0.0), &[], 10.0);
        let lat = wide.min_lat();
        for edge in [
            read_shared_edge(&shared_path(&root, &narrow_west, Side::North)).unwrap(),
            read_shared_edge(&shared_path(&root, &narrow_east, Side::North)).unwrap(),
        ] {
            for p in &edge.points {
                let got = has_node(&tile, p.lon, p.lat).expect("narrow edge node adopted");
                assert_eq!(got.elev.to_bits(), p.elev.to_bits());
            }
        }
        assert!(has_node(&tile, 0.06, lat).is_some());
        assert!(has_node(&tile, narrow_west.max_lon(), lat).is_some());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_restitch_is_idempotent() {
        let root = scratch("idempotent");
        let west = Bucket::new(0.01, 0.01);
        let east = west.sibling(1, 0);
        run(&root, west, &corner_nodes(&west, 0.0), &[], 10.0);

        let nodes = corner_nodes(&east, 0.0);
        let first = run(&root, east, &nodes, &[], 20.0);
        let second = run(&root, east, &nodes, &[], 20.0);
        assert_eq!(first.nodes.points(), second.nodes.points());
        assert_eq!(first.segments.as_slice(), second.segments.as_slice());
        let _ = fs::remove_dir_all(&root);
    }
}
