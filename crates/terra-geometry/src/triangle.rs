// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangulation orchestration for one tile
//!
//! Collects corner, fit and polygon nodes plus polygon boundary segments,
//! hands them to a [`TriangulationEngine`] and tags each resulting
//! triangle with the area type of the polygon containing it.
//!
//! ```ignore
//! let mut tri = TriangulationOrchestrator::from_config(engine, &config);
//! tri.build(&grid.get_corner_node_list(), &grid.get_fit_node_list(), &polys);
//! tri.run_triangulate(TriangulationPass::First)?;
//! ```

use crate::array::ElevationGrid;
use crate::config::ConstructConfig;
use crate::error::{Error, Result};
use crate::nodes::{NodeKind, TriNodes, TriSegments};
use crate::stitch::AssembledTile;
use crate::triangulation::{QualityOptions, TriangulationEngine};
use log::{debug, warn};
use nalgebra::Point2;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use terra_model::{AreaType, ClippedPolygon, GeoPoint, LonLat, NO_DATA};

/// Which of the two triangulation passes to run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriangulationPass {
    /// Before stitching; may refine for quality
    First,
    /// After stitching; must not disturb shared edges
    Second,
}

/// Output triangle with its area tag
#[derive(Clone, Debug, PartialEq)]
pub struct TriElement {
    pub nodes: [usize; 3],
    pub area: AreaType,
}

/// Owns the node and segment lists of one tile through both passes
pub struct TriangulationOrchestrator {
    engine: Arc<dyn TriangulationEngine>,
    pass1: QualityOptions,
    pass2: QualityOptions,
    nodes: TriNodes,
    segments: TriSegments,
    polygons: Vec<ClippedPolygon>,
    elements: Vec<TriElement>,
}

impl TriangulationOrchestrator {
    /// Create an orchestrator without quality refinement
    pub fn new(engine: Arc<dyn TriangulationEngine>, epsilon: f64) -> Self {
        Self {
            engine,
            pass1: QualityOptions::none(),
            pass2: QualityOptions::none(),
            nodes: TriNodes::new(epsilon),
            segments: TriSegments::new(),
            polygons: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Create an orchestrator with per-pass quality taken from `config`
    pub fn from_config(engine: Arc<dyn TriangulationEngine>, config: &ConstructConfig) -> Self {
        Self::new(engine, config.node_epsilon)
            .with_quality(
                TriangulationPass::First,
                QualityOptions::min_angle(config.pass1_min_angle, config.max_steiner_points),
            )
            .with_quality(
                TriangulationPass::Second,
                QualityOptions::min_angle(config.pass2_min_angle, config.max_steiner_points),
            )
    }

    pub fn with_quality(mut self, pass: TriangulationPass, quality: QualityOptions) -> Self {
        match pass {
            TriangulationPass::First => self.pass1 = quality,
            TriangulationPass::Second => self.pass2 = quality,
        }
        self
    }

    /// Reset and load nodes and constraints for a new attempt.
    ///
    /// Corners go in first, then fit nodes, then polygon vertices; a vertex
    /// within tolerance of an earlier node reuses it. Every contour becomes
    /// a closed chain of constraint segments. Contours that collapse to
    /// fewer than three distinct nodes are skipped with a warning.
    pub fn build(
        &mut self,
        corners: &[GeoPoint],
        fit_nodes: &[GeoPoint],
        polygons: &[ClippedPolygon],
    ) {
        self.nodes.clear();
        self.segments.clear();
        self.elements.clear();
        self.polygons = polygons.to_vec();

        for &p in corners {
            self.nodes.unique_add(p, NodeKind::Corner);
        }
        for &p in fit_nodes {
            self.nodes.unique_add(p, NodeKind::Fit);
        }

        for poly in polygons {
            for contour in &poly.contours {
                let ids: Vec<usize> = contour
                    .points
                    .iter()
                    .map(|p| self.nodes.unique_add(p.with_elev(NO_DATA), NodeKind::Polygon))
                    .collect();
                let distinct = ids.iter().collect::<FxHashSet<_>>().len();
                if distinct < 3 {
                    warn!(
                        "Skipping {} contour with {} distinct nodes",
                        poly.area, distinct
                    );
                    continue;
                }
                // Edges between merged vertices collapse and are ignored
                for (a, b) in contour.edges() {
                    self.segments.unique_add(ids[a], ids[b]);
                }
            }
        }

        debug!(
            "Built {} nodes and {} segments from {} polygons",
            self.nodes.len(),
            self.segments.len(),
            polygons.len()
        );
    }

    /// Replace nodes and segments with a stitched tile
    ///
    /// Polygons from the last [`build`](Self::build) are kept for tagging.
    pub fn rebuild(&mut self, tile: AssembledTile) {
        self.nodes = tile.nodes;
        self.segments = tile.segments;
        self.elements.clear();
    }

    /// Triangulate the current nodes and constraints.
    ///
    /// Steiner points inserted by the engine are appended to the node list.
    /// Returns the number of triangles.
    pub fn run_triangulate(&mut self, pass: TriangulationPass) -> Result<usize> {
        let quality = match pass {
            TriangulationPass::First => self.pass1,
            TriangulationPass::Second => self.pass2,
        };

        let input: Vec<Point2<f64>> = self
            .nodes
            .points()
            .iter()
            .map(|p| Point2::new(p.lon, p.lat))
            .collect();
        let out = self
            .engine
            .triangulate(&input, self.segments.as_slice(), &quality)?;

        if out.points.len() < input.len() {
            return Err(Error::integrity(format!(
                "engine returned {} points for {} input nodes",
                out.points.len(),
                input.len()
            )));
        }
        for p in &out.points[input.len()..] {
            self.nodes
                .simple_add(GeoPoint::new(p.x, p.y, NO_DATA), NodeKind::Steiner);
        }

        self.segments.clear();
        for &(a, b) in &out.segments {
            self.segments.unique_add(a, b);
        }

        let node_count = self.nodes.len();
        if let Some(bad) = out.triangles.iter().flatten().find(|&&i| i >= node_count) {
            return Err(Error::integrity(format!(
                "triangle references node {} of {}",
                bad, node_count
            )));
        }

        self.elements = out
            .triangles
            .iter()
            .map(|&nodes| TriElement {
                area: self.area_of(&nodes),
                nodes,
            })
            .collect();

        debug!(
            "{:?} pass: {} nodes ({} Steiner), {} triangles",
            pass,
            node_count,
            out.steiner_count(input.len()),
            self.elements.len()
        );
        Ok(self.elements.len())
    }

    /// Area of the last polygon containing the triangle centroid
    fn area_of(&self, tri: &[usize; 3]) -> AreaType {
        let (mut lon, mut lat) = (0.0, 0.0);
        for &i in tri {
            let p = self.nodes.get(i);
            lon += p.lon;
            lat += p.lat;
        }
        let centroid = LonLat::new(lon / 3.0, lat / 3.0);
        self.polygons
            .iter()
            .rev()
            .find(|poly| poly.contains(centroid))
            .map(|poly| poly.area.clone())
            .unwrap_or_default()
    }

    /// Set every non-shared node's elevation from the grid
    ///
    /// Returns the number of nodes updated.
    pub fn fix_heights(&mut self, grid: &ElevationGrid) -> usize {
        let mut updated = 0;
        for i in 0..self.nodes.len() {
            if self.nodes.kind(i) == NodeKind::Shared {
                continue;
            }
            let p = self.nodes.get(i);
            self.nodes.set_elev(i, grid.elevation_at_degrees(p.lon, p.lat));
            updated += 1;
        }
        updated
    }

    pub fn nodes(&self) -> &TriNodes {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn segments(&self) -> &[(usize, usize)] {
        self.segments.as_slice()
    }

    pub fn elements(&self) -> &[TriElement] {
        &self.elements
    }

    pub fn triangle_count(&self) -> usize {
        self.elements.len()
    }
}
