// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tile construction pipeline
//!
//! [`TileConstructionDriver`] runs one bucket through
//!
//! ```text
//! LoadPolygons -> LoadDem -> FitLoop -> Triangulate1 -> Stitch
//!     -> Triangulate2 -> FixHeights -> BuildNormals -> Done
//! ```
//!
//! and writes the finished mesh under the output base. The fit loop
//! adjusts the DEM tolerance until the first-pass node count falls inside
//! the configured budget or the tolerance reaches its floor or ceiling.
//!
//! # Example
//!
//! ```ignore
//! let driver = TileConstructionDriver::new(config, "work", "out")?;
//! let path = driver.construct_tile(&Bucket::new(-122.375, 37.6))?;
//! ```

use crate::array::ElevationGrid;
use crate::config::ConstructConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::output::{assemble_mesh, mesh_path, write_mesh};
use crate::stitch::TileStitcher;
use crate::triangle::{TriangulationOrchestrator, TriangulationPass};
use crate::triangulation::{DelaunayEngine, TriangulationEngine};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use terra_model::{Bucket, ClippedPolygon, PolygonSource, TileMesh};
use terra_parser::PolygonFileSource;

/// Pipeline stage of one tile
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructState {
    LoadPolygons,
    LoadDem,
    FitLoop,
    Triangulate1,
    Stitch,
    Triangulate2,
    FixHeights,
    BuildNormals,
    Done,
}

/// Where the fit loop settled
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitOutcome {
    /// Final tolerance in meters
    pub error: f64,
    /// Fit/triangulate rounds performed
    pub iterations: usize,
    /// Nodes after the last first-pass triangulation
    pub node_count: usize,
}

/// Fit the grid and run the first triangulation pass until the node count
/// is acceptable.
///
/// Starting from `config.initial_error`, the tolerance is divided by
/// `error_factor` while there are fewer than `min_nodes` nodes and the
/// tolerance is still at or above `error_floor`, and multiplied while there
/// are more than `max_nodes` and it is at or below `error_ceiling`. The
/// loop also stops after `max_fit_iterations` rounds.
pub fn run_fit_loop(
    config: &ConstructConfig,
    grid: &mut ElevationGrid,
    tri: &mut TriangulationOrchestrator,
    polygons: &[ClippedPolygon],
) -> Result<FitOutcome> {
    let mut error = config.initial_error;
    let mut iterations = 0;

    loop {
        iterations += 1;
        grid.fit(error);
        tri.build(
            &grid.get_corner_node_list(),
            &grid.get_fit_node_list(),
            polygons,
        );
        if tri.node_count() < 3 {
            return Err(Error::integrity(format!(
                "fit produced {} nodes, at least 3 are needed",
                tri.node_count()
            )));
        }
        tri.run_triangulate(TriangulationPass::First)?;
        let count = tri.node_count();
        debug!("Fit iteration {}: error {:.3} -> {} nodes", iterations, error, count);

        let next = if count < config.min_nodes && error >= config.error_floor {
            Some(error / config.error_factor)
        } else if count > config.max_nodes && error <= config.error_ceiling {
            Some(error * config.error_factor)
        } else {
            None
        };

        match next {
            None => break,
            Some(_) if iterations >= config.max_fit_iterations => {
                warn!(
                    "Fit loop stopped after {} iterations at error {:.3} with {} nodes",
                    iterations, error, count
                );
                break;
            }
            Some(e) => error = e,
        }
    }

    Ok(FitOutcome {
        error,
        iterations,
        node_count: tri.node_count(),
    })
}

/// Outcome of an area run
#[derive(Clone, Debug, Default)]
pub struct BatchReport {
    /// Bucket indices whose mesh was written
    pub built: Vec<u32>,
    /// Bucket indices that failed, with the error class
    pub failed: Vec<(u32, ErrorKind)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Builds terrain meshes for buckets from files under a work directory
pub struct TileConstructionDriver {
    config: ConstructConfig,
    work_base: PathBuf,
    output_base: PathBuf,
    polygons: Box<dyn PolygonSource>,
    engine: Arc<dyn TriangulationEngine>,
}

impl TileConstructionDriver {
    /// Create a driver reading polygon layers and DEMs from `work_base`
    ///
    /// Fails with a configuration error if `config` does not validate.
    pub fn new(
        config: ConstructConfig,
        work_base: impl Into<PathBuf>,
        output_base: impl Into<PathBuf>,
    ) -> Result<Self> {
        config.validate()?;
        let work_base = work_base.into();
        let polygons = PolygonFileSource::new(&work_base, config.polygon_layers.clone());
        Ok(Self {
            config,
            work_base,
            output_base: output_base.into(),
            polygons: Box::new(polygons),
            engine: Arc::new(DelaunayEngine::new()),
        })
    }

    /// Replace the polygon source
    pub fn with_polygon_source(mut self, source: Box<dyn PolygonSource>) -> Self {
        self.polygons = source;
        self
    }

    /// Replace the triangulation engine
    pub fn with_engine(mut self, engine: Arc<dyn TriangulationEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &ConstructConfig {
        &self.config
    }

    /// DEM file for a bucket
    pub fn dem_path(&self, bucket: &Bucket) -> PathBuf {
        self.work_base
            .join(&self.config.dem_dir)
            .join(bucket.gen_base_path())
            .join(format!("{}.dem", bucket.gen_index()))
    }

    /// Root of the shared-edge files
    pub fn shared_root(&self) -> PathBuf {
        self.work_base.join(&self.config.shared_dir)
    }

    /// Output file for a bucket
    pub fn mesh_path(&self, bucket: &Bucket) -> PathBuf {
        mesh_path(&self.output_base, bucket, &self.config.mesh_extension)
    }

    fn enter(&self, bucket: &Bucket, state: ConstructState) {
        debug!("Tile {}: {:?}", bucket.gen_index(), state);
    }

    /// Run the full pipeline for one bucket and return the mesh
    pub fn build_tile(&self, bucket: &Bucket) -> Result<TileMesh> {
        self.enter(bucket, ConstructState::LoadPolygons);
        let polygons = self.polygons.get_clipped_polys(bucket)?;

        self.enter(bucket, ConstructState::LoadDem);
        let mut grid = ElevationGrid::open(self.dem_path(bucket))?;

        self.enter(bucket, ConstructState::FitLoop);
        let mut tri = TriangulationOrchestrator::from_config(self.engine.clone(), &self.config);
        let fit = run_fit_loop(&self.config, &mut grid, &mut tri, &polygons)?;

        // The last fit-loop iteration already ran the first pass
        self.enter(bucket, ConstructState::Triangulate1);
        info!(
            "Tile {}: fit settled at error {:.2} after {} iterations, {} nodes, {} triangles",
            bucket,
            fit.error,
            fit.iterations,
            fit.node_count,
            tri.triangle_count()
        );

        self.enter(bucket, ConstructState::Stitch);
        let mut stitcher = TileStitcher::new(self.shared_root(), *bucket, self.config.node_epsilon);
        stitcher.load_neighbor_shared()?;
        stitcher.split_tile(tri.nodes(), tri.segments(), &grid)?;
        stitcher.write_shared()?;
        let assembled = stitcher.assemble_tile()?;
        tri.rebuild(assembled);

        self.enter(bucket, ConstructState::Triangulate2);
        tri.run_triangulate(TriangulationPass::Second)?;

        self.enter(bucket, ConstructState::FixHeights);
        tri.fix_heights(&grid);

        self.enter(bucket, ConstructState::BuildNormals);
        let mesh = assemble_mesh(bucket, tri.nodes().points(), tri.elements())?;

        self.enter(bucket, ConstructState::Done);
        Ok(mesh)
    }

    /// Build one bucket and write its mesh; returns the written path
    pub fn construct_tile(&self, bucket: &Bucket) -> Result<PathBuf> {
        let mesh = self.build_tile(bucket)?;
        let path = self.mesh_path(bucket);
        write_mesh(&path, &mesh)?;
        info!(
            "Tile {}: {} nodes, {} triangles -> {}",
            bucket,
            mesh.node_count(),
            mesh.triangle_count(),
            path.display()
        );
        Ok(path)
    }

    /// Build every bucket in ascending index order.
    ///
    /// Buckets below `start_index` are skipped. A failing tile is logged
    /// and recorded; only configuration errors stop the run.
    pub fn construct_area(&self, buckets: &[Bucket], start_index: Option<u32>) -> Result<BatchReport> {
        let mut ordered = buckets.to_vec();
        ordered.sort_by_key(Bucket::gen_index);
        ordered.dedup();

        let mut report = BatchReport::default();
        for bucket in ordered {
            let index = bucket.gen_index();
            if start_index.is_some_and(|start| index < start) {
                continue;
            }
            match self.construct_tile(&bucket) {
                Ok(_) => report.built.push(index),
                Err(e) if e.aborts_run() => return Err(e),
                Err(e) => {
                    error!("Tile {} failed: {}: {}", bucket, e.kind(), e);
                    report.failed.push((index, e.kind()));
                }
            }
        }

        info!(
            "Area done: {} built, {} failed",
            report.built.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Buckets covering a rectangle given by center and half extents (degrees)
pub fn area_buckets(center_lon: f64, center_lat: f64, x_extent: f64, y_extent: f64) -> Vec<Bucket> {
    Bucket::covering(
        center_lon - x_extent,
        center_lat - y_extent,
        center_lon + x_extent,
        center_lat + y_extent,
    )
}
