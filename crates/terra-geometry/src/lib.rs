// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Terra Geometry
//!
//! Builds a triangulated terrain mesh for one geodetic tile ("bucket")
//! from an elevation grid and a set of clipped area polygons.
//!
//! ## Overview
//!
//! - **Fitting**: Row-wise least-squares segmentation picks a sparse set of
//!   DEM samples that approximate the surface within a tolerance
//! - **Triangulation**: Constrained Delaunay triangulation through the
//!   [`TriangulationEngine`] trait, with polygon edges as constraints
//! - **Stitching**: Boundary nodes are reconciled with neighbor tiles via
//!   shared-edge files so adjacent meshes meet without cracks
//! - **Normals**: Per-vertex normals averaged from WGS84 cartesian faces
//!
//! ## Architecture
//!
//! - `ElevationGrid`: DEM samples, fitting and interpolation
//! - `TriangulationOrchestrator`: Node/segment lists and both passes
//! - `TileStitcher`: Shared-edge exchange state machine
//! - `TileConstructionDriver`: The per-tile pipeline and area batches
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use terra_geometry::{ConstructConfig, TileConstructionDriver};
//! use terra_model::Bucket;
//!
//! let driver = TileConstructionDriver::new(ConstructConfig::default(), "work", "out")?;
//! let path = driver.construct_tile(&Bucket::new(-122.375, 37.6))?;
//! println!("Mesh written to {}", path.display());
//! ```

pub mod array;
pub mod config;
pub mod construct;
pub mod error;
pub mod fitter;
pub mod geodesy;
pub mod nodes;
pub mod normals;
pub mod output;
pub mod stitch;
pub mod triangle;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector3};

// Re-export main types
pub use array::{ElevationGrid, RowFit};
pub use config::ConstructConfig;
pub use construct::{
    area_buckets, run_fit_loop, BatchReport, ConstructState, FitOutcome, TileConstructionDriver,
};
pub use error::{Error, ErrorKind, Result};
pub use fitter::{least_squares, least_squares_update, max_error, CurveFitter, LineFit};
pub use geodesy::geodetic_to_cartesian;
pub use nodes::{NodeKind, TriNodes, TriSegments};
pub use normals::{build_reverse_lookup, compute_face_normals, compute_vertex_normals};
pub use output::{assemble_mesh, mesh_path, read_mesh, write_mesh};
pub use stitch::{AssembledTile, SharedEdge, Side, StitchState, TileStitcher};
pub use triangle::{TriElement, TriangulationOrchestrator, TriangulationPass};
pub use triangulation::{DelaunayEngine, QualityOptions, TriangulationEngine, TriangulationOutput};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use terra_model::{AreaType, Bucket, ClippedPolygon, Contour, GeoPoint, LonLat, StaticPolygons};

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("terra-e2e-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    /// Write a 6 x 6 DEM exactly covering `bucket`
    fn write_dem(driver: &TileConstructionDriver, bucket: &Bucket, f: impl Fn(usize, usize) -> f64) {
        let step_x = bucket.get_width() * 3600.0 / 5.0;
        let step_y = bucket.get_height() * 3600.0 / 5.0;
        let mut text = format!(
            "{} {}\n6 {}\n6 {}\n",
            bucket.min_lon() * 3600.0,
            bucket.min_lat() * 3600.0,
            step_x,
            step_y
        );
        for col in 0..6 {
            let row: Vec<String> = (0..6).map(|r| f(col, r).to_string()).collect();
            text.push_str(&row.join(" "));
            text.push('\n');
        }
        let path = driver.dem_path(bucket);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    fn lake(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> ClippedPolygon {
        let mut poly = ClippedPolygon::new(AreaType::Lake);
        poly.add_contour(Contour::outer(vec![
            LonLat::new(min_lon, min_lat),
            LonLat::new(max_lon, min_lat),
            LonLat::new(max_lon, max_lat),
            LonLat::new(min_lon, max_lat),
        ]));
        poly
    }

    fn driver(root: &Path, polys: Vec<ClippedPolygon>) -> TileConstructionDriver {
        let config = ConstructConfig::default().with_node_budget(3, 960);
        TileConstructionDriver::new(config, root.join("work"), root.join("out"))
            .unwrap()
            .with_polygon_source(Box::new(StaticPolygons(polys)))
    }

    fn edge_nodes(mesh: &terra_model::TileMesh, lon: f64) -> Vec<GeoPoint> {
        let mut nodes: Vec<GeoPoint> = mesh
            .geodetic
            .iter()
            .filter(|p| (p.lon - lon).abs() < 1e-9)
            .copied()
            .collect();
        nodes.sort_by(|a, b| a.lat.total_cmp(&b.lat));
        nodes
    }

    #[test]
    fn test_flat_tile_end_to_end() {
        let root = scratch("flat");
        let bucket = Bucket::new(0.01, 0.01);
        let driver = driver(&root, Vec::new());
        write_dem(&driver, &bucket, |_, _| 100.0);

        let path = driver.construct_tile(&bucket).unwrap();
        let mesh = read_mesh(&path).unwrap();

        assert_eq!(mesh.bucket_index, bucket.gen_index());
        assert_eq!(mesh.node_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        for p in &mesh.geodetic {
            assert!((p.elev - 100.0).abs() < 1e-9, "elevation {}", p.elev);
        }
        for n in &mesh.normals {
            let up = geodetic_to_cartesian(&GeoPoint::new(0.0625, 0.0625, 0.0));
            let up = up.coords.normalize();
            let dot = n[0] * up.x + n[1] * up.y + n[2] * up.z;
            assert!(dot > 0.99, "normal {:?}", n);
        }
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_adjacent_tiles_share_edge_exactly() {
        let root = scratch("seam");
        let west = Bucket::new(0.01, 0.01);
        let east = west.sibling(1, 0);
        let seam = west.max_lon();

        // One lake straddling the seam, clipped per tile
        let west_driver = driver(&root, vec![lake(0.1, seam, 0.05, 0.075)]);
        let east_driver = driver(&root, vec![lake(seam, 0.15, 0.05, 0.075)]);
        write_dem(&west_driver, &west, |col, _| 10.0 * col as f64);
        write_dem(&east_driver, &east, |col, row| 1000.0 + 7.0 * (col + row) as f64);

        let west_mesh = read_mesh(&west_driver.construct_tile(&west).unwrap()).unwrap();
        let east_mesh = read_mesh(&east_driver.construct_tile(&east).unwrap()).unwrap();

        let west_edge = edge_nodes(&west_mesh, seam);
        let east_edge = edge_nodes(&east_mesh, seam);
        assert!(west_edge.len() >= 4);
        assert_eq!(west_edge.len(), east_edge.len());
        for (a, b) in west_edge.iter().zip(&east_edge) {
            assert_eq!(a.lon.to_bits(), b.lon.to_bits());
            assert_eq!(a.lat.to_bits(), b.lat.to_bits());
            assert_eq!(a.elev.to_bits(), b.elev.to_bits());
        }
        // The east tile took the west tile's heights along the seam
        assert!(east_edge.iter().all(|p| p.elev < 100.0));

        assert!(west_mesh.area_triangle_count(&AreaType::Lake) > 0);
        assert!(east_mesh.area_triangle_count(&AreaType::Lake) > 0);
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_area_run_continues_past_failures() {
        let root = scratch("area");
        let good = Bucket::new(0.01, 0.01);
        let missing = good.sibling(0, 1);
        let driver = driver(&root, Vec::new());
        write_dem(&driver, &good, |_, _| 5.0);

        let report = driver.construct_area(&[missing, good], None).unwrap();
        assert_eq!(report.built, vec![good.gen_index()]);
        assert_eq!(report.failed, vec![(missing.gen_index(), ErrorKind::Io)]);
        assert!(!report.is_success());

        // Starting past both indices builds nothing
        let start = good.gen_index().max(missing.gen_index()) + 1;
        let report = driver.construct_area(&[missing, good], Some(start)).unwrap();
        assert!(report.built.is_empty() && report.failed.is_empty());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_corrupt_dem_is_format_error() {
        let root = scratch("corrupt");
        let bucket = Bucket::new(0.01, 0.01);
        let driver = driver(&root, Vec::new());
        let path = driver.dem_path(&bucket);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "0 0\n6 90\n6 90\n1 2 3\n").unwrap();

        let err = driver.construct_tile(&bucket).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
        let _ = fs::remove_dir_all(&root);
    }
}
