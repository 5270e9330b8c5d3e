// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Final mesh assembly and serialization

use crate::error::{Error, Result};
use crate::geodesy::geodetic_to_cartesian;
use crate::normals::build_vertex_normals;
use crate::triangle::TriElement;
use nalgebra::Point3;
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use terra_model::{Bucket, GeoPoint, MeshTriangle, TileMesh};

/// Where the mesh for `bucket` is written
pub fn mesh_path(output_base: &Path, bucket: &Bucket, extension: &str) -> PathBuf {
    output_base
        .join(bucket.gen_base_path())
        .join(format!("{}.{}", bucket.gen_index(), extension))
}

/// Convert finished nodes and triangles into a [`TileMesh`]
///
/// Cartesian positions are relative to the bucket center on the ellipsoid.
/// Fails if any node is left without a triangle.
pub fn assemble_mesh(bucket: &Bucket, nodes: &[GeoPoint], elements: &[TriElement]) -> Result<TileMesh> {
    if nodes.len() > u32::MAX as usize {
        return Err(Error::integrity(format!("{} nodes exceed u32 indices", nodes.len())));
    }

    let center = geodetic_to_cartesian(&GeoPoint::new(
        bucket.get_center_lon(),
        bucket.get_center_lat(),
        0.0,
    ));
    let wgs: Vec<Point3<f64>> = nodes.iter().map(geodetic_to_cartesian).collect();
    let triangles: Vec<[usize; 3]> = elements.iter().map(|e| e.nodes).collect();
    let normals = build_vertex_normals(&triangles, &wgs)?;

    let cartesian: Vec<[f64; 3]> = wgs
        .iter()
        .map(|p| {
            let v = *p - center;
            [v.x, v.y, v.z]
        })
        .collect();
    let gbs_radius = cartesian
        .iter()
        .map(|v| (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt())
        .fold(0.0, f64::max);

    Ok(TileMesh {
        bucket_index: bucket.gen_index(),
        gbs_center: [center.x, center.y, center.z],
        gbs_radius,
        geodetic: nodes.to_vec(),
        cartesian,
        normals: normals.iter().map(|n| [n.x, n.y, n.z]).collect(),
        triangles: elements
            .iter()
            .map(|e| MeshTriangle {
                nodes: e.nodes.map(|i| i as u32),
                area: e.area.clone(),
            })
            .collect(),
    })
}

/// Write a mesh as JSON, replacing any previous file
pub fn write_mesh(path: &Path, mesh: &TileMesh) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(writer, mesh)?;
    Ok(())
}

/// Read a mesh written by [`write_mesh`]
pub fn read_mesh(path: &Path) -> Result<TileMesh> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
