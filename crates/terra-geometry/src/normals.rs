// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-vertex normals for a triangle mesh
//!
//! Face normals are unit cross products of counter-clockwise triangles.
//! A vertex normal is the unweighted mean of the normals of every triangle
//! using that vertex; it is not renormalized.

use crate::error::{Error, Result};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

/// For each node, the indices of the triangles that reference it
pub fn build_reverse_lookup(triangles: &[[usize; 3]], node_count: usize) -> Vec<Vec<usize>> {
    let mut reverse = vec![Vec::new(); node_count];
    for (t, tri) in triangles.iter().enumerate() {
        for &n in tri {
            if let Some(list) = reverse.get_mut(n) {
                list.push(t);
            }
        }
    }
    reverse
}

/// Unit normal of every triangle
///
/// Zero-area triangles fall back to the direction of their first vertex
/// from the earth's center, which is the local up direction to within the
/// ellipsoid's deflection.
pub fn compute_face_normals(
    triangles: &[[usize; 3]],
    points: &[Point3<f64>],
) -> Vec<Vector3<f64>> {
    triangles
        .par_iter()
        .map(|t| {
            let (p1, p2, p3) = (points[t[0]], points[t[1]], points[t[2]]);
            let n = (p2 - p1).cross(&(p3 - p1));
            n.try_normalize(f64::EPSILON)
                .or_else(|| p1.coords.try_normalize(f64::EPSILON))
                .unwrap_or_else(Vector3::z)
        })
        .collect()
}

/// Mean face normal around every node
///
/// Fails with an integrity error if any node has no incident triangle.
pub fn compute_vertex_normals(
    reverse: &[Vec<usize>],
    face_normals: &[Vector3<f64>],
) -> Result<Vec<Vector3<f64>>> {
    reverse
        .iter()
        .enumerate()
        .map(|(node, faces)| {
            if faces.is_empty() {
                return Err(Error::integrity(format!(
                    "node {} is not referenced by any triangle",
                    node
                )));
            }
            let sum = faces
                .iter()
                .fold(Vector3::zeros(), |acc, &f| acc + face_normals[f]);
            Ok(sum / faces.len() as f64)
        })
        .collect()
}

/// Reverse lookup, face normals and vertex normals in one call
pub fn build_vertex_normals(
    triangles: &[[usize; 3]],
    points: &[Point3<f64>],
) -> Result<Vec<Vector3<f64>>> {
    let reverse = build_reverse_lookup(triangles, points.len());
    let faces = compute_face_normals(triangles, points);
    compute_vertex_normals(&reverse, &faces)
}
