// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Finished tile mesh handed to the output serializer

use crate::{AreaType, GeoPoint};
use serde::{Deserialize, Serialize};

/// One output triangle: three node indices plus the surface it belongs to
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MeshTriangle {
    /// Node indices, counter-clockwise seen from above
    pub nodes: [u32; 3],
    pub area: AreaType,
}

/// Complete mesh for one bucket
///
/// `geodetic`, `cartesian` and `normals` are parallel lists indexed by node.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TileMesh {
    /// Bucket index this mesh belongs to
    pub bucket_index: u32,
    /// Cartesian (ECEF) center of the bucket; `cartesian` is relative to it
    pub gbs_center: [f64; 3],
    /// Radius of the sphere around `gbs_center` enclosing every node
    pub gbs_radius: f64,
    /// Node positions in degrees/meters
    pub geodetic: Vec<GeoPoint>,
    /// Node positions in meters relative to `gbs_center`
    pub cartesian: Vec<[f64; 3]>,
    /// Smoothed per-vertex normals
    pub normals: Vec<[f64; 3]>,
    /// Triangles
    pub triangles: Vec<MeshTriangle>,
}

impl TileMesh {
    /// Get node count
    pub fn node_count(&self) -> usize {
        self.geodetic.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of triangles tagged with the given area type
    pub fn area_triangle_count(&self, area: &AreaType) -> usize {
        self.triangles.iter().filter(|t| &t.area == area).count()
    }
}
