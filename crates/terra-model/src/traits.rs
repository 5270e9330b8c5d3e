// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Collaborator traits at the edges of the construction pipeline

use crate::{Bucket, ClippedPolygon, Result};

/// Supplier of polygon layers clipped to a tile
///
/// The construction pipeline only preserves this geometry as triangulation
/// constraints and area tags; it never edits or interprets it.
///
/// # Example
///
/// ```ignore
/// use terra_model::{Bucket, PolygonSource};
///
/// fn count_rings(source: &dyn PolygonSource, bucket: &Bucket) -> usize {
///     source
///         .get_clipped_polys(bucket)
///         .map(|polys| polys.iter().map(|p| p.contours.len()).sum())
///         .unwrap_or(0)
/// }
/// ```
pub trait PolygonSource: Send + Sync {
    /// Clipped polygons for the tile, in priority order (later wins)
    fn get_clipped_polys(&self, bucket: &Bucket) -> Result<Vec<ClippedPolygon>>;
}

/// In-memory polygon source returning the same polygons for every tile
#[derive(Clone, Debug, Default)]
pub struct StaticPolygons(pub Vec<ClippedPolygon>);

impl PolygonSource for StaticPolygons {
    fn get_clipped_polys(&self, _bucket: &Bucket) -> Result<Vec<ClippedPolygon>> {
        Ok(self.0.clone())
    }
}
