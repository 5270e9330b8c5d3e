// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clipped polygon layer files
//!
//! Each file holds any number of polygons:
//!
//! ```text
//! <area-type-name>
//! <ring-count>
//! <point-count> <hole-flag 0|1>
//! <lon> <lat>        (point-count lines)
//! ...                (repeated per ring)
//! ```

use crate::tokenizer::Cursor;
use std::path::{Path, PathBuf};
use terra_model::{
    AreaType, Bucket, ClippedPolygon, Contour, LonLat, ParseError, PolygonSource, Result,
};

/// Parse polygon file content
pub fn parse_polygons(content: &str) -> Result<Vec<ClippedPolygon>> {
    let mut cursor = Cursor::new(content);
    let mut polys = Vec::new();

    while !cursor.at_end() {
        let name = cursor
            .next_word()
            .ok_or_else(|| ParseError::format("expected area type name"))?;
        let mut poly = ClippedPolygon::new(AreaType::parse(name));

        let ring_count = cursor
            .next_count()
            .ok_or_else(|| ParseError::format(format!("{}: expected ring count", name)))?;

        for ring in 0..ring_count {
            poly.add_contour(parse_ring(&mut cursor, name, ring)?);
        }
        polys.push(poly);
    }

    Ok(polys)
}

fn parse_ring(cursor: &mut Cursor<'_>, name: &str, ring: usize) -> Result<Contour> {
    let point_count = cursor.next_count().ok_or_else(|| {
        ParseError::format(format!("{} ring {}: expected point count", name, ring))
    })?;
    let hole_flag = cursor.next_count().ok_or_else(|| {
        ParseError::format(format!("{} ring {}: expected hole flag", name, ring))
    })?;

    let mut points = Vec::with_capacity(point_count);
    for i in 0..point_count {
        let lon = cursor.next_number();
        let lat = cursor.next_number();
        match (lon, lat) {
            (Some(lon), Some(lat)) => points.push(LonLat::new(lon, lat)),
            _ => {
                return Err(ParseError::format(format!(
                    "{} ring {}: bad or missing point {} of {}",
                    name, ring, i, point_count
                )))
            }
        }
    }

    // Closing point is implicit
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }

    Ok(Contour {
        points,
        is_hole: hole_flag != 0,
    })
}

/// Polygon source reading per-tile layer files from a work directory
///
/// For each layer, looks for `<work_base>/<layer>/<base_path>/<index>.poly`.
/// Layers are returned in the configured order; missing files are skipped.
#[derive(Clone, Debug)]
pub struct PolygonFileSource {
    work_base: PathBuf,
    layers: Vec<String>,
}

impl PolygonFileSource {
    /// Create a source over the given layers
    pub fn new(work_base: impl Into<PathBuf>, layers: Vec<String>) -> Self {
        Self {
            work_base: work_base.into(),
            layers,
        }
    }

    /// File holding one layer's polygons for a bucket
    pub fn layer_path(&self, layer: &str, bucket: &Bucket) -> PathBuf {
        self.work_base
            .join(layer)
            .join(bucket.gen_base_path())
            .join(format!("{}.poly", bucket.gen_index()))
    }

    /// Configured layers
    pub fn layers(&self) -> &[String] {
        &self.layers
    }
}

/// Read one polygon file
pub fn read_polygons(path: impl AsRef<Path>) -> Result<Vec<ClippedPolygon>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ParseError::FileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_polygons(&content)
}

impl PolygonSource for PolygonFileSource {
    fn get_clipped_polys(&self, bucket: &Bucket) -> Result<Vec<ClippedPolygon>> {
        let mut polys = Vec::new();
        for layer in &self.layers {
            let path = self.layer_path(layer, bucket);
            if path.exists() {
                polys.extend(read_polygons(&path)?);
            }
        }
        Ok(polys)
    }
}
