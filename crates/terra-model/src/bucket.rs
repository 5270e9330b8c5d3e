// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geodetic tile ("bucket") identity
//!
//! The globe is cut into rows 1/8 degree tall. Each row is cut into columns
//! whose width depends on latitude so tiles stay roughly square on the
//! ground. A bucket is addressed by the integer degree cell it sits in plus
//! its column/row offset inside that cell.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Height of a bucket row in degrees
pub const BUCKET_SPAN: f64 = 0.125;

/// Half of [`BUCKET_SPAN`]
pub const HALF_BUCKET_SPAN: f64 = 0.5 * BUCKET_SPAN;

const SPAN_EPSILON: f64 = 1e-7;

/// Width in degrees of a bucket at the given latitude
pub fn bucket_span(lat: f64) -> f64 {
    let a = lat.abs();
    if a >= 89.0 {
        360.0
    } else if a >= 88.0 {
        8.0
    } else if a >= 86.0 {
        4.0
    } else if a >= 83.0 {
        2.0
    } else if a >= 76.0 {
        1.0
    } else if a >= 62.0 {
        0.5
    } else if a >= 22.0 {
        0.25
    } else {
        0.125
    }
}

/// Wrap a longitude into `[-180, 180)`
fn wrap_lon(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped >= 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// One geodetic tile
///
/// Two buckets compare equal iff they have the same index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Bucket {
    /// Floor of the longitude of the containing degree cell
    lon: i32,
    /// Floor of the latitude of the containing degree cell
    lat: i32,
    /// Column within the degree cell
    x: i32,
    /// Row within the degree cell (0..8)
    y: i32,
}

impl Bucket {
    /// Bucket containing the given geodetic position (degrees)
    pub fn new(dlon: f64, dlat: f64) -> Self {
        let dlon = wrap_lon(dlon);
        let dlat = dlat.clamp(-90.0, 90.0 - SPAN_EPSILON);
        let span = bucket_span(dlat);

        let (lon, x) = if span <= 1.0 {
            let lon = dlon.floor();
            let x = ((dlon - lon) / span + SPAN_EPSILON).floor();
            (lon as i32, (x as i32).min((1.0 / span) as i32 - 1))
        } else {
            let lon = (((dlon + SPAN_EPSILON) / span).floor() * span).max(-180.0);
            (lon as i32, 0)
        };

        let lat = dlat.floor();
        let y = ((dlat - lat) * 8.0 + SPAN_EPSILON).floor().min(7.0);

        Self {
            lon,
            lat: lat as i32,
            x,
            y: y as i32,
        }
    }

    /// Rebuild a bucket from its [`gen_index`](Self::gen_index)
    pub fn from_index(index: u32) -> Self {
        let index = index as i64;
        Self {
            lon: ((index >> 14) - 180) as i32,
            lat: (((index >> 6) & 0xff) - 90) as i32,
            x: (index & 0x07) as i32,
            y: ((index >> 3) & 0x07) as i32,
        }
    }

    /// Stable integer identity of this bucket
    pub fn gen_index(&self) -> u32 {
        (((self.lon + 180) << 14) + ((self.lat + 90) << 6) + (self.y << 3) + self.x) as u32
    }

    /// [`gen_index`](Self::gen_index) as a string, used for file names
    pub fn gen_index_str(&self) -> String {
        self.gen_index().to_string()
    }

    /// Hierarchical directory path: 10-degree block / 1-degree block
    ///
    /// e.g. `w130n30/w123n37`
    pub fn gen_base_path(&self) -> String {
        let top_lon = self.lon.div_euclid(10) * 10;
        let top_lat = self.lat.div_euclid(10) * 10;

        format!(
            "{}{:03}{}{:02}/{}{:03}{}{:02}",
            hemisphere_lon(top_lon),
            top_lon.abs(),
            hemisphere_lat(top_lat),
            top_lat.abs(),
            hemisphere_lon(self.lon),
            self.lon.abs(),
            hemisphere_lat(self.lat),
            self.lat.abs()
        )
    }

    /// Longitude of the bucket center
    pub fn get_center_lon(&self) -> f64 {
        let span = self.get_width();
        if span >= 1.0 {
            self.lon as f64 + span / 2.0
        } else {
            self.lon as f64 + self.x as f64 * span + span / 2.0
        }
    }

    /// Latitude of the bucket center
    pub fn get_center_lat(&self) -> f64 {
        self.lat as f64 + self.y as f64 / 8.0 + HALF_BUCKET_SPAN
    }

    /// Width of the bucket in degrees of longitude
    pub fn get_width(&self) -> f64 {
        bucket_span(self.lat as f64 + self.y as f64 / 8.0 + HALF_BUCKET_SPAN)
    }

    /// Height of the bucket in degrees of latitude
    pub fn get_height(&self) -> f64 {
        BUCKET_SPAN
    }

    /// Western edge longitude
    pub fn min_lon(&self) -> f64 {
        self.get_center_lon() - self.get_width() / 2.0
    }

    /// Eastern edge longitude
    pub fn max_lon(&self) -> f64 {
        self.get_center_lon() + self.get_width() / 2.0
    }

    /// Southern edge latitude
    pub fn min_lat(&self) -> f64 {
        self.get_center_lat() - HALF_BUCKET_SPAN
    }

    /// Northern edge latitude
    pub fn max_lat(&self) -> f64 {
        self.get_center_lat() + HALF_BUCKET_SPAN
    }

    /// Neighbor bucket offset by `dx` columns and `dy` rows
    ///
    /// The column width of the target row is used, so offsets across a
    /// span change land in the bucket that actually touches this one.
    pub fn sibling(&self, dx: i32, dy: i32) -> Self {
        let clat = (self.get_center_lat() + dy as f64 * BUCKET_SPAN)
            .clamp(-90.0 + HALF_BUCKET_SPAN, 90.0 - HALF_BUCKET_SPAN);
        let span = bucket_span(clat);
        let clon = wrap_lon(self.get_center_lon() + dx as f64 * span);
        Bucket::new(clon, clat)
    }

    /// All buckets intersecting the given lon/lat rectangle, in index order
    pub fn covering(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<Bucket> {
        let mut buckets = Vec::new();
        let mut lat = min_lat;
        while lat <= max_lat {
            let row = Bucket::new(min_lon, lat);
            let mut lon = row.get_center_lon();
            let span = row.get_width();
            while lon - span / 2.0 <= max_lon {
                buckets.push(Bucket::new(lon, lat));
                lon += span;
            }
            lat += BUCKET_SPAN;
        }

        buckets.sort_by_key(|b| b.gen_index());
        buckets.dedup();
        buckets
    }
}

fn hemisphere_lon(lon: i32) -> char {
    if lon < 0 {
        'w'
    } else {
        'e'
    }
}

fn hemisphere_lat(lat: i32) -> char {
    if lat < 0 {
        's'
    } else {
        'n'
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.gen_index(), self.gen_base_path())
    }
}
