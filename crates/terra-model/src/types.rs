// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Core types for terrain data representation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Elevation value marking a grid cell or query with no data
pub const NO_DATA: f64 = -9999.0;

/// Largest supported elevation grid dimension (columns or rows)
pub const MAX_GRID_DIM: usize = 1201;

/// Geodetic position: degrees longitude/latitude, meters elevation
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub elev: f64,
}

impl GeoPoint {
    /// Create a new point
    pub fn new(lon: f64, lat: f64, elev: f64) -> Self {
        Self { lon, lat, elev }
    }

    /// Horizontal position only
    pub fn lon_lat(&self) -> LonLat {
        LonLat::new(self.lon, self.lat)
    }
}

/// Horizontal geodetic position in degrees
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    /// Create a new position
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Lift to a [`GeoPoint`] at the given elevation
    pub fn with_elev(self, elev: f64) -> GeoPoint {
        GeoPoint::new(self.lon, self.lat, elev)
    }
}

/// Surface classification carried by polygon layers and output triangles
///
/// The pipeline never interprets these beyond preserving them; known
/// names get their own variant, anything else is kept verbatim.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum AreaType {
    /// Plain terrain not covered by any polygon
    #[default]
    Default,
    Airport,
    AirportObj,
    Hydro,
    Lake,
    Ocean,
    Landmass,
    Urban,
    Other(String),
}

impl AreaType {
    /// Parse an area type from its file name form
    pub fn parse(name: &str) -> Self {
        match name.trim() {
            "Default" => AreaType::Default,
            "Airport" | "AirportArea" => AreaType::Airport,
            "AirportObj" => AreaType::AirportObj,
            "Hydro" => AreaType::Hydro,
            "Lake" => AreaType::Lake,
            "Ocean" => AreaType::Ocean,
            "Landmass" => AreaType::Landmass,
            "Urban" => AreaType::Urban,
            other => AreaType::Other(other.to_string()),
        }
    }

    /// Name used in files and logs
    pub fn name(&self) -> &str {
        match self {
            AreaType::Default => "Default",
            AreaType::Airport => "Airport",
            AreaType::AirportObj => "AirportObj",
            AreaType::Hydro => "Hydro",
            AreaType::Lake => "Lake",
            AreaType::Ocean => "Ocean",
            AreaType::Landmass => "Landmass",
            AreaType::Urban => "Urban",
            AreaType::Other(name) => name,
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One closed ring of a polygon; the closing edge is implicit
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct Contour {
    pub points: Vec<LonLat>,
    pub is_hole: bool,
}

impl Contour {
    /// Create an outer ring
    pub fn outer(points: Vec<LonLat>) -> Self {
        Self {
            points,
            is_hole: false,
        }
    }

    /// Create a hole ring
    pub fn hole(points: Vec<LonLat>) -> Self {
        Self {
            points,
            is_hole: true,
        }
    }

    /// Ring edges as index pairs, including the closing edge
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (i, (i + 1) % n))
    }

    /// Even-odd point-in-ring test
    pub fn contains(&self, p: LonLat) -> bool {
        let mut inside = false;
        let n = self.points.len();
        if n < 3 {
            return false;
        }

        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.lat > p.lat) != (b.lat > p.lat) {
                let t = (p.lat - a.lat) / (b.lat - a.lat);
                if p.lon < a.lon + t * (b.lon - a.lon) {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Polygon layer geometry already clipped to one tile
#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ClippedPolygon {
    pub area: AreaType,
    pub contours: Vec<Contour>,
}

impl ClippedPolygon {
    /// Create a polygon with no rings
    pub fn new(area: AreaType) -> Self {
        Self {
            area,
            contours: Vec::new(),
        }
    }

    /// Add a ring
    pub fn add_contour(&mut self, contour: Contour) {
        self.contours.push(contour);
    }

    /// Total number of ring vertices
    pub fn point_count(&self) -> usize {
        self.contours.iter().map(|c| c.points.len()).sum()
    }

    /// Inside some outer ring and outside every hole
    pub fn contains(&self, p: LonLat) -> bool {
        let in_outer = self
            .contours
            .iter()
            .filter(|c| !c.is_hole)
            .any(|c| c.contains(p));
        in_outer && !self.contours.iter().filter(|c| c.is_hole).any(|c| c.contains(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Vec<LonLat> {
        vec![
            LonLat::new(min, min),
            LonLat::new(max, min),
            LonLat::new(max, max),
            LonLat::new(min, max),
        ]
    }

    #[test]
    fn test_area_type_parse() {
        assert_eq!(AreaType::parse("AirportArea"), AreaType::Airport);
        assert_eq!(AreaType::parse(" Hydro\n"), AreaType::Hydro);
        assert_eq!(
            AreaType::parse("Glacier"),
            AreaType::Other("Glacier".to_string())
        );
        assert_eq!(AreaType::parse("Glacier").name(), "Glacier");
    }

    #[test]
    fn test_contour_edges_close_ring() {
        let ring = Contour::outer(square(0.0, 1.0));
        let edges: Vec<_> = ring.edges().collect();
        assert_eq!(edges, vec![(0, 1), (1, 2), (2, 3), (3, 0)]);
    }

    #[test]
    fn test_polygon_with_hole_contains() {
        let mut poly = ClippedPolygon::new(AreaType::Lake);
        poly.add_contour(Contour::outer(square(0.0, 4.0)));
        poly.add_contour(Contour::hole(square(1.0, 3.0)));

        assert!(poly.contains(LonLat::new(0.5, 0.5)));
        assert!(!poly.contains(LonLat::new(2.0, 2.0)));
        assert!(!poly.contains(LonLat::new(5.0, 2.0)));
        assert_eq!(poly.point_count(), 8);
    }
}
