// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WGS84 geodetic to earth-centered cartesian conversion

use nalgebra::Point3;
use terra_model::GeoPoint;

/// WGS84 ellipsoid constants
pub mod wgs84 {
    /// Semi-major axis (m)
    pub const A: f64 = 6_378_137.0;
    /// Flattening
    pub const F: f64 = 1.0 / 298.257_223_563;
    /// First eccentricity squared
    pub const E2: f64 = F * (2.0 - F);
}

/// Degrees/meters to ECEF meters
#[inline]
pub fn geodetic_to_cartesian(p: &GeoPoint) -> Point3<f64> {
    let (sl, cl) = p.lat.to_radians().sin_cos();
    let (so, co) = p.lon.to_radians().sin_cos();
    let n = wgs84::A / (1.0 - wgs84::E2 * sl * sl).sqrt();
    Point3::new(
        (n + p.elev) * cl * co,
        (n + p.elev) * cl * so,
        (n * (1.0 - wgs84::E2) + p.elev) * sl,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_equator_prime_meridian() {
        let p = geodetic_to_cartesian(&GeoPoint::new(0.0, 0.0, 0.0));
        assert_relative_eq!(p.x, wgs84::A, epsilon = 1e-6);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-6);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_north_pole() {
        let p = geodetic_to_cartesian(&GeoPoint::new(0.0, 90.0, 0.0));
        let b = wgs84::A * (1.0 - wgs84::F);
        assert_relative_eq!(p.z, b, epsilon = 1e-6);
    }

    #[test]
    fn test_elevation_raises_radius() {
        let low = geodetic_to_cartesian(&GeoPoint::new(10.0, 45.0, 0.0));
        let high = geodetic_to_cartesian(&GeoPoint::new(10.0, 45.0, 1000.0));
        assert_relative_eq!((high - low).norm(), 1000.0, epsilon = 1e-6);
    }
}
