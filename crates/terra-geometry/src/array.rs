// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Elevation grid: loading, row-wise fitting and interpolation
//!
//! The grid holds two planes of `cols * rows` samples, both column-major
//! (`index = col * rows + row`):
//!
//! - `in_data`: raw elevations as read from the DEM
//! - `out_data`: the fitted subset selected by [`ElevationGrid::fit`];
//!   every unselected cell holds [`NO_DATA`]
//!
//! Positions are arc-seconds throughout; node lists are emitted in degrees.

use crate::error::{Error, Result};
use crate::fitter::{CurveFitter, LineFit};
use log::{debug, warn};
use rayon::prelude::*;
use std::path::Path;
use terra_model::{GeoPoint, NO_DATA};
use terra_parser::{parse_dem, read_dem, DemData, DemHeader};

/// Interpolation offsets smaller than this take the anchor sample directly
const INTERP_EPSILON: f64 = 1e-12;

const ARCSEC_PER_DEGREE: f64 = 3600.0;

/// Segmentation result for one grid row
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowFit {
    /// Breakpoint columns, including the endpoints `0` and `cols - 1`
    pub breakpoints: Vec<usize>,
    /// Smoothed values for interior breakpoints as `(col, elevation)`
    pub interior: Vec<(usize, f64)>,
}

/// Regular elevation grid with a fitted output plane
#[derive(Clone, Debug)]
pub struct ElevationGrid {
    origin_x: f64,
    origin_y: f64,
    cols: usize,
    rows: usize,
    col_step: f64,
    row_step: f64,
    in_data: Vec<f64>,
    out_data: Vec<f64>,
}

impl ElevationGrid {
    /// Read and parse a DEM file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let dem = read_dem(path)?;
        debug!(
            "Loaded DEM {} ({} x {} samples)",
            path.display(),
            dem.header.cols,
            dem.header.rows
        );
        Ok(Self::from_dem(dem))
    }

    /// Parse DEM text content
    pub fn parse(content: &str) -> Result<Self> {
        Ok(Self::from_dem(parse_dem(content)?))
    }

    /// Build from an already parsed DEM
    pub fn from_dem(dem: DemData) -> Self {
        let DemData { header, samples } = dem;
        let count = samples.len();
        Self {
            origin_x: header.origin_x,
            origin_y: header.origin_y,
            cols: header.cols,
            rows: header.rows,
            col_step: header.col_step,
            row_step: header.row_step,
            in_data: samples,
            out_data: vec![NO_DATA; count],
        }
    }

    /// Build a grid by sampling `f(col, row)`
    pub fn from_fn(header: DemHeader, f: impl Fn(usize, usize) -> f64) -> Result<Self> {
        if header.cols < 2 || header.rows < 2 {
            return Err(Error::format(format!(
                "grid must be at least 2 x 2, got {} x {}",
                header.cols, header.rows
            )));
        }
        let mut samples = Vec::with_capacity(header.sample_count());
        for col in 0..header.cols {
            for row in 0..header.rows {
                samples.push(f(col, row));
            }
        }
        Ok(Self::from_dem(DemData { header, samples }))
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Origin `(x, y)` in arc-seconds
    pub fn origin(&self) -> (f64, f64) {
        (self.origin_x, self.origin_y)
    }

    pub fn col_step(&self) -> f64 {
        self.col_step
    }

    pub fn row_step(&self) -> f64 {
        self.row_step
    }

    #[inline]
    fn index(&self, col: usize, row: usize) -> usize {
        col * self.rows + row
    }

    /// Raw sample
    #[inline]
    pub fn in_value(&self, col: usize, row: usize) -> f64 {
        self.in_data[self.index(col, row)]
    }

    /// Fitted sample, or [`NO_DATA`] if the cell was not selected
    #[inline]
    pub fn out_value(&self, col: usize, row: usize) -> f64 {
        self.out_data[self.index(col, row)]
    }

    /// Reset the output plane to [`NO_DATA`]
    pub fn outputmesh_init(&mut self) {
        self.out_data.iter_mut().for_each(|v| *v = NO_DATA);
    }

    /// Select a sparse subset of samples approximating the surface within
    /// `error` meters, row by row.
    ///
    /// The four corners are always selected. Returns the number of selected
    /// cells. Any previous selection is discarded.
    pub fn fit(&mut self, error: f64) -> usize {
        self.outputmesh_init();

        let last_col = self.cols - 1;
        let last_row = self.rows - 1;
        for (col, row) in [(0, 0), (last_col, 0), (0, last_row), (last_col, last_row)] {
            let i = self.index(col, row);
            self.out_data[i] = self.in_data[i];
        }

        let fits: Vec<RowFit> = (0..self.rows)
            .into_par_iter()
            .map(|row| self.fit_row(row, error))
            .collect();

        for (row, fit) in fits.iter().enumerate() {
            for &(col, value) in &fit.interior {
                let i = self.index(col, row);
                self.out_data[i] = value;
            }
        }

        let selected = self.out_data.iter().filter(|&&v| v != NO_DATA).count();
        debug!("Fit at error {:.2}: {} cells selected", error, selected);
        selected
    }

    /// Breakpoints of one row at the given tolerance
    pub fn row_breakpoints(&self, row: usize, error: f64) -> Vec<usize> {
        self.fit_row(row, error).breakpoints
    }

    /// Greedy segmentation of one row.
    ///
    /// Each segment starts from two samples and grows while the squared
    /// error of its running fit stays within `error^2`. The sample that
    /// breaks the tolerance is removed again and the segment is refit over
    /// the accepted range. The next segment starts at the last accepted
    /// column. Interior breakpoints get the mean of both adjacent lines.
    pub fn fit_row(&self, row: usize, error: f64) -> RowFit {
        let max_sq = error * error;
        let last = self.cols - 1;

        let mut breakpoints = vec![0];
        let mut interior = Vec::new();
        let mut prev: Option<LineFit> = None;
        let mut start = 0;

        while start < last {
            let mut fitter = CurveFitter::new();
            fitter.push(start as f64, self.in_value(start, row));
            fitter.push((start + 1) as f64, self.in_value(start + 1, row));

            let mut end = start + 1;
            for col in start + 2..=last {
                fitter.push(col as f64, self.in_value(col, row));
                if fitter.max_error() > max_sq {
                    fitter.pop();
                    break;
                }
                end = col;
            }

            let line = fitter.refit();
            if let Some(prev_line) = prev {
                let x = start as f64;
                interior.push((start, 0.5 * (prev_line.eval(x) + line.eval(x))));
            }

            breakpoints.push(end);
            prev = Some(line);
            start = end;
        }

        RowFit {
            breakpoints,
            interior,
        }
    }

    /// Elevation at an arc-second position by triangle-split bilinear
    /// interpolation.
    ///
    /// Returns [`NO_DATA`] (and logs a warning) when the position is outside
    /// the half-open domain `[origin, origin + (n - 1) * step)` on either
    /// axis.
    pub fn interpolate_altitude(&self, lon: f64, lat: f64) -> f64 {
        match self.try_interpolate(lon, lat) {
            Some(elev) => elev,
            None => {
                warn!(
                    "Elevation query ({}, {}) outside grid {}x{} at ({}, {})",
                    lon, lat, self.cols, self.rows, self.origin_x, self.origin_y
                );
                NO_DATA
            }
        }
    }

    /// Same as [`interpolate_altitude`](Self::interpolate_altitude) but
    /// silent, with `None` for out-of-domain queries.
    pub fn try_interpolate(&self, lon: f64, lat: f64) -> Option<f64> {
        let xindex = (lon - self.origin_x) / self.col_step;
        let yindex = (lat - self.origin_y) / self.row_step;

        // Written so that NaN fails every test
        let inside = xindex >= 0.0
            && xindex < (self.cols - 1) as f64
            && yindex >= 0.0
            && yindex < (self.rows - 1) as f64;
        if !inside {
            return None;
        }

        let x1 = xindex.floor() as usize;
        let y1 = yindex.floor() as usize;
        Some(self.cell_interpolate(x1, y1, xindex - x1 as f64, yindex - y1 as f64))
    }

    /// Interpolation with the position clamped onto the grid
    ///
    /// Used for nodes on the far edges, which the half-open domain of
    /// [`interpolate_altitude`](Self::interpolate_altitude) excludes.
    pub fn altitude_clamped(&self, lon: f64, lat: f64) -> f64 {
        let max_x = (self.cols - 1) as f64;
        let max_y = (self.rows - 1) as f64;
        let xindex = ((lon - self.origin_x) / self.col_step).clamp(0.0, max_x);
        let yindex = ((lat - self.origin_y) / self.row_step).clamp(0.0, max_y);
        if !(xindex.is_finite() && yindex.is_finite()) {
            return NO_DATA;
        }

        let x1 = (xindex.floor() as usize).min(self.cols - 2);
        let y1 = (yindex.floor() as usize).min(self.rows - 2);
        self.cell_interpolate(x1, y1, xindex - x1 as f64, yindex - y1 as f64)
    }

    /// Elevation at a position in degrees, clamped onto the grid
    ///
    /// This is the height every non-shared mesh node ends up with.
    pub fn elevation_at_degrees(&self, lon: f64, lat: f64) -> f64 {
        let (x, y) = (lon * ARCSEC_PER_DEGREE, lat * ARCSEC_PER_DEGREE);
        self.try_interpolate(x, y)
            .unwrap_or_else(|| self.altitude_clamped(x, y))
    }

    /// Interpolate inside cell `(x1, y1)` at fractional offsets `dx, dy`.
    ///
    /// The cell is split along its diagonal; the lower-right triangle is
    /// used when `dx > dy`.
    fn cell_interpolate(&self, x1: usize, y1: usize, dx: f64, dy: f64) -> f64 {
        let z1 = self.in_value(x1, y1);
        if dx > dy {
            // (x1, y1), (x1 + 1, y1), (x1 + 1, y1 + 1)
            let z2 = self.in_value(x1 + 1, y1);
            let z3 = self.in_value(x1 + 1, y1 + 1);
            if dx < INTERP_EPSILON {
                return z1;
            }
            let za = dx * (z2 - z1) + z1;
            let zb = dx * (z3 - z1) + z1;
            dy * (zb - za) / dx + za
        } else {
            // (x1, y1), (x1, y1 + 1), (x1 + 1, y1 + 1)
            let z2 = self.in_value(x1, y1 + 1);
            let z3 = self.in_value(x1 + 1, y1 + 1);
            if dy < INTERP_EPSILON {
                return z1;
            }
            let za = dy * (z2 - z1) + z1;
            let zb = dy * (z3 - z1) + z1;
            dx * (zb - za) / dy + za
        }
    }

    fn node_at(&self, col: usize, row: usize, elev: f64) -> GeoPoint {
        GeoPoint::new(
            (self.origin_x + col as f64 * self.col_step) / ARCSEC_PER_DEGREE,
            (self.origin_y + row as f64 * self.row_step) / ARCSEC_PER_DEGREE,
            elev,
        )
    }

    /// The four grid corners in degrees with their raw elevations
    ///
    /// Order: SW, SE, NE, NW.
    pub fn get_corner_node_list(&self) -> Vec<GeoPoint> {
        let (last_col, last_row) = (self.cols - 1, self.rows - 1);
        [(0, 0), (last_col, 0), (last_col, last_row), (0, last_row)]
            .into_iter()
            .map(|(col, row)| self.node_at(col, row, self.in_value(col, row)))
            .collect()
    }

    /// Every selected cell except the corners, in degrees with the fitted
    /// elevation, column-major order
    pub fn get_fit_node_list(&self) -> Vec<GeoPoint> {
        let (last_col, last_row) = (self.cols - 1, self.rows - 1);
        let mut nodes = Vec::new();
        for col in 0..self.cols {
            for row in 0..self.rows {
                let is_corner = (col == 0 || col == last_col) && (row == 0 || row == last_row);
                let value = self.out_value(col, row);
                if !is_corner && value != NO_DATA {
                    nodes.push(self.node_at(col, row, value));
                }
            }
        }
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn header(cols: usize, rows: usize, step: f64) -> DemHeader {
        DemHeader {
            origin_x: 0.0,
            origin_y: 0.0,
            cols,
            col_step: step,
            rows,
            row_step: step,
        }
    }

    fn flat_4x4() -> ElevationGrid {
        ElevationGrid::from_fn(header(4, 4, 3.0), |_, _| 100.0).unwrap()
    }

    /// Rises to col 4 then falls back: one sharp kink
    fn tent_row() -> ElevationGrid {
        let values = [0.0, 10.0, 20.0, 30.0, 40.0, 30.0, 20.0, 10.0, 0.0];
        ElevationGrid::from_fn(header(9, 2, 1.0), |col, _| values[col]).unwrap()
    }

    #[test]
    fn test_flat_grid_selects_only_corners() {
        let mut grid = flat_4x4();
        assert_eq!(grid.fit(200.0), 4);
        assert_eq!(grid.get_corner_node_list().len(), 4);
        assert!(grid.get_fit_node_list().is_empty());
        assert_eq!(grid.out_value(0, 0), 100.0);
        assert_eq!(grid.out_value(1, 1), NO_DATA);
    }

    #[test]
    fn test_linear_row_has_endpoint_breakpoints_only() {
        let grid = ElevationGrid::from_fn(header(12, 3, 1.0), |col, _| 2.5 * col as f64 + 10.0)
            .unwrap();
        let fit = grid.fit_row(1, 0.01);
        assert_eq!(fit.breakpoints, vec![0, 11]);
        assert!(fit.interior.is_empty());
    }

    #[test]
    fn test_tent_breaks_at_kink() {
        let grid = tent_row();
        let fit = grid.fit_row(0, 0.001);
        assert_eq!(fit.breakpoints, vec![0, 4, 8]);
        assert_eq!(fit.interior.len(), 1);
        assert_eq!(fit.interior[0].0, 4);
        assert_relative_eq!(fit.interior[0].1, 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_breakpoints_non_increasing_with_tolerance() {
        let grid = tent_row();
        let counts: Vec<usize> = [0.001, 1.0, 1e4]
            .iter()
            .map(|&e| grid.row_breakpoints(0, e).len())
            .collect();
        assert_eq!(counts, vec![3, 3, 2]);
        assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_fit_resets_previous_selection() {
        let mut grid = tent_row();
        let tight = grid.fit(0.001);
        let loose = grid.fit(1e4);
        assert!(tight > loose);
        assert_eq!(loose, 4);
    }

    #[test]
    fn test_interpolation_at_grid_point() {
        let grid = ElevationGrid::from_fn(header(4, 4, 3.0), |c, r| (c * 10 + r) as f64).unwrap();
        assert_eq!(grid.interpolate_altitude(3.0, 6.0), 12.0);
        assert_eq!(grid.interpolate_altitude(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_interpolation_within_triangle_bounds() {
        let grid =
            ElevationGrid::from_fn(header(3, 3, 1.0), |c, r| [[5.0, 9.0, 1.0], [2.0, 7.0, 3.0], [8.0, 4.0, 6.0]][c][r])
                .unwrap();
        // Lower triangle of cell (0, 0): z(0,0)=5, z(1,0)=2, z(1,1)=7
        let z = grid.interpolate_altitude(0.7, 0.2);
        assert!((2.0 - 1e-9..=7.0 + 1e-9).contains(&z));
        // Upper triangle of cell (1, 1): z(1,1)=7, z(1,2)=3, z(2,2)=6
        let z = grid.interpolate_altitude(1.25, 1.9);
        assert!((3.0 - 1e-9..=7.0 + 1e-9).contains(&z));
    }

    #[test]
    fn test_interpolation_flat_is_exact() {
        let grid = flat_4x4();
        assert_relative_eq!(grid.interpolate_altitude(4.5, 1.25), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_range_returns_sentinel() {
        let grid = flat_4x4();
        assert_eq!(grid.interpolate_altitude(-1.0, 3.0), NO_DATA);
        assert_eq!(grid.interpolate_altitude(3.0, 9.0), NO_DATA);
        assert_eq!(grid.interpolate_altitude(f64::NAN, 3.0), NO_DATA);
    }

    #[test]
    fn test_clamped_covers_far_edge() {
        let grid = ElevationGrid::from_fn(header(4, 4, 3.0), |c, r| (c * 10 + r) as f64).unwrap();
        assert_eq!(grid.try_interpolate(9.0, 9.0), None);
        assert_relative_eq!(grid.altitude_clamped(9.0, 9.0), 33.0, epsilon = 1e-9);
        assert_relative_eq!(grid.altitude_clamped(9.0, 4.5), 31.5, epsilon = 1e-9);
    }

    #[test]
    fn test_elevation_at_degrees_far_corner() {
        // 4 x 4 grid spanning one degree
        let grid = ElevationGrid::from_fn(header(4, 4, 1200.0), |c, r| (c * 10 + r) as f64).unwrap();
        assert_relative_eq!(grid.elevation_at_degrees(1.0, 1.0), 33.0, epsilon = 1e-9);
        assert_relative_eq!(grid.elevation_at_degrees(0.0, 0.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_corner_nodes_in_degrees() {
        let grid = ElevationGrid::from_fn(
            DemHeader {
                origin_x: 3600.0,
                origin_y: 7200.0,
                cols: 2,
                col_step: 1800.0,
                rows: 2,
                row_step: 1800.0,
            },
            |_, _| 1.0,
        )
        .unwrap();
        let corners = grid.get_corner_node_list();
        assert_eq!(corners[0], GeoPoint::new(1.0, 2.0, 1.0));
        assert_eq!(corners[2], GeoPoint::new(1.5, 2.5, 1.0));
    }

    #[test]
    fn test_parse_content() {
        let grid = ElevationGrid::parse("0 0\n2 1\n2 1\n1 2 3 4\n").unwrap();
        assert_eq!(grid.cols(), 2);
        assert_eq!(grid.in_value(1, 0), 3.0);
    }
}
