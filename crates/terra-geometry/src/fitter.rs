// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Least-squares line fitting
//!
//! Row segmentation grows a segment one sample at a time, so the fit is
//! maintained from running sums rather than recomputed from scratch.
//! [`CurveFitter`] keeps the accepted points alongside the sums so the
//! squared error can be checked after every addition.

/// Relative threshold below which the normal-equation denominator is zero
const DEGENERATE_EPS: f64 = 1e-12;

/// A fitted line `y = slope * x + intercept`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LineFit {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    /// Evaluate the line at `x`
    #[inline]
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Running sums for an incremental least-squares fit
#[derive(Clone, Copy, Debug, Default)]
pub struct RegressionAccumulator {
    n: usize,
    sum_x: f64,
    sum_y: f64,
    sum_xy: f64,
    sum_x2: f64,
}

impl RegressionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points accumulated
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Add a point
    pub fn push(&mut self, x: f64, y: f64) {
        self.n += 1;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xy += x * y;
        self.sum_x2 += x * x;
    }

    /// Remove a previously added point
    pub fn pop(&mut self, x: f64, y: f64) {
        if self.n == 0 {
            return;
        }
        self.n -= 1;
        self.sum_x -= x;
        self.sum_y -= y;
        self.sum_xy -= x * y;
        self.sum_x2 -= x * x;
    }

    /// Line through the accumulated points
    ///
    /// When every x is the same the slope is 0 and the intercept is the
    /// mean y.
    pub fn line(&self) -> LineFit {
        if self.n == 0 {
            return LineFit::default();
        }
        let n = self.n as f64;
        let denom = n * self.sum_x2 - self.sum_x * self.sum_x;
        let scale = (n * self.sum_x2).abs().max(1.0);
        if denom.abs() <= DEGENERATE_EPS * scale {
            return LineFit::new(0.0, self.sum_y / n);
        }
        let slope = (n * self.sum_xy - self.sum_x * self.sum_y) / denom;
        let intercept = (self.sum_y - slope * self.sum_x) / n;
        LineFit::new(slope, intercept)
    }
}

/// Full least-squares fit over paired samples
pub fn least_squares(xs: &[f64], ys: &[f64]) -> LineFit {
    let mut acc = RegressionAccumulator::new();
    for (&x, &y) in xs.iter().zip(ys) {
        acc.push(x, y);
    }
    acc.line()
}

/// Add one point to a running fit and return the updated line
pub fn least_squares_update(acc: &mut RegressionAccumulator, x: f64, y: f64) -> LineFit {
    acc.push(x, y);
    acc.line()
}

/// Largest squared vertical distance between the samples and `line`
///
/// Returns 0 for empty input.
pub fn max_error(xs: &[f64], ys: &[f64], line: &LineFit) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let d = y - line.eval(x);
            d * d
        })
        .fold(0.0, f64::max)
}

/// Growable segment fit used by row segmentation
#[derive(Clone, Debug, Default)]
pub struct CurveFitter {
    xs: Vec<f64>,
    ys: Vec<f64>,
    acc: RegressionAccumulator,
    line: LineFit,
}

impl CurveFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point and update the fit
    pub fn push(&mut self, x: f64, y: f64) -> LineFit {
        self.xs.push(x);
        self.ys.push(y);
        self.line = least_squares_update(&mut self.acc, x, y);
        self.line
    }

    /// Drop the most recently added point
    pub fn pop(&mut self) -> Option<(f64, f64)> {
        let x = self.xs.pop()?;
        let y = self.ys.pop()?;
        self.acc.pop(x, y);
        self.line = self.acc.line();
        Some((x, y))
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Current incremental fit
    pub fn line(&self) -> LineFit {
        self.line
    }

    /// Max squared error of the current points against the current fit
    pub fn max_error(&self) -> f64 {
        max_error(&self.xs, &self.ys, &self.line)
    }

    /// Current `(slope, intercept, max squared error)`
    pub fn snapshot(&self) -> (f64, f64, f64) {
        (self.line.slope, self.line.intercept, self.max_error())
    }

    /// Recompute the fit from the stored points
    pub fn refit(&mut self) -> LineFit {
        self.line = least_squares(&self.xs, &self.ys);
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = least_squares(&xs, &ys);
        assert_relative_eq!(fit.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, 1.0, epsilon = 1e-12);
        assert_eq!(max_error(&xs, &ys, &fit), 0.0);
    }

    #[test]
    fn test_single_point() {
        let fit = least_squares(&[4.0], &[9.0]);
        assert_eq!(fit, LineFit::new(0.0, 9.0));
    }

    #[test]
    fn test_identical_x_uses_mean() {
        let fit = least_squares(&[2.0, 2.0, 2.0], &[1.0, 2.0, 6.0]);
        assert_eq!(fit.slope, 0.0);
        assert_relative_eq!(fit.intercept, 3.0);
    }

    #[test]
    fn test_incremental_matches_full() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [0.5, 2.0, 1.5, 4.0, 3.5];
        let mut acc = RegressionAccumulator::new();
        let mut fit = LineFit::default();
        for (&x, &y) in xs.iter().zip(&ys) {
            fit = least_squares_update(&mut acc, x, y);
        }
        let full = least_squares(&xs, &ys);
        assert_relative_eq!(fit.slope, full.slope, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, full.intercept, epsilon = 1e-12);
    }

    #[test]
    fn test_max_error_squared() {
        let fit = LineFit::new(0.0, 0.0);
        assert_eq!(max_error(&[0.0, 1.0], &[3.0, -4.0], &fit), 16.0);
        assert_eq!(max_error(&[], &[], &fit), 0.0);
    }

    #[test]
    fn test_curve_fitter_pop_restores_fit() {
        let mut fitter = CurveFitter::new();
        fitter.push(0.0, 0.0);
        fitter.push(1.0, 1.0);
        let before = fitter.line();
        fitter.push(2.0, 10.0);
        assert!(fitter.max_error() > 1.0);
        assert_eq!(fitter.pop(), Some((2.0, 10.0)));
        assert_relative_eq!(fitter.line().slope, before.slope, epsilon = 1e-12);
        assert_eq!(fitter.len(), 2);
        assert_eq!(fitter.max_error(), 0.0);
    }

    #[test]
    fn test_snapshot_reports_worst_residual() {
        let mut fitter = CurveFitter::new();
        for (x, y) in [(0.0, 0.0), (1.0, 2.0), (2.0, 0.0)] {
            fitter.push(x, y);
        }
        // Best fit is y = 2/3; worst residual is 4/3 at x = 1
        let (slope, intercept, err) = fitter.snapshot();
        assert_relative_eq!(slope, 0.0, epsilon = 1e-12);
        assert_relative_eq!(intercept, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(err, 16.0 / 9.0, epsilon = 1e-12);
    }
}
