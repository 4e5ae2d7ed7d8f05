//! Natural cubic spline over tenor knots.

use crate::curves::TenorCurve;
use crate::error::{MathError, MathResult};

/// Natural cubic spline through (horizon, rate) knots.
///
/// The knot-based alternative to the parametric family: exact at every
/// observed tenor, C² smooth between knots, with zero second derivative
/// at the ends. Horizons beyond the knot range extrapolate linearly
/// along the boundary slope.
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalCubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at each knot; zero at both ends.
    second_derivs: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Builds a spline through the given knots.
    ///
    /// # Errors
    ///
    /// Returns an error with fewer than three knots, mismatched lengths,
    /// or non-increasing horizons.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> MathResult<Self> {
        if xs.len() != ys.len() {
            return Err(MathError::dimension_mismatch(
                format!("{} rates", xs.len()),
                format!("{} rates", ys.len()),
            ));
        }
        if xs.len() < 3 {
            return Err(MathError::insufficient_data(3, xs.len()));
        }
        for i in 1..xs.len() {
            if xs[i] <= xs[i - 1] {
                return Err(MathError::invalid_input(format!(
                    "knot horizons must be strictly increasing: {} >= {}",
                    xs[i - 1],
                    xs[i]
                )));
            }
        }

        let second_derivs = Self::solve_second_derivatives(&xs, &ys);
        Ok(Self {
            xs,
            ys,
            second_derivs,
        })
    }

    /// Solves the tridiagonal natural-spline system with the Thomas
    /// algorithm. The system is diagonally dominant, so no pivoting.
    fn solve_second_derivatives(xs: &[f64], ys: &[f64]) -> Vec<f64> {
        let n = xs.len();
        let mut m = vec![0.0; n];
        if n < 3 {
            return m;
        }

        let interior = n - 2;
        let mut diag = vec![0.0; interior];
        let mut rhs = vec![0.0; interior];
        let mut upper = vec![0.0; interior];

        for i in 0..interior {
            let h_prev = xs[i + 1] - xs[i];
            let h_next = xs[i + 2] - xs[i + 1];
            diag[i] = 2.0 * (h_prev + h_next);
            upper[i] = h_next;
            rhs[i] = 6.0
                * ((ys[i + 2] - ys[i + 1]) / h_next - (ys[i + 1] - ys[i]) / h_prev);
        }

        // Forward sweep: the sub-diagonal entry for row i is h between
        // knots i and i+1.
        for i in 1..interior {
            let lower = xs[i + 1] - xs[i];
            let factor = lower / diag[i - 1];
            diag[i] -= factor * upper[i - 1];
            rhs[i] -= factor * rhs[i - 1];
        }

        // Back substitution.
        m[interior] = rhs[interior - 1] / diag[interior - 1];
        for i in (0..interior - 1).rev() {
            m[i + 1] = (rhs[i] - upper[i] * m[i + 2]) / diag[i];
        }

        m
    }

    /// Evaluates the spline segment containing `t` (clamped to the knot
    /// range by the caller).
    fn segment_value(&self, i: usize, t: f64) -> f64 {
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - t) / h;
        let b = (t - self.xs[i]) / h;

        a * self.ys[i]
            + b * self.ys[i + 1]
            + ((a.powi(3) - a) * self.second_derivs[i]
                + (b.powi(3) - b) * self.second_derivs[i + 1])
                * h
                * h
                / 6.0
    }

    /// Derivative of the spline segment at `t`.
    fn segment_slope(&self, i: usize, t: f64) -> f64 {
        let h = self.xs[i + 1] - self.xs[i];
        let a = (self.xs[i + 1] - t) / h;
        let b = (t - self.xs[i]) / h;

        (self.ys[i + 1] - self.ys[i]) / h
            + ((3.0 * b * b - 1.0) * self.second_derivs[i + 1]
                - (3.0 * a * a - 1.0) * self.second_derivs[i])
                * h
                / 6.0
    }

    fn segment_index(&self, t: f64) -> usize {
        match self.xs.binary_search_by(|x| x.total_cmp(&t)) {
            Ok(i) => i.min(self.xs.len() - 2),
            Err(i) => i.saturating_sub(1).min(self.xs.len() - 2),
        }
    }
}

impl TenorCurve for NaturalCubicSpline {
    fn rate_at(&self, t: f64) -> f64 {
        let n = self.xs.len();
        if t <= self.xs[0] {
            let slope = self.segment_slope(0, self.xs[0]);
            return self.ys[0] + slope * (t - self.xs[0]);
        }
        if t >= self.xs[n - 1] {
            let slope = self.segment_slope(n - 2, self.xs[n - 1]);
            return self.ys[n - 1] + slope * (t - self.xs[n - 1]);
        }
        self.segment_value(self.segment_index(t), t)
    }

    fn fitted_range(&self) -> (f64, f64) {
        (self.xs[0], *self.xs.last().unwrap_or(&self.xs[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_passes_through_knots() {
        let xs = vec![0.25, 0.5, 1.0, 2.0];
        let ys = vec![10.0, 12.0, 11.0, 14.0];
        let spline = NaturalCubicSpline::new(xs.clone(), ys.clone()).unwrap();

        for (x, y) in xs.iter().zip(&ys) {
            assert_relative_eq!(spline.rate_at(*x), *y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_flat_knots_give_flat_curve() {
        let spline =
            NaturalCubicSpline::new(vec![0.25, 0.5, 1.0], vec![50.0, 50.0, 50.0]).unwrap();
        for t in [0.1, 0.3, 0.7, 1.0, 1.5] {
            assert_relative_eq!(spline.rate_at(t), 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_linear_knots_reproduce_line() {
        // A natural spline through collinear points is that line,
        // including the linear extrapolation region.
        let spline =
            NaturalCubicSpline::new(vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(spline.rate_at(1.5), 15.0, epsilon = 1e-9);
        assert_relative_eq!(spline.rate_at(4.0), 40.0, epsilon = 1e-9);
        assert_relative_eq!(spline.rate_at(0.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_bad_knots() {
        assert!(NaturalCubicSpline::new(vec![1.0, 2.0], vec![1.0, 2.0]).is_err());
        assert!(NaturalCubicSpline::new(vec![1.0, 1.0, 2.0], vec![1.0, 2.0, 3.0]).is_err());
        assert!(NaturalCubicSpline::new(vec![1.0, 2.0, 3.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_extrapolation_flagged() {
        let spline =
            NaturalCubicSpline::new(vec![0.25, 0.5, 1.0], vec![10.0, 11.0, 12.0]).unwrap();
        assert!(!spline.is_extrapolated(0.5));
        assert!(spline.is_extrapolated(2.0));
    }
}
