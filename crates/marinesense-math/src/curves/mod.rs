//! Parametric and spline curve families over tenor horizons.
//!
//! Both families conform to [`TenorCurve`], the evaluation contract the
//! term-structure layer fits against:
//!
//! - [`NelsonSiegel`]: parsimonious four-parameter forward-curve shape
//! - [`NaturalCubicSpline`]: knot-based alternative for curves the
//!   parametric family cannot express

mod cubic_spline;
mod nelson_siegel;

pub use cubic_spline::NaturalCubicSpline;
pub use nelson_siegel::NelsonSiegel;

/// A fitted curve evaluable at any non-negative tenor horizon.
///
/// Evaluation is a pure function of the curve's parameters: repeated
/// calls with the same horizon return identical values.
pub trait TenorCurve: Send + Sync {
    /// Returns the modeled rate at horizon `t` (years).
    fn rate_at(&self, t: f64) -> f64;

    /// Returns the observed-horizon range the curve was built from,
    /// as `(min, max)`. Horizons outside this range are extrapolated.
    fn fitted_range(&self) -> (f64, f64);

    /// Returns true when evaluating `t` requires extrapolation.
    fn is_extrapolated(&self, t: f64) -> bool {
        let (min, max) = self.fitted_range();
        t < min || t > max
    }
}
