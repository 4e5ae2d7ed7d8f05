//! Nelson-Siegel forward-curve family.

use crate::curves::TenorCurve;
use crate::error::{MathError, MathResult};

/// Nelson-Siegel curve over tenor horizons.
///
/// The rate at horizon t is parameterized as:
/// ```text
/// r(t) = β₀ + β₁ * ((1 - e^(-t/τ)) / (t/τ))
///           + β₂ * ((1 - e^(-t/τ)) / (t/τ) - e^(-t/τ))
/// ```
///
/// - β₀: long-run level (asymptotic rate)
/// - β₁: slope (short end minus long end)
/// - β₂: curvature (hump around horizon τ)
/// - τ: decay rate, must be positive
///
/// The family is defined for every t ≥ 0, which is what lets a fitted
/// curve answer for tenors with no direct market quote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelsonSiegel {
    beta0: f64,
    beta1: f64,
    beta2: f64,
    tau: f64,
    fitted_min: f64,
    fitted_max: f64,
}

impl NelsonSiegel {
    /// Creates a curve from its four parameters and the observed horizon
    /// range it was fitted over.
    ///
    /// # Errors
    ///
    /// Returns an error if `tau` is not positive or any parameter is
    /// non-finite.
    pub fn new(
        beta0: f64,
        beta1: f64,
        beta2: f64,
        tau: f64,
        fitted_range: (f64, f64),
    ) -> MathResult<Self> {
        if tau <= 0.0 {
            return Err(MathError::invalid_input(format!(
                "tau must be positive, got {tau}"
            )));
        }
        if ![beta0, beta1, beta2, tau].iter().all(|p| p.is_finite()) {
            return Err(MathError::invalid_input("non-finite curve parameter"));
        }

        Ok(Self {
            beta0,
            beta1,
            beta2,
            tau,
            fitted_min: fitted_range.0,
            fitted_max: fitted_range.1,
        })
    }

    /// Returns the parameters as (β₀, β₁, β₂, τ).
    #[must_use]
    pub fn parameters(&self) -> (f64, f64, f64, f64) {
        (self.beta0, self.beta1, self.beta2, self.tau)
    }

    /// (1 - e^(-x)) / x, Taylor-expanded near zero for stability.
    #[must_use]
    pub fn slope_loading(x: f64) -> f64 {
        if x.abs() < 1e-10 {
            1.0 - x / 2.0 + x * x / 6.0
        } else {
            (1.0 - (-x).exp()) / x
        }
    }

    /// (1 - e^(-x)) / x - e^(-x), Taylor-expanded near zero.
    #[must_use]
    pub fn curvature_loading(x: f64) -> f64 {
        if x.abs() < 1e-10 {
            x / 2.0 - x * x / 3.0
        } else {
            Self::slope_loading(x) - (-x).exp()
        }
    }

    /// Evaluates the family at `t` for arbitrary raw parameters.
    ///
    /// Used by the fitting loop before the parameters are final; `tau`
    /// is floored away from zero so trial steps stay evaluable.
    #[must_use]
    pub fn evaluate_raw(params: &[f64; 4], t: f64) -> f64 {
        let tau = params[3].abs().max(1e-3);
        if t <= 0.0 {
            return params[0] + params[1];
        }
        let x = t / tau;
        params[0] + params[1] * Self::slope_loading(x) + params[2] * Self::curvature_loading(x)
    }
}

impl TenorCurve for NelsonSiegel {
    fn rate_at(&self, t: f64) -> f64 {
        Self::evaluate_raw(&[self.beta0, self.beta1, self.beta2, self.tau], t)
    }

    fn fitted_range(&self) -> (f64, f64) {
        (self.fitted_min, self.fitted_max)
    }
}
