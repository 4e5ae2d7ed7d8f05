//! Term structure modeling for FFA forward curves.
//!
//! [`TermStructureModel`] fits a smooth curve shape to a table of
//! observed forward curves and predicts rates at arbitrary tenor
//! horizons, including tenors with no direct market quote. The curve
//! family is selected by [`CurveMethod`]; both families conform to the
//! same fit/predict contract.
//!
//! # Fitting
//!
//! The default Nelson-Siegel fit exploits the family's structure: for a
//! fixed decay rate τ the model is linear in (β₀, β₁, β₂), so the fit
//! profiles the betas by weighted least squares over a grid of τ
//! candidates, then polishes all four parameters with a bounded-budget
//! descent. A fit whose residual stays a large fraction of the observed
//! rate scale surfaces as a fit failure carrying the last parameters
//! and residual norm.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_math::curves::{NaturalCubicSpline, NelsonSiegel, TenorCurve};
use marinesense_math::optimization::{minimize, OptimizerConfig};
use marinesense_math::MathError;

use crate::forward_table::ForwardCurveTable;

/// Curve family used by a [`TermStructureModel`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveMethod {
    /// Parsimonious four-parameter Nelson-Siegel shape (default).
    #[default]
    NelsonSiegel,
    /// Natural cubic spline through per-tenor mean rates.
    CubicSpline,
}

/// Configuration for term structure fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermStructureConfig {
    /// Curve family to fit.
    pub method: CurveMethod,
    /// Iteration budget for the nonlinear polish step.
    pub max_iterations: usize,
    /// Number of decay-rate candidates in the profiling grid.
    pub tau_grid_size: usize,
    /// Optional recency half-life in days; older observations are
    /// down-weighted by `0.5^(age / half_life)`. `None` weighs all
    /// observations equally.
    pub recency_half_life_days: Option<f64>,
    /// Variance multiplier applied to extrapolated horizons by
    /// [`TermStructureModel::rate_uncertainty`].
    pub extrapolation_inflation: f64,
}

impl Default for TermStructureConfig {
    fn default() -> Self {
        Self {
            method: CurveMethod::default(),
            max_iterations: 2_000,
            tau_grid_size: 40,
            recency_half_life_days: None,
            extrapolation_inflation: 4.0,
        }
    }
}

/// Fitted coefficients of the curve shape.
///
/// Owned exclusively by one model instance and replaced wholesale on
/// each fit, never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CurveParameters {
    /// Nelson-Siegel coefficients.
    NelsonSiegel {
        /// Long-run level.
        beta0: f64,
        /// Slope (short end minus long end).
        beta1: f64,
        /// Curvature.
        beta2: f64,
        /// Decay rate.
        tau: f64,
    },
    /// Spline knots: per-tenor horizons and fitted rates.
    CubicSpline {
        /// Knot horizons in years.
        horizons: Vec<f64>,
        /// Fitted rate at each knot.
        rates: Vec<f64>,
    },
}

/// Diagnostics from the last successful fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Iterations consumed by the polish step (0 for the spline).
    pub iterations: usize,
    /// Weighted root-mean-square residual.
    pub residual_rms: f64,
    /// Weighted mean squared residual, the per-tenor fit variance fed
    /// to the uncertainty layer.
    pub residual_variance: f64,
}

/// One predicted point on the fitted curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    /// Queried horizon in years.
    pub horizon: f64,
    /// Model-implied rate.
    pub rate: f64,
    /// True when the horizon lies outside the fitted range; such
    /// points are lower-confidence for the uncertainty layer.
    pub extrapolated: bool,
}

#[derive(Debug, Clone)]
enum FittedShape {
    NelsonSiegel(NelsonSiegel),
    Spline(NaturalCubicSpline),
}

impl FittedShape {
    fn curve(&self) -> &dyn TenorCurve {
        match self {
            Self::NelsonSiegel(ns) => ns,
            Self::Spline(spline) => spline,
        }
    }
}

#[derive(Debug, Clone)]
struct FittedState {
    shape: FittedShape,
    parameters: CurveParameters,
    diagnostics: FitDiagnostics,
}

/// One weighted (horizon, rate) observation point.
struct FitPoint {
    horizon: f64,
    rate: f64,
    weight: f64,
}

/// Term structure model over FFA forward curves.
#[derive(Debug, Clone)]
pub struct TermStructureModel {
    config: TermStructureConfig,
    state: Option<FittedState>,
}

impl Default for TermStructureModel {
    fn default() -> Self {
        Self::new(TermStructureConfig::default())
    }
}

impl TermStructureModel {
    /// Creates an unfitted model with the given configuration.
    #[must_use]
    pub fn new(config: TermStructureConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Creates an unfitted model using the given curve family and
    /// default settings otherwise.
    #[must_use]
    pub fn with_method(method: CurveMethod) -> Self {
        Self::new(TermStructureConfig {
            method,
            ..TermStructureConfig::default()
        })
    }

    /// Returns true once a fit has succeeded.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Returns the fitted parameters, if any.
    #[must_use]
    pub fn parameters(&self) -> Option<&CurveParameters> {
        self.state.as_ref().map(|s| &s.parameters)
    }

    /// Returns diagnostics from the last successful fit, if any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.state.as_ref().map(|s| &s.diagnostics)
    }

    /// Fits the configured curve family to the observed forward curves.
    ///
    /// # Errors
    ///
    /// Returns `FitFailure` when the table is empty, the data is
    /// degenerate for the chosen family, or the fitted residual remains
    /// a large fraction of the observed rate scale.
    pub fn fit(&mut self, table: &ForwardCurveTable) -> ForecastResult<()> {
        if table.is_empty() {
            return Err(ForecastError::fit_failure(
                0,
                f64::NAN,
                "no forward curve observations provided",
            ));
        }

        let points = self.collect_points(table);
        let state = match self.config.method {
            CurveMethod::NelsonSiegel => self.fit_nelson_siegel(table, &points)?,
            CurveMethod::CubicSpline => self.fit_spline(table, &points)?,
        };

        log::debug!(
            "term structure fit: rms {:.4e} over {} observations",
            state.diagnostics.residual_rms,
            table.observations().len()
        );
        self.state = Some(state);
        Ok(())
    }

    /// Predicts rates at the given horizons.
    ///
    /// Evaluation is a pure function of the fitted parameters, so
    /// repeated calls with identical horizons return identical output.
    /// Horizons outside the observed range are answered by moderate
    /// extrapolation and flagged as such.
    ///
    /// # Errors
    ///
    /// Returns `NotFitted` when called before a successful fit.
    pub fn predict(&self, horizons: &[f64]) -> ForecastResult<Vec<CurvePoint>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::not_fitted("TermStructureModel"))?;

        let curve = state.shape.curve();
        Ok(horizons
            .iter()
            .map(|&h| CurvePoint {
                horizon: h,
                rate: curve.rate_at(h),
                extrapolated: curve.is_extrapolated(h),
            })
            .collect())
    }

    /// Per-horizon fit variance for the uncertainty layer.
    ///
    /// Interpolated horizons carry the fit's residual variance;
    /// extrapolated horizons are inflated by the configured multiplier.
    ///
    /// # Errors
    ///
    /// Returns `NotFitted` when called before a successful fit.
    pub fn rate_uncertainty(&self, horizons: &[f64]) -> ForecastResult<Vec<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::not_fitted("TermStructureModel"))?;

        let base = state.diagnostics.residual_variance;
        let curve = state.shape.curve();
        Ok(horizons
            .iter()
            .map(|&h| {
                if curve.is_extrapolated(h) {
                    base * self.config.extrapolation_inflation
                } else {
                    base
                }
            })
            .collect())
    }

    /// Flattens the table into weighted (horizon, rate) points.
    fn collect_points(&self, table: &ForwardCurveTable) -> Vec<FitPoint> {
        let horizons = table.horizons();
        let latest = table.latest_date();

        let mut points = Vec::with_capacity(table.observations().len() * horizons.len());
        for obs in table.observations() {
            let weight = match (self.config.recency_half_life_days, latest) {
                (Some(half_life), Some(latest)) if half_life > 0.0 => {
                    let age = (latest - obs.date).num_days() as f64;
                    0.5_f64.powf(age / half_life)
                }
                _ => 1.0,
            };
            for (&horizon, &rate) in horizons.iter().zip(obs.rates()) {
                points.push(FitPoint {
                    horizon,
                    rate,
                    weight,
                });
            }
        }
        points
    }

    fn fit_nelson_siegel(
        &self,
        table: &ForwardCurveTable,
        points: &[FitPoint],
    ) -> ForecastResult<FittedState> {
        let horizons = table.horizons();
        if horizons.len() < 3 {
            return Err(ForecastError::fit_failure(
                0,
                f64::NAN,
                format!(
                    "Nelson-Siegel fit needs at least 3 tenor columns, got {}",
                    horizons.len()
                ),
            ));
        }

        let min_h = horizons[0];
        let max_h = *horizons.last().unwrap_or(&min_h);

        // Profile the linear betas over a log-spaced grid of decay rates.
        let lo = (min_h / 2.0).max(0.01);
        let hi = (max_h * 3.0).max(lo * 2.0);
        let n_grid = self.config.tau_grid_size.max(2);

        let mut best: Option<([f64; 4], f64)> = None;
        for k in 0..n_grid {
            let frac = k as f64 / (n_grid - 1) as f64;
            let tau = lo * (hi / lo).powf(frac);
            if let Some((betas, sse)) = Self::profile_betas(points, tau) {
                if best.as_ref().map_or(true, |(_, best_sse)| sse < *best_sse) {
                    best = Some(([betas[0], betas[1], betas[2], tau], sse));
                }
            }
        }

        let (grid_params, grid_sse) = best.ok_or_else(|| {
            ForecastError::fit_failure(
                0,
                f64::NAN,
                "degenerate forward curve data: normal equations singular for every decay candidate",
            )
        })?;

        // Polish all four parameters under a hard iteration budget.
        let objective = |p: &[f64]| -> f64 {
            let params = [p[0], p[1], p[2], p[3]];
            points
                .iter()
                .map(|pt| {
                    let r = pt.rate - NelsonSiegel::evaluate_raw(&params, pt.horizon);
                    pt.weight * r * r
                })
                .sum()
        };
        let opt_config = OptimizerConfig {
            tolerance: 1e-8 * (1.0 + grid_sse),
            max_iterations: self.config.max_iterations,
            gradient_step: 1e-6,
        };
        let polished = minimize(objective, &grid_params, &opt_config)
            .map_err(|e| ForecastError::fit_failure(0, grid_sse.sqrt(), e.to_string()))?;

        let (params, sse, iterations) = if polished.objective <= grid_sse {
            let p = [
                polished.parameters[0],
                polished.parameters[1],
                polished.parameters[2],
                polished.parameters[3],
            ];
            (p, polished.objective, polished.iterations)
        } else {
            (grid_params, grid_sse, polished.iterations)
        };

        let total_weight: f64 = points.iter().map(|p| p.weight).sum();
        let residual_variance = sse / total_weight;
        let residual_rms = residual_variance.sqrt();

        // Acceptance is residual-based, not gradient-based: the profiled
        // grid already lands near the optimum, and on rates quoted in the
        // thousands the polish can exhaust its budget long before an
        // absolute gradient tolerance is reachable. A fit fails only when
        // the residual stays a large fraction of the observed rate scale,
        // meaning the family cannot explain the data.
        let rate_scale = (points
            .iter()
            .map(|p| p.weight * p.rate * p.rate)
            .sum::<f64>()
            / total_weight)
            .sqrt();
        if !residual_rms.is_finite() || residual_rms > 0.5 * (1.0 + rate_scale) {
            return Err(ForecastError::fit_failure(
                polished.iterations,
                residual_rms,
                format!(
                    "curve family cannot explain the observed rates \
                     (residual rms {residual_rms:.4} against rate scale {rate_scale:.4}); \
                     last parameters beta0={:.4}, beta1={:.4}, beta2={:.4}, tau={:.4}",
                    params[0], params[1], params[2], params[3]
                ),
            ));
        }

        let tau = params[3].abs().max(1e-3);
        let curve = NelsonSiegel::new(params[0], params[1], params[2], tau, (min_h, max_h))
            .map_err(|e: MathError| {
                ForecastError::fit_failure(iterations, residual_rms, e.to_string())
            })?;

        Ok(FittedState {
            shape: FittedShape::NelsonSiegel(curve),
            parameters: CurveParameters::NelsonSiegel {
                beta0: params[0],
                beta1: params[1],
                beta2: params[2],
                tau,
            },
            diagnostics: FitDiagnostics {
                iterations,
                residual_rms,
                residual_variance,
            },
        })
    }

    /// Weighted least squares for (β₀, β₁, β₂) at a fixed τ. Returns
    /// `None` when the normal equations are singular.
    fn profile_betas(points: &[FitPoint], tau: f64) -> Option<(DVector<f64>, f64)> {
        let mut xtx = DMatrix::<f64>::zeros(3, 3);
        let mut xty = DVector::<f64>::zeros(3);

        for pt in points {
            let x = pt.horizon / tau;
            let row = [
                1.0,
                NelsonSiegel::slope_loading(x),
                NelsonSiegel::curvature_loading(x),
            ];
            for i in 0..3 {
                xty[i] += pt.weight * row[i] * pt.rate;
                for j in 0..3 {
                    xtx[(i, j)] += pt.weight * row[i] * row[j];
                }
            }
        }

        let betas = xtx.lu().solve(&xty)?;
        if betas.iter().any(|b| !b.is_finite()) {
            return None;
        }

        let params = [betas[0], betas[1], betas[2], tau];
        let sse: f64 = points
            .iter()
            .map(|pt| {
                let r = pt.rate - NelsonSiegel::evaluate_raw(&params, pt.horizon);
                pt.weight * r * r
            })
            .sum();
        Some((betas, sse))
    }

    fn fit_spline(
        &self,
        table: &ForwardCurveTable,
        points: &[FitPoint],
    ) -> ForecastResult<FittedState> {
        let horizons = table.horizons();

        // Recency-weighted mean rate per tenor column.
        let mut knot_rates = Vec::with_capacity(horizons.len());
        for &horizon in &horizons {
            let mut weighted_sum = 0.0;
            let mut total_weight = 0.0;
            for pt in points.iter().filter(|p| p.horizon == horizon) {
                weighted_sum += pt.weight * pt.rate;
                total_weight += pt.weight;
            }
            knot_rates.push(weighted_sum / total_weight);
        }

        let spline =
            NaturalCubicSpline::new(horizons.clone(), knot_rates.clone()).map_err(|e| match e {
                MathError::InsufficientData { required, actual } => ForecastError::fit_failure(
                    0,
                    f64::NAN,
                    format!("spline fit needs at least {required} tenor columns, got {actual}"),
                ),
                other => ForecastError::fit_failure(0, f64::NAN, other.to_string()),
            })?;

        let total_weight: f64 = points.iter().map(|p| p.weight).sum();
        let sse: f64 = points
            .iter()
            .map(|pt| {
                let r = pt.rate - spline.rate_at(pt.horizon);
                pt.weight * r * r
            })
            .sum();
        let residual_variance = sse / total_weight;

        Ok(FittedState {
            shape: FittedShape::Spline(spline),
            parameters: CurveParameters::CubicSpline {
                horizons,
                rates: knot_rates,
            },
            diagnostics: FitDiagnostics {
                iterations: 0,
                residual_rms: residual_variance.sqrt(),
                residual_variance,
            },
        })
    }
}
