//! Hierarchical base-tenor forecasting model.
//!
//! One ridge regression per base tenor, fitted in parallel from the
//! (tenor, date)-joined feature and target tables. Reconciliation is
//! structural: whatever policy forms the base vector, aggregates are
//! always recomputed as `H · b` through the shared hierarchy matrix,
//! so published aggregates can never drift from their base forecasts.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_core::traits::ForecastModel;
use marinesense_core::types::{FeatureTable, HierarchicalForecast, TargetTable, Tenor};

use crate::hierarchy::HierarchyMatrix;

/// How the base-tenor vector is formed before the hierarchy roll-up.
///
/// Aggregates are recomputed from the base vector in every case; the
/// policy only decides where the predictive signal enters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReconciliationPolicy {
    /// Each base tenor is predicted by its own regression; aggregates
    /// follow by roll-up. The default.
    #[default]
    BottomUp,
    /// The least granular level is predicted directly and disaggregated
    /// to base tenors by historical shares.
    TopDown,
    /// A named intermediate level is predicted directly and
    /// disaggregated by historical shares.
    MiddleOut {
        /// Hierarchy level the pivot regression targets.
        level: String,
    },
}

/// Tuning knobs for the hierarchical model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base-vector formation policy.
    pub policy: ReconciliationPolicy,
    /// L2 penalty on regression weights (the intercept is unpenalized).
    pub ridge_lambda: f64,
    /// Minimum joined (feature, target) observations per tenor.
    pub min_observations: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            policy: ReconciliationPolicy::BottomUp,
            ridge_lambda: 1e-4,
            min_observations: 2,
        }
    }
}

/// One fitted per-tenor (or pivot) regression.
#[derive(Debug, Clone)]
struct Regression {
    /// Intercept at index 0, then one weight per feature column.
    weights: DVector<f64>,
    residual_variance: f64,
    n_obs: usize,
}

impl Regression {
    fn predict(&self, features: &[f64]) -> f64 {
        self.weights[0]
            + features
                .iter()
                .enumerate()
                .map(|(j, x)| self.weights[j + 1] * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone)]
struct PivotState {
    level: String,
    regression: Regression,
    /// Historical share of the pivot aggregate per base tenor, in
    /// hierarchy tenor order; normalized to sum to 1.
    shares: Vec<f64>,
    /// The pivot level's weight row from the hierarchy matrix.
    weights: Vec<f64>,
}

#[derive(Debug, Clone)]
struct FittedState {
    feature_names: Vec<String>,
    /// Per-tenor regressions in hierarchy tenor order.
    regressions: Vec<Regression>,
    /// Present only under top-down or middle-out policies.
    pivot: Option<PivotState>,
}

/// Hierarchy-coherent FFA forecasting model.
///
/// Refits are wholesale: a successful `fit` replaces every regression
/// at once, and a failed `fit` leaves the previous state untouched.
#[derive(Debug, Clone)]
pub struct HierarchicalFFAModel {
    hierarchy: Arc<HierarchyMatrix>,
    config: ModelConfig,
    state: Option<FittedState>,
}

/// Weighted ridge solve: minimizes `|y - Xw|² + λ|w₁..|²` with an
/// unpenalized intercept column.
fn fit_regression(
    rows: &[(Vec<f64>, f64)],
    n_features: usize,
    lambda: f64,
) -> ForecastResult<Regression> {
    let n = rows.len();
    let p = n_features + 1;

    let mut design = DMatrix::zeros(n, p);
    let mut targets = DVector::zeros(n);
    for (i, (features, y)) in rows.iter().enumerate() {
        design[(i, 0)] = 1.0;
        for (j, x) in features.iter().enumerate() {
            design[(i, j + 1)] = *x;
        }
        targets[i] = *y;
    }

    let mut normal = design.transpose() * &design;
    for j in 1..p {
        normal[(j, j)] += lambda;
    }
    let rhs = design.transpose() * &targets;

    let weights = normal.lu().solve(&rhs).ok_or_else(|| {
        ForecastError::fit_failure(0, f64::NAN, "singular normal equations in ridge solve")
    })?;

    let residuals = &targets - &design * &weights;
    let sse = residuals.dot(&residuals);
    let dof = n.saturating_sub(p).max(1);
    let residual_variance = (sse / dof as f64).max(0.0);

    Ok(Regression {
        weights,
        residual_variance,
        n_obs: n,
    })
}

impl HierarchicalFFAModel {
    /// Creates an unfitted model over a shared hierarchy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the ridge penalty is negative
    /// or non-finite, when `min_observations` is zero, or when a
    /// middle-out policy names a level the hierarchy does not define.
    pub fn new(hierarchy: Arc<HierarchyMatrix>, config: ModelConfig) -> ForecastResult<Self> {
        if !config.ridge_lambda.is_finite() || config.ridge_lambda < 0.0 {
            return Err(ForecastError::configuration(format!(
                "ridge penalty must be finite and non-negative, got {}",
                config.ridge_lambda
            )));
        }
        if config.min_observations == 0 {
            return Err(ForecastError::configuration(
                "min_observations must be at least 1",
            ));
        }
        if let ReconciliationPolicy::MiddleOut { level } = &config.policy {
            if !hierarchy.levels().contains(level) {
                return Err(ForecastError::configuration(format!(
                    "middle-out level '{level}' is not defined in the hierarchy"
                )));
            }
        }
        Ok(Self {
            hierarchy,
            config,
            state: None,
        })
    }

    /// Returns the shared hierarchy matrix.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<HierarchyMatrix> {
        &self.hierarchy
    }

    /// Per-tenor residual variances of the fitted regressions, in
    /// hierarchy tenor order. These seed the uncertainty layer's
    /// base-model variance source.
    ///
    /// # Errors
    ///
    /// Returns `NotFitted` before a successful `fit`.
    pub fn residual_variances(&self) -> ForecastResult<Vec<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::not_fitted("hierarchical model"))?;
        Ok(state
            .regressions
            .iter()
            .map(|r| r.residual_variance)
            .collect())
    }

    /// Joins feature rows to target values on (tenor, date).
    fn joined_rows(
        features: &FeatureTable,
        targets: &TargetTable,
        tenor: &Tenor,
    ) -> Vec<(Vec<f64>, f64)> {
        features
            .rows_for_tenor(tenor)
            .filter_map(|row| {
                targets
                    .value_for(tenor, row.date)
                    .map(|y| (row.values().to_vec(), y))
            })
            .collect()
    }

    fn fit_per_tenor(
        &self,
        features: &FeatureTable,
        targets: &TargetTable,
    ) -> ForecastResult<Vec<Regression>> {
        self.hierarchy
            .tenors()
            .par_iter()
            .map(|tenor| {
                let rows = Self::joined_rows(features, targets, tenor);
                if rows.is_empty() {
                    return Err(ForecastError::shape_mismatch(
                        format!("feature and target rows for tenor '{tenor}'"),
                        "no joined rows".to_string(),
                    ));
                }
                if rows.len() < self.config.min_observations {
                    return Err(ForecastError::fit_failure(
                        0,
                        f64::NAN,
                        format!(
                            "tenor '{tenor}' has {} joined observations, need {}",
                            rows.len(),
                            self.config.min_observations
                        ),
                    ));
                }
                let regression =
                    fit_regression(&rows, features.n_features(), self.config.ridge_lambda)?;
                debug!(
                    "fitted tenor {tenor}: {} obs, residual variance {:.6}",
                    regression.n_obs, regression.residual_variance
                );
                Ok(regression)
            })
            .collect()
    }

    /// Fits the pivot regression on the level's aggregate target series
    /// and derives historical disaggregation shares.
    fn fit_pivot(
        &self,
        features: &FeatureTable,
        targets: &TargetTable,
        level: &str,
    ) -> ForecastResult<PivotState> {
        let weights = self.hierarchy.level_weights(level).ok_or_else(|| {
            ForecastError::configuration(format!("pivot level '{level}' is not in the hierarchy"))
        })?;
        if weights.iter().all(|w| *w == 0.0) {
            return Err(ForecastError::configuration(format!(
                "pivot level '{level}' has zero weight for every tenor"
            )));
        }

        let tenors = self.hierarchy.tenors();
        let members: Vec<usize> = (0..tenors.len()).filter(|t| weights[*t] != 0.0).collect();

        // Dates where every member tenor has both a feature row and a
        // target value.
        let mut dates: Vec<chrono::NaiveDate> = features
            .rows_for_tenor(&tenors[members[0]])
            .map(|row| row.date)
            .collect();
        dates.sort_unstable();
        dates.dedup();

        let mut pivot_rows: Vec<(Vec<f64>, f64)> = Vec::new();
        let mut share_sums = vec![0.0_f64; tenors.len()];
        let mut share_dates = 0_usize;
        for date in dates {
            let mut aggregate = 0.0;
            let mut mean_features = vec![0.0_f64; features.n_features()];
            let mut complete = true;
            let mut contributions = vec![0.0_f64; tenors.len()];

            for &t in &members {
                let tenor = &tenors[t];
                let row = features.rows_for_tenor(tenor).find(|r| r.date == date);
                let value = targets.value_for(tenor, date);
                match (row, value) {
                    (Some(row), Some(value)) => {
                        aggregate += weights[t] * value;
                        contributions[t] = weights[t] * value;
                        for (j, x) in row.values().iter().enumerate() {
                            mean_features[j] += x;
                        }
                    }
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if !complete {
                continue;
            }

            for x in &mut mean_features {
                *x /= members.len() as f64;
            }
            pivot_rows.push((mean_features, aggregate));

            if aggregate.abs() > f64::EPSILON {
                for &t in &members {
                    share_sums[t] += contributions[t] / aggregate;
                }
                share_dates += 1;
            }
        }

        if pivot_rows.len() < self.config.min_observations {
            return Err(ForecastError::fit_failure(
                0,
                f64::NAN,
                format!(
                    "pivot level '{level}' has {} complete dates, need {}",
                    pivot_rows.len(),
                    self.config.min_observations
                ),
            ));
        }
        if share_dates == 0 {
            return Err(ForecastError::fit_failure(
                0,
                f64::NAN,
                format!("pivot level '{level}' aggregate is identically zero"),
            ));
        }

        let mut shares: Vec<f64> = share_sums
            .iter()
            .map(|s| s / share_dates as f64)
            .collect();
        let total: f64 = shares.iter().sum();
        if total.abs() > f64::EPSILON {
            for s in &mut shares {
                *s /= total;
            }
        }

        let regression = fit_regression(&pivot_rows, features.n_features(), self.config.ridge_lambda)?;
        Ok(PivotState {
            level: level.to_string(),
            regression,
            shares,
            weights,
        })
    }

    /// Forms the base-tenor vector at predict time under the configured
    /// reconciliation policy.
    fn base_vector(
        &self,
        state: &FittedState,
        latest: &[&[f64]],
    ) -> ForecastResult<DVector<f64>> {
        let n = self.hierarchy.n_tenors();
        let own: Vec<f64> = (0..n)
            .map(|t| state.regressions[t].predict(latest[t]))
            .collect();

        let Some(pivot) = &state.pivot else {
            return Ok(DVector::from_vec(own));
        };

        // Pivot prediction from the cross-member mean of the latest
        // feature rows; disaggregation by historical shares. Tenors the
        // pivot level does not cover keep their own regression.
        let members: Vec<usize> = (0..n).filter(|t| pivot.weights[*t] != 0.0).collect();
        let n_features = latest[0].len();
        let mut mean_features = vec![0.0_f64; n_features];
        for &t in &members {
            for (j, x) in latest[t].iter().enumerate() {
                mean_features[j] += x;
            }
        }
        for x in &mut mean_features {
            *x /= members.len() as f64;
        }
        let pivot_pred = pivot.regression.predict(&mean_features);

        let mut base = own;
        for &t in &members {
            base[t] = pivot.shares[t] * pivot_pred / pivot.weights[t];
        }
        Ok(DVector::from_vec(base))
    }
}

impl ForecastModel for HierarchicalFFAModel {
    fn fit(&mut self, features: &FeatureTable, targets: &TargetTable) -> ForecastResult<()> {
        let regressions = self.fit_per_tenor(features, targets)?;

        let pivot = match &self.config.policy {
            ReconciliationPolicy::BottomUp => None,
            ReconciliationPolicy::TopDown => {
                let root = self
                    .hierarchy
                    .levels()
                    .last()
                    .cloned()
                    .ok_or_else(|| ForecastError::configuration("hierarchy has no levels"))?;
                Some(self.fit_pivot(features, targets, &root)?)
            }
            ReconciliationPolicy::MiddleOut { level } => {
                Some(self.fit_pivot(features, targets, level)?)
            }
        };

        if let Some(p) = &pivot {
            debug!(
                "pivot regression on level '{}': {} complete dates",
                p.level, p.regression.n_obs
            );
        }

        // Wholesale replacement only after every component fitted.
        self.state = Some(FittedState {
            feature_names: features.feature_names().to_vec(),
            regressions,
            pivot,
        });
        info!(
            "fitted hierarchical model: {} tenors, {} levels, policy {:?}",
            self.hierarchy.n_tenors(),
            self.hierarchy.n_levels(),
            self.config.policy
        );
        Ok(())
    }

    fn predict(&self, features: &FeatureTable) -> ForecastResult<HierarchicalForecast> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::not_fitted("hierarchical model"))?;

        if features.feature_names() != state.feature_names.as_slice() {
            return Err(ForecastError::shape_mismatch(
                format!("feature columns {:?}", state.feature_names),
                format!("feature columns {:?}", features.feature_names()),
            ));
        }

        let mut latest: Vec<&[f64]> = Vec::with_capacity(self.hierarchy.n_tenors());
        for tenor in self.hierarchy.tenors() {
            let row = features.latest_for_tenor(tenor).ok_or_else(|| {
                ForecastError::shape_mismatch(
                    format!("a feature row for tenor '{tenor}'"),
                    "no rows".to_string(),
                )
            })?;
            latest.push(row.values());
        }

        let base = self.base_vector(state, &latest)?;
        let aggregates = self.hierarchy.aggregate(&base)?;

        let base_map: BTreeMap<String, f64> = self
            .hierarchy
            .tenors()
            .iter()
            .zip(base.iter())
            .map(|(tenor, value)| (tenor.code().to_string(), *value))
            .collect();
        let aggregate_map: BTreeMap<String, f64> = self
            .hierarchy
            .levels()
            .iter()
            .zip(aggregates.iter())
            .map(|(level, value)| (level.clone(), *value))
            .collect();

        Ok(HierarchicalForecast {
            base: base_map,
            aggregates: aggregate_map,
        })
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn tenors(&self) -> &[Tenor] {
        self.hierarchy.tenors()
    }
}
