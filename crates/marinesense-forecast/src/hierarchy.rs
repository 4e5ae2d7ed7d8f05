//! The hierarchy matrix: the structural roll-up from base tenors to
//! aggregate levels.
//!
//! Reconciliation and variance propagation are both single matrix
//! operations against this one artifact. It is immutable after
//! construction and shared by `Arc` between the forecasting model and
//! the uncertainty quantifier, so point-forecast aggregation and
//! uncertainty aggregation can never use diverging structures. It is
//! rebuilt only when route, tenor, or level definitions change.

use nalgebra::{DMatrix, DVector};

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_core::types::Tenor;
use marinesense_math::stats::propagate_variance;

/// One tenor's membership in the hierarchy: the levels it rolls into
/// and its contribution weight at each.
#[derive(Debug, Clone, PartialEq)]
pub struct TenorMembership {
    /// Tenor code, e.g. `"1M"`.
    pub tenor: String,
    /// (level name, weight) pairs along the tenor's roll-up path.
    /// Levels absent from the path get an explicit zero weight.
    pub path: Vec<(String, f64)>,
}

/// Dense (levels x tenors) weight matrix mapping base tenor forecasts
/// to aggregate levels.
///
/// Entry (l, t) is the contribution weight of base tenor t to level l;
/// a tenor not under a level contributes exactly 0, never omitted, so
/// reconciliation stays a single matrix multiply.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyMatrix {
    levels: Vec<String>,
    tenors: Vec<Tenor>,
    weights: DMatrix<f64>,
}

impl HierarchyMatrix {
    fn validate(levels: &[String], tenors: &[Tenor]) -> ForecastResult<()> {
        if levels.is_empty() {
            return Err(ForecastError::configuration(
                "hierarchy requires at least one level",
            ));
        }
        if tenors.is_empty() {
            return Err(ForecastError::configuration(
                "hierarchy requires at least one base tenor",
            ));
        }
        for (i, level) in levels.iter().enumerate() {
            if levels[..i].contains(level) {
                return Err(ForecastError::configuration(format!(
                    "duplicate hierarchy level '{level}'"
                )));
            }
        }
        for (i, tenor) in tenors.iter().enumerate() {
            if tenors[..i].contains(tenor) {
                return Err(ForecastError::configuration(format!(
                    "duplicate tenor '{tenor}'"
                )));
            }
            if i > 0 && tenors[i - 1].horizon() > tenor.horizon() {
                return Err(ForecastError::configuration(format!(
                    "tenors must be ordered by horizon: '{}' before '{tenor}'",
                    tenors[i - 1]
                )));
            }
        }
        Ok(())
    }

    /// Builds the default roll-up: every base tenor contributes with
    /// weight 1 to every level.
    ///
    /// Levels are ordered most to least granular; tenors by horizon.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for empty or duplicated levels or
    /// tenors, or tenors out of horizon order.
    pub fn roll_up(levels: Vec<String>, tenors: Vec<Tenor>) -> ForecastResult<Self> {
        Self::validate(&levels, &tenors)?;
        let weights = DMatrix::from_element(levels.len(), tenors.len(), 1.0);
        Ok(Self {
            levels,
            tenors,
            weights,
        })
    }

    /// Builds a weighted hierarchy from explicit tenor membership
    /// paths, supporting partial aggregation and route-share blending.
    ///
    /// Tenors without a membership entry contribute 0 everywhere.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a membership references an
    /// undefined level or tenor, on top of the [`Self::roll_up`]
    /// validations.
    pub fn with_membership(
        levels: Vec<String>,
        tenors: Vec<Tenor>,
        memberships: &[TenorMembership],
    ) -> ForecastResult<Self> {
        Self::validate(&levels, &tenors)?;

        let mut weights = DMatrix::zeros(levels.len(), tenors.len());
        for membership in memberships {
            let t = tenors
                .iter()
                .position(|tenor| tenor.code() == membership.tenor)
                .ok_or_else(|| {
                    ForecastError::configuration(format!(
                        "membership references undefined tenor '{}'",
                        membership.tenor
                    ))
                })?;
            for (level, weight) in &membership.path {
                let l = levels.iter().position(|name| name == level).ok_or_else(|| {
                    ForecastError::configuration(format!(
                        "membership for tenor '{}' references undefined level '{level}'",
                        membership.tenor
                    ))
                })?;
                weights[(l, t)] = *weight;
            }
        }

        Ok(Self {
            levels,
            tenors,
            weights,
        })
    }

    /// Returns the aggregation levels, most to least granular.
    #[must_use]
    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Returns the base tenors in horizon order.
    #[must_use]
    pub fn tenors(&self) -> &[Tenor] {
        &self.tenors
    }

    /// Number of aggregate levels (matrix rows).
    #[must_use]
    pub fn n_levels(&self) -> usize {
        self.levels.len()
    }

    /// Number of base tenors (matrix columns).
    #[must_use]
    pub fn n_tenors(&self) -> usize {
        self.tenors.len()
    }

    /// Returns the underlying weight matrix.
    #[must_use]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// Returns the weight row for a level, if the level exists.
    #[must_use]
    pub fn level_weights(&self, level: &str) -> Option<Vec<f64>> {
        let l = self.levels.iter().position(|name| name == level)?;
        Some(self.weights.row(l).iter().copied().collect())
    }

    /// Computes aggregate values `H · b` for a base-tenor vector.
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch when `base` is not one value per tenor.
    pub fn aggregate(&self, base: &DVector<f64>) -> ForecastResult<DVector<f64>> {
        if base.len() != self.n_tenors() {
            return Err(ForecastError::shape_mismatch(
                format!("{} base values", self.n_tenors()),
                format!("{} base values", base.len()),
            ));
        }
        Ok(&self.weights * base)
    }

    /// Propagates a base covariance to per-level variances:
    /// `diag(H · Σ · Hᵗ)`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when Σ's dimensions disagree with
    /// the tenor count.
    pub fn propagate_covariance(&self, cov: &DMatrix<f64>) -> ForecastResult<DVector<f64>> {
        propagate_variance(&self.weights, cov)
            .map_err(|e| ForecastError::configuration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn tenors(codes: &[&str]) -> Vec<Tenor> {
        codes.iter().map(|c| Tenor::parse(c).unwrap()).collect()
    }

    fn levels(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_roll_up_aggregates_by_sum() {
        let h = HierarchyMatrix::roll_up(
            levels(&["route", "regional", "global"]),
            tenors(&["1M", "2M", "3M"]),
        )
        .unwrap();

        let base = DVector::from_vec(vec![100.0, 110.0, 120.0]);
        let aggregates = h.aggregate(&base).unwrap();

        assert_eq!(aggregates.len(), 3);
        for level in 0..3 {
            assert_relative_eq!(aggregates[level], 330.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rejects_empty_definitions() {
        assert!(HierarchyMatrix::roll_up(levels(&[]), tenors(&["1M"])).is_err());
        assert!(HierarchyMatrix::roll_up(levels(&["route"]), vec![]).is_err());
        assert!(HierarchyMatrix::roll_up(levels(&["a", "a"]), tenors(&["1M"])).is_err());
        assert!(HierarchyMatrix::roll_up(levels(&["a"]), tenors(&["3M", "1M"])).is_err());
    }

    #[test]
    fn test_membership_weights_and_dense_zeros() {
        let memberships = vec![
            TenorMembership {
                tenor: "1M".to_string(),
                path: vec![("route".to_string(), 1.0), ("regional".to_string(), 0.6)],
            },
            TenorMembership {
                tenor: "2M".to_string(),
                path: vec![("route".to_string(), 1.0)],
            },
        ];
        let h = HierarchyMatrix::with_membership(
            levels(&["route", "regional"]),
            tenors(&["1M", "2M"]),
            &memberships,
        )
        .unwrap();

        // 2M is not under "regional": explicit zero, not omitted.
        assert_relative_eq!(h.matrix()[(1, 1)], 0.0);
        assert_relative_eq!(h.matrix()[(1, 0)], 0.6);

        let base = DVector::from_vec(vec![100.0, 200.0]);
        let aggregates = h.aggregate(&base).unwrap();
        assert_relative_eq!(aggregates[0], 300.0, epsilon = 1e-12);
        assert_relative_eq!(aggregates[1], 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_membership_rejects_undefined_names() {
        let bad_level = vec![TenorMembership {
            tenor: "1M".to_string(),
            path: vec![("basin".to_string(), 1.0)],
        }];
        assert!(HierarchyMatrix::with_membership(
            levels(&["route"]),
            tenors(&["1M"]),
            &bad_level
        )
        .is_err());

        let bad_tenor = vec![TenorMembership {
            tenor: "9M".to_string(),
            path: vec![("route".to_string(), 1.0)],
        }];
        assert!(HierarchyMatrix::with_membership(
            levels(&["route"]),
            tenors(&["1M"]),
            &bad_tenor
        )
        .is_err());
    }

    #[test]
    fn test_aggregate_shape_check() {
        let h = HierarchyMatrix::roll_up(levels(&["route"]), tenors(&["1M", "2M"])).unwrap();
        let short = DVector::from_vec(vec![1.0]);
        assert!(matches!(
            h.aggregate(&short),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_propagate_covariance_dimension_check() {
        let h = HierarchyMatrix::roll_up(levels(&["route"]), tenors(&["1M", "2M"])).unwrap();
        let bad = DMatrix::<f64>::zeros(3, 3);
        assert!(matches!(
            h.propagate_covariance(&bad),
            Err(ForecastError::Configuration { .. })
        ));
    }

    proptest! {
        /// Coherence law: aggregates equal H·b for any base vector.
        #[test]
        fn prop_aggregate_is_weighted_sum(
            b1 in -1e6_f64..1e6,
            b2 in -1e6_f64..1e6,
            b3 in -1e6_f64..1e6,
            w in 0.0_f64..2.0,
        ) {
            let memberships = vec![
                TenorMembership {
                    tenor: "1M".to_string(),
                    path: vec![("route".to_string(), 1.0), ("global".to_string(), w)],
                },
                TenorMembership {
                    tenor: "2M".to_string(),
                    path: vec![("route".to_string(), 1.0)],
                },
                TenorMembership {
                    tenor: "3M".to_string(),
                    path: vec![("route".to_string(), 1.0), ("global".to_string(), 1.0)],
                },
            ];
            let h = HierarchyMatrix::with_membership(
                levels(&["route", "global"]),
                tenors(&["1M", "2M", "3M"]),
                &memberships,
            ).unwrap();

            let base = DVector::from_vec(vec![b1, b2, b3]);
            let aggregates = h.aggregate(&base).unwrap();

            prop_assert!((aggregates[0] - (b1 + b2 + b3)).abs() <= 1e-9 * (1.0 + b1.abs() + b2.abs() + b3.abs()));
            prop_assert!((aggregates[1] - (w * b1 + b3)).abs() <= 1e-9 * (1.0 + b1.abs() + b3.abs()));
        }
    }
}
