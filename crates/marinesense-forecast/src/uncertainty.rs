//! Regime-aware Bayesian uncertainty quantification.
//!
//! Variance enters from three independent sources per base tenor: the
//! base model's residual variance, the term-structure fit variance, and
//! an optional expert-elicited override. Regime uncertainty scales the
//! model-derived sources (never the expert's) and is marginalized out
//! via the total-variance decomposition, then propagated to aggregate
//! levels through the same hierarchy matrix the point forecasts use.
//! Regimes never move point forecasts, only widths.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_core::types::{
    MarketConditions, NodeUncertainty, SourceContribution, UncertaintyReport,
};
use marinesense_math::stats::{correlated_combination, mixture_variance};

use crate::hierarchy::HierarchyMatrix;

/// One market regime and its volatility scaling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeSpec {
    /// Regime name, e.g. `"calm"`.
    pub name: String,
    /// Multiplier applied to model-derived standard deviations under
    /// this regime. 1.0 leaves them unscaled.
    pub volatility_multiplier: f64,
}

impl RegimeSpec {
    /// Creates a regime spec.
    #[must_use]
    pub fn new(name: impl Into<String>, volatility_multiplier: f64) -> Self {
        Self {
            name: name.into(),
            volatility_multiplier,
        }
    }
}

/// Tuning knobs for the uncertainty quantifier.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifierConfig {
    /// The regime set. Probabilities are expressed over these, in order.
    pub regimes: Vec<RegimeSpec>,
    /// Confidence level for forecast intervals, in (0, 1).
    pub confidence: f64,
    /// How many recent regime observations the history keeps for the
    /// empirical-frequency fallback.
    pub history_window: usize,
    /// Optional 3x3 correlation over (base model, term structure,
    /// expert) sources. `None` treats the sources as independent.
    pub source_correlation: Option<DMatrix<f64>>,
}

impl Default for QuantifierConfig {
    fn default() -> Self {
        Self {
            regimes: vec![RegimeSpec::new("calm", 1.0), RegimeSpec::new("volatile", 2.5)],
            confidence: 0.95,
            history_window: 20,
            source_correlation: None,
        }
    }
}

/// Per-tenor variance inputs, each one value per hierarchy base tenor.
#[derive(Debug, Clone, Copy)]
pub struct UncertaintySources<'a> {
    /// Base-model residual variances.
    pub base_variance: &'a [f64],
    /// Term-structure fit variances, already inflated for extrapolated
    /// horizons upstream.
    pub term_structure_variance: &'a [f64],
    /// Expert-elicited variances; `None` contributes nothing.
    pub expert_variance: Option<&'a [f64]>,
}

/// Regime-marginalizing uncertainty quantifier over a shared hierarchy.
#[derive(Debug, Clone)]
pub struct BayesianUncertaintyQuantifier {
    hierarchy: Arc<HierarchyMatrix>,
    config: QuantifierConfig,
    /// z-score matching the configured confidence.
    interval_z: f64,
    /// Recent observed regimes as indexes into `config.regimes`.
    regime_history: VecDeque<usize>,
}

impl BayesianUncertaintyQuantifier {
    /// Creates a quantifier over the shared hierarchy matrix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an empty or duplicated regime
    /// set, a non-positive or non-finite multiplier, or a confidence
    /// outside (0, 1).
    pub fn new(hierarchy: Arc<HierarchyMatrix>, config: QuantifierConfig) -> ForecastResult<Self> {
        if config.regimes.is_empty() {
            return Err(ForecastError::configuration(
                "quantifier requires at least one regime",
            ));
        }
        for (i, regime) in config.regimes.iter().enumerate() {
            if config.regimes[..i].iter().any(|r| r.name == regime.name) {
                return Err(ForecastError::configuration(format!(
                    "duplicate regime '{}'",
                    regime.name
                )));
            }
            if !regime.volatility_multiplier.is_finite() || regime.volatility_multiplier <= 0.0 {
                return Err(ForecastError::configuration(format!(
                    "regime '{}' multiplier must be finite and positive, got {}",
                    regime.name, regime.volatility_multiplier
                )));
            }
        }
        if !(config.confidence > 0.0 && config.confidence < 1.0) {
            return Err(ForecastError::configuration(format!(
                "confidence must lie in (0, 1), got {}",
                config.confidence
            )));
        }

        let standard_normal = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::configuration(e.to_string()))?;
        let interval_z = standard_normal.inverse_cdf(0.5 + config.confidence / 2.0);

        Ok(Self {
            hierarchy,
            config,
            interval_z,
            regime_history: VecDeque::new(),
        })
    }

    /// Records an observed regime label into the rolling history.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label.
    pub fn record_regime(&mut self, regime: &str) -> ForecastResult<()> {
        let index = self.regime_index(regime)?;
        self.regime_history.push_back(index);
        while self.regime_history.len() > self.config.history_window {
            self.regime_history.pop_front();
        }
        Ok(())
    }

    fn regime_index(&self, name: &str) -> ForecastResult<usize> {
        self.config
            .regimes
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| {
                ForecastError::configuration(format!("unknown regime '{name}'"))
            })
    }

    /// Resolves regime probabilities for one forecast call.
    ///
    /// Resolution order: observed label (certainty), explicit
    /// distribution, empirical frequency over the recorded history, and
    /// finally a uniform mix.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown label, a
    /// distribution naming an unknown regime, negative probabilities,
    /// or probabilities not summing to 1.
    pub fn regime_probabilities(
        &self,
        conditions: &MarketConditions,
    ) -> ForecastResult<Vec<f64>> {
        let k = self.config.regimes.len();

        if let Some(label) = &conditions.regime {
            let mut probs = vec![0.0; k];
            probs[self.regime_index(label)?] = 1.0;
            return Ok(probs);
        }

        if let Some(distribution) = &conditions.regime_distribution {
            let mut probs = vec![0.0; k];
            for (name, p) in distribution {
                if *p < 0.0 {
                    return Err(ForecastError::configuration(format!(
                        "negative probability {p} for regime '{name}'"
                    )));
                }
                probs[self.regime_index(name)?] = *p;
            }
            let total: f64 = probs.iter().sum();
            if (total - 1.0).abs() > 1e-8 {
                return Err(ForecastError::configuration(format!(
                    "regime distribution sums to {total}, expected 1"
                )));
            }
            return Ok(probs);
        }

        if !self.regime_history.is_empty() {
            let mut counts = vec![0.0_f64; k];
            for &index in &self.regime_history {
                counts[index] += 1.0;
            }
            let total = self.regime_history.len() as f64;
            return Ok(counts.into_iter().map(|c| c / total).collect());
        }

        debug!("no regime signal; falling back to uniform over {k} regimes");
        Ok(vec![1.0 / k as f64; k])
    }

    /// Resolves a per-tenor-code expert variance map into a vector in
    /// hierarchy tenor order. Missing tenors contribute zero.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown tenor code or a
    /// negative variance.
    pub fn expert_variances(
        &self,
        expert: &BTreeMap<String, f64>,
    ) -> ForecastResult<Vec<f64>> {
        for (code, variance) in expert {
            if !self.hierarchy.tenors().iter().any(|t| t.code() == code) {
                return Err(ForecastError::configuration(format!(
                    "expert uncertainty references unknown tenor '{code}'"
                )));
            }
            if *variance < 0.0 {
                return Err(ForecastError::configuration(format!(
                    "negative expert variance {variance} for tenor '{code}'"
                )));
            }
        }
        Ok(self
            .hierarchy
            .tenors()
            .iter()
            .map(|t| expert.get(t.code()).copied().unwrap_or(0.0))
            .collect())
    }

    fn validate_sources(&self, sources: &UncertaintySources<'_>) -> ForecastResult<()> {
        let n = self.hierarchy.n_tenors();
        let lengths = [
            ("base", sources.base_variance.len()),
            ("term structure", sources.term_structure_variance.len()),
            (
                "expert",
                sources.expert_variance.map_or(n, <[f64]>::len),
            ),
        ];
        for (name, len) in lengths {
            if len != n {
                return Err(ForecastError::configuration(format!(
                    "{name} variance has {len} entries but the hierarchy defines {n} tenors"
                )));
            }
        }
        let negative = sources
            .base_variance
            .iter()
            .chain(sources.term_structure_variance.iter())
            .chain(sources.expert_variance.into_iter().flatten())
            .any(|v| *v < 0.0 || !v.is_finite());
        if negative {
            return Err(ForecastError::configuration(
                "variance sources must be finite and non-negative",
            ));
        }
        Ok(())
    }

    /// Variance for one tenor under one regime multiplier.
    fn regime_variance(
        &self,
        multiplier: f64,
        base: f64,
        term: f64,
        expert: f64,
    ) -> ForecastResult<f64> {
        match &self.config.source_correlation {
            None => Ok(multiplier * multiplier * (base + term) + expert),
            Some(rho) => {
                let sigmas = [
                    multiplier * base.sqrt(),
                    multiplier * term.sqrt(),
                    expert.sqrt(),
                ];
                correlated_combination(&sigmas, rho)
                    .map_err(|e| ForecastError::configuration(e.to_string()))
            }
        }
    }

    /// Quantifies forecast uncertainty for every hierarchy node.
    ///
    /// The report's per-source breakdown carries the marginal diagonal
    /// terms; under a source correlation the cross terms appear in the
    /// total variance only.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when source lengths disagree with
    /// the hierarchy, any variance is negative, or the regime signal in
    /// `conditions` is malformed.
    pub fn quantify(
        &self,
        sources: &UncertaintySources<'_>,
        conditions: &MarketConditions,
    ) -> ForecastResult<UncertaintyReport> {
        self.validate_sources(sources)?;
        let probs = self.regime_probabilities(conditions)?;

        let n = self.hierarchy.n_tenors();
        let zero_means = vec![0.0; self.config.regimes.len()];
        let mut marginal = Vec::with_capacity(n);
        let mut contributions = Vec::with_capacity(n);

        for t in 0..n {
            let base = sources.base_variance[t];
            let term = sources.term_structure_variance[t];
            let expert = sources.expert_variance.map_or(0.0, |e| e[t]);

            let regime_variances: Vec<f64> = self
                .config
                .regimes
                .iter()
                .map(|r| self.regime_variance(r.volatility_multiplier, base, term, expert))
                .collect::<ForecastResult<_>>()?;

            let variance = mixture_variance(&probs, &zero_means, &regime_variances)
                .map_err(|e| ForecastError::configuration(e.to_string()))?;

            // Marginal diagonal terms per source.
            let scale: f64 = probs
                .iter()
                .zip(&self.config.regimes)
                .map(|(p, r)| p * r.volatility_multiplier * r.volatility_multiplier)
                .sum();
            contributions.push(SourceContribution {
                base_model: scale * base,
                term_structure: scale * term,
                expert,
            });
            marginal.push(variance);
        }

        // Base variances are propagated as an independent diagonal; the
        // hierarchy's weights introduce the aggregate covariance.
        let diag = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(marginal.clone()));
        let aggregate_variance = self.hierarchy.propagate_covariance(&diag)?;
        let aggregate_sources = self.propagate_sources(&contributions)?;

        let base_map: BTreeMap<String, NodeUncertainty> = self
            .hierarchy
            .tenors()
            .iter()
            .enumerate()
            .map(|(t, tenor)| {
                (
                    tenor.code().to_string(),
                    self.node(marginal[t], contributions[t]),
                )
            })
            .collect();
        let aggregate_map: BTreeMap<String, NodeUncertainty> = self
            .hierarchy
            .levels()
            .iter()
            .enumerate()
            .map(|(l, level)| {
                (
                    level.clone(),
                    self.node(aggregate_variance[l], aggregate_sources[l]),
                )
            })
            .collect();

        let regime_probabilities = self
            .config
            .regimes
            .iter()
            .zip(&probs)
            .map(|(r, p)| (r.name.clone(), *p))
            .collect();

        Ok(UncertaintyReport {
            base: base_map,
            aggregates: aggregate_map,
            regime_probabilities,
            confidence: self.config.confidence,
        })
    }

    /// Propagates each source's diagonal separately so aggregate nodes
    /// also carry a per-source breakdown.
    fn propagate_sources(
        &self,
        contributions: &[SourceContribution],
    ) -> ForecastResult<Vec<SourceContribution>> {
        let per_source = |select: fn(&SourceContribution) -> f64| {
            let diag = DMatrix::from_diagonal(&nalgebra::DVector::from_iterator(
                contributions.len(),
                contributions.iter().map(select),
            ));
            self.hierarchy.propagate_covariance(&diag)
        };

        let base = per_source(|c| c.base_model)?;
        let term = per_source(|c| c.term_structure)?;
        let expert = per_source(|c| c.expert)?;

        Ok((0..self.hierarchy.n_levels())
            .map(|l| SourceContribution {
                base_model: base[l],
                term_structure: term[l],
                expert: expert[l],
            })
            .collect())
    }

    fn node(&self, variance: f64, sources: SourceContribution) -> NodeUncertainty {
        let std_dev = variance.sqrt();
        NodeUncertainty {
            variance,
            std_dev,
            interval_half_width: self.interval_z * std_dev,
            sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use marinesense_core::types::Tenor;

    fn hierarchy(codes: &[&str], levels: &[&str]) -> Arc<HierarchyMatrix> {
        Arc::new(
            HierarchyMatrix::roll_up(
                levels.iter().map(|l| (*l).to_string()).collect(),
                codes.iter().map(|c| Tenor::parse(c).unwrap()).collect(),
            )
            .unwrap(),
        )
    }

    fn quantifier() -> BayesianUncertaintyQuantifier {
        BayesianUncertaintyQuantifier::new(
            hierarchy(&["1M", "2M"], &["route"]),
            QuantifierConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_observed_regime_is_one_hot() {
        let q = quantifier();
        let probs = q
            .regime_probabilities(&MarketConditions::observed("volatile"))
            .unwrap();
        assert_eq!(probs, vec![0.0, 1.0]);

        assert!(q
            .regime_probabilities(&MarketConditions::observed("stormy"))
            .is_err());
    }

    #[test]
    fn test_unobserved_defaults_to_uniform_then_history() {
        let mut q = quantifier();
        let probs = q.regime_probabilities(&MarketConditions::unobserved()).unwrap();
        assert_eq!(probs, vec![0.5, 0.5]);

        q.record_regime("calm").unwrap();
        q.record_regime("calm").unwrap();
        q.record_regime("volatile").unwrap();
        q.record_regime("calm").unwrap();
        let probs = q.regime_probabilities(&MarketConditions::unobserved()).unwrap();
        assert_relative_eq!(probs[0], 0.75, epsilon = 1e-12);
        assert_relative_eq!(probs[1], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_explicit_distribution_validated() {
        let q = quantifier();

        let good = MarketConditions::unobserved().with_regime_distribution(BTreeMap::from([
            ("calm".to_string(), 0.3),
            ("volatile".to_string(), 0.7),
        ]));
        assert_eq!(q.regime_probabilities(&good).unwrap(), vec![0.3, 0.7]);

        let bad_sum = MarketConditions::unobserved()
            .with_regime_distribution(BTreeMap::from([("calm".to_string(), 0.3)]));
        assert!(q.regime_probabilities(&bad_sum).is_err());

        let bad_name = MarketConditions::unobserved().with_regime_distribution(BTreeMap::from([
            ("stormy".to_string(), 1.0),
        ]));
        assert!(q.regime_probabilities(&bad_name).is_err());
    }

    #[test]
    fn test_aggregate_variance_is_propagated_sum() {
        let q = quantifier();
        let sources = UncertaintySources {
            base_variance: &[2.0, 2.0],
            term_structure_variance: &[0.0, 0.0],
            expert_variance: None,
        };
        let report = q
            .quantify(&sources, &MarketConditions::observed("calm"))
            .unwrap();

        // Independent base variances of 2 each sum to 4 at the level.
        let route = report.node("route").unwrap();
        assert_relative_eq!(route.variance, 4.0, epsilon = 1e-12);
        assert_relative_eq!(route.std_dev, 2.0, epsilon = 1e-12);
        assert_relative_eq!(route.interval_half_width, 2.0 * 1.959_963_985, epsilon = 1e-6);
        assert_relative_eq!(report.node("1M").unwrap().variance, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_volatile_regime_widens_model_sources_only() {
        let q = quantifier();
        let sources = UncertaintySources {
            base_variance: &[1.0, 1.0],
            term_structure_variance: &[1.0, 1.0],
            expert_variance: Some(&[5.0, 5.0]),
        };

        let calm = q
            .quantify(&sources, &MarketConditions::observed("calm"))
            .unwrap();
        let volatile = q
            .quantify(&sources, &MarketConditions::observed("volatile"))
            .unwrap();

        // calm: 1*(1+1) + 5 = 7; volatile: 2.5^2*(1+1) + 5 = 17.5.
        assert_relative_eq!(calm.node("1M").unwrap().variance, 7.0, epsilon = 1e-12);
        assert_relative_eq!(volatile.node("1M").unwrap().variance, 17.5, epsilon = 1e-12);

        // The expert source is identical in both reports.
        assert_relative_eq!(calm.node("1M").unwrap().sources.expert, 5.0, epsilon = 1e-12);
        assert_relative_eq!(
            volatile.node("1M").unwrap().sources.expert,
            5.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_mixture_lies_between_pure_regimes() {
        let q = quantifier();
        let sources = UncertaintySources {
            base_variance: &[1.0, 1.0],
            term_structure_variance: &[0.0, 0.0],
            expert_variance: None,
        };

        let mixed = MarketConditions::unobserved().with_regime_distribution(BTreeMap::from([
            ("calm".to_string(), 0.5),
            ("volatile".to_string(), 0.5),
        ]));
        let report = q.quantify(&sources, &mixed).unwrap();

        // 0.5*1 + 0.5*6.25 = 3.625, strictly between the pure regimes.
        let v = report.node("1M").unwrap().variance;
        assert_relative_eq!(v, 3.625, epsilon = 1e-12);
        assert!(v > 1.0 && v < 6.25);
    }

    #[test]
    fn test_correlated_sources_exceed_independent_sum() {
        let config = QuantifierConfig {
            regimes: vec![RegimeSpec::new("calm", 1.0)],
            source_correlation: Some(DMatrix::from_row_slice(
                3,
                3,
                &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            )),
            ..QuantifierConfig::default()
        };
        let q = BayesianUncertaintyQuantifier::new(hierarchy(&["1M"], &["route"]), config).unwrap();

        let sources = UncertaintySources {
            base_variance: &[4.0],
            term_structure_variance: &[9.0],
            expert_variance: Some(&[1.0]),
        };
        let report = q
            .quantify(&sources, &MarketConditions::observed("calm"))
            .unwrap();

        // Perfect correlation: (2 + 3 + 1)^2 = 36 > 4 + 9 + 1.
        assert_relative_eq!(report.node("1M").unwrap().variance, 36.0, epsilon = 1e-9);
    }

    #[test]
    fn test_expert_map_resolution() {
        let q = quantifier();
        let resolved = q
            .expert_variances(&BTreeMap::from([("2M".to_string(), 3.0)]))
            .unwrap();
        assert_eq!(resolved, vec![0.0, 3.0]);

        assert!(q
            .expert_variances(&BTreeMap::from([("9Y".to_string(), 1.0)]))
            .is_err());
        assert!(q
            .expert_variances(&BTreeMap::from([("1M".to_string(), -1.0)]))
            .is_err());
    }

    #[test]
    fn test_source_length_and_sign_validation() {
        let q = quantifier();
        let short = UncertaintySources {
            base_variance: &[1.0],
            term_structure_variance: &[1.0, 1.0],
            expert_variance: None,
        };
        assert!(matches!(
            q.quantify(&short, &MarketConditions::unobserved()),
            Err(ForecastError::Configuration { .. })
        ));

        let negative = UncertaintySources {
            base_variance: &[1.0, -1.0],
            term_structure_variance: &[1.0, 1.0],
            expert_variance: None,
        };
        assert!(q.quantify(&negative, &MarketConditions::unobserved()).is_err());
    }

    #[test]
    fn test_config_validation() {
        let h = hierarchy(&["1M"], &["route"]);
        let empty = QuantifierConfig {
            regimes: vec![],
            ..QuantifierConfig::default()
        };
        assert!(BayesianUncertaintyQuantifier::new(h.clone(), empty).is_err());

        let bad_mult = QuantifierConfig {
            regimes: vec![RegimeSpec::new("calm", 0.0)],
            ..QuantifierConfig::default()
        };
        assert!(BayesianUncertaintyQuantifier::new(h.clone(), bad_mult).is_err());

        let bad_confidence = QuantifierConfig {
            confidence: 1.0,
            ..QuantifierConfig::default()
        };
        assert!(BayesianUncertaintyQuantifier::new(h, bad_confidence).is_err());
    }
}
