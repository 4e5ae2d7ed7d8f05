//! Forecast output records.
//!
//! A [`ForecastRecord`] is produced once per orchestrator invocation and
//! is immutable after creation: every hierarchy node carries a point
//! forecast and an uncertainty estimate derived from the same hierarchy
//! matrix, so the two can never disagree in shape.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point forecasts for every hierarchy node.
///
/// Coherence invariant: for any aggregate level, the stored value equals
/// the hierarchy-matrix-weighted sum of the base values exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalForecast {
    /// Point forecast per base tenor code.
    pub base: BTreeMap<String, f64>,
    /// Point forecast per aggregate level name.
    pub aggregates: BTreeMap<String, f64>,
}

impl HierarchicalForecast {
    /// Looks up the forecast for a node, base tenor or aggregate level.
    #[must_use]
    pub fn value_for(&self, node: &str) -> Option<f64> {
        self.base
            .get(node)
            .or_else(|| self.aggregates.get(node))
            .copied()
    }
}

/// Per-source variance contributions for one node, after regime scaling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceContribution {
    /// Base-model residual variance contribution.
    pub base_model: f64,
    /// Term-structure fit variance contribution.
    pub term_structure: f64,
    /// Expert-elicited variance contribution.
    pub expert: f64,
}

impl SourceContribution {
    /// Total variance under the independent-sources additive combination.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.base_model + self.term_structure + self.expert
    }
}

/// Uncertainty estimate for one hierarchy node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeUncertainty {
    /// Regime-marginalized variance.
    pub variance: f64,
    /// Standard deviation, `variance.sqrt()`.
    pub std_dev: f64,
    /// Half-width of the symmetric interval at the report's confidence.
    pub interval_half_width: f64,
    /// Contribution breakdown by source.
    pub sources: SourceContribution,
}

/// Uncertainty estimates for every hierarchy node, plus diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UncertaintyReport {
    /// Uncertainty per base tenor code.
    pub base: BTreeMap<String, NodeUncertainty>,
    /// Uncertainty per aggregate level name.
    pub aggregates: BTreeMap<String, NodeUncertainty>,
    /// Regime probabilities used for marginalization.
    pub regime_probabilities: BTreeMap<String, f64>,
    /// Confidence level of the intervals, e.g. 0.95.
    pub confidence: f64,
}

impl UncertaintyReport {
    /// Looks up the uncertainty for a node, base tenor or aggregate level.
    #[must_use]
    pub fn node(&self, node: &str) -> Option<&NodeUncertainty> {
        self.base.get(node).or_else(|| self.aggregates.get(node))
    }
}

/// Per-feature attribution scores for the fitted base model.
///
/// Produced by an external explainer capability; the core treats the
/// mechanism as opaque and only carries the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Name of the attribution method, e.g. `"shap"`.
    pub method: String,
    /// Attribution score per feature column.
    pub attributions: BTreeMap<String, f64>,
}

/// The complete output of one orchestrated forecast call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    /// Route the forecast belongs to, e.g. `"C5"`.
    pub route: String,
    /// Assembly timestamp.
    pub generated_at: DateTime<Utc>,
    /// Point forecast per base tenor code.
    pub base: BTreeMap<String, f64>,
    /// Point forecast per aggregate level name.
    pub aggregates: BTreeMap<String, f64>,
    /// Curve-implied rate per base tenor code from the term structure fit.
    pub curve_rates: BTreeMap<String, f64>,
    /// Uncertainty per hierarchy node.
    pub uncertainty: UncertaintyReport,
    /// Optional per-feature attribution for the base model.
    pub explanation: Option<Explanation>,
}

impl ForecastRecord {
    /// Point forecast for a node, base tenor or aggregate level.
    #[must_use]
    pub fn value_for(&self, node: &str) -> Option<f64> {
        self.base
            .get(node)
            .or_else(|| self.aggregates.get(node))
            .copied()
    }

    /// Symmetric forecast interval for a node at the report confidence.
    #[must_use]
    pub fn interval_for(&self, node: &str) -> Option<(f64, f64)> {
        let value = self.value_for(node)?;
        let half_width = self.uncertainty.node(node)?.interval_half_width;
        Some((value - half_width, value + half_width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> UncertaintyReport {
        let node = NodeUncertainty {
            variance: 4.0,
            std_dev: 2.0,
            interval_half_width: 3.92,
            sources: SourceContribution {
                base_model: 3.0,
                term_structure: 1.0,
                expert: 0.0,
            },
        };
        UncertaintyReport {
            base: BTreeMap::from([("1M".to_string(), node)]),
            aggregates: BTreeMap::new(),
            regime_probabilities: BTreeMap::from([("calm".to_string(), 1.0)]),
            confidence: 0.95,
        }
    }

    #[test]
    fn test_source_contribution_total() {
        let sources = SourceContribution {
            base_model: 1.0,
            term_structure: 2.0,
            expert: 0.5,
        };
        assert!((sources.total() - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_record_interval_centered_on_point() {
        let record = ForecastRecord {
            route: "C5".to_string(),
            generated_at: Utc::now(),
            base: BTreeMap::from([("1M".to_string(), 100.0)]),
            aggregates: BTreeMap::new(),
            curve_rates: BTreeMap::new(),
            uncertainty: report(),
            explanation: None,
        };

        let (lo, hi) = record.interval_for("1M").unwrap();
        assert!((lo - 96.08).abs() < 1e-9);
        assert!((hi - 103.92).abs() < 1e-9);
        assert!(record.interval_for("6M").is_none());
    }
}
