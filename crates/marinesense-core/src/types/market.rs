//! Market-condition inputs to a forecast call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Market conditions supplied alongside features for one forecast call.
///
/// The regime influences uncertainty magnitude only, never point
/// forecasts. Each optional field has a documented default: an absent
/// regime label falls back to the explicit distribution, then to the
/// quantifier's regime history, then to a uniform mix; absent expert
/// uncertainty contributes nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    /// Observed regime label, e.g. `"calm"` or `"volatile"`.
    pub regime: Option<String>,
    /// Explicit regime probability distribution, used when the regime is
    /// unobserved. Keys are regime names; values must sum to 1.
    pub regime_distribution: Option<BTreeMap<String, f64>>,
    /// Expert-elicited variance override per tenor code, combined
    /// additively with the model-derived sources.
    pub expert_uncertainty: Option<BTreeMap<String, f64>>,
}

impl MarketConditions {
    /// Conditions with an observed regime label.
    #[must_use]
    pub fn observed(regime: impl Into<String>) -> Self {
        Self {
            regime: Some(regime.into()),
            ..Self::default()
        }
    }

    /// Conditions with no regime observation at all.
    #[must_use]
    pub fn unobserved() -> Self {
        Self::default()
    }

    /// Attaches an explicit regime distribution.
    #[must_use]
    pub fn with_regime_distribution(mut self, distribution: BTreeMap<String, f64>) -> Self {
        self.regime_distribution = Some(distribution);
        self
    }

    /// Attaches per-tenor expert variance overrides.
    #[must_use]
    pub fn with_expert_uncertainty(mut self, expert: BTreeMap<String, f64>) -> Self {
        self.expert_uncertainty = Some(expert);
        self
    }
}
