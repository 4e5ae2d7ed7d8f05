//! End-to-end forecast orchestration.
//!
//! One orchestrator instance serves one route. A `forecast` call
//! sequences the full pipeline: fit the base model, reconcile point
//! forecasts through the hierarchy, fit the term structure to the
//! forward curves, resolve the regime signal, quantify uncertainty, and
//! assemble everything into a single [`ForecastRecord`]. Any failure
//! surfaces as an error; no partially assembled record is ever
//! returned.

use std::sync::Arc;

use chrono::Utc;
use log::info;

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_core::traits::{Explainer, ForecastModel};
use marinesense_core::types::{
    FeatureTable, ForecastRecord, MarketConditions, TargetTable, Tenor,
};
use marinesense_curves::{ForwardCurveTable, TermStructureConfig, TermStructureModel};

use crate::hierarchy::HierarchyMatrix;
use crate::model::{HierarchicalFFAModel, ModelConfig};
use crate::uncertainty::{BayesianUncertaintyQuantifier, QuantifierConfig, UncertaintySources};

/// Configuration for every pipeline component, with workable defaults.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    /// Hierarchical model settings.
    pub model: ModelConfig,
    /// Term-structure fit settings.
    pub term_structure: TermStructureConfig,
    /// Uncertainty quantifier settings.
    pub quantifier: QuantifierConfig,
}

/// Per-route forecast pipeline.
///
/// The hierarchy matrix is built once and shared between the model and
/// the quantifier, so point reconciliation and uncertainty propagation
/// always agree on structure. Distinct routes own distinct
/// orchestrators and may run concurrently.
pub struct FFAOrchestrator {
    route: String,
    hierarchy: Arc<HierarchyMatrix>,
    model: HierarchicalFFAModel,
    term_structure: TermStructureModel,
    quantifier: BayesianUncertaintyQuantifier,
    explainer: Option<Box<dyn Explainer>>,
}

impl FFAOrchestrator {
    /// Creates an orchestrator with the default sum roll-up hierarchy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid hierarchy, model, or
    /// quantifier settings.
    pub fn new(
        route: impl Into<String>,
        levels: Vec<String>,
        tenors: Vec<Tenor>,
        config: OrchestratorConfig,
    ) -> ForecastResult<Self> {
        let hierarchy = Arc::new(HierarchyMatrix::roll_up(levels, tenors)?);
        Self::with_hierarchy(route, hierarchy, config)
    }

    /// Creates an orchestrator over a pre-built (possibly weighted)
    /// hierarchy.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid model or quantifier
    /// settings.
    pub fn with_hierarchy(
        route: impl Into<String>,
        hierarchy: Arc<HierarchyMatrix>,
        config: OrchestratorConfig,
    ) -> ForecastResult<Self> {
        let model = HierarchicalFFAModel::new(Arc::clone(&hierarchy), config.model)?;
        let quantifier =
            BayesianUncertaintyQuantifier::new(Arc::clone(&hierarchy), config.quantifier)?;
        Ok(Self {
            route: route.into(),
            hierarchy,
            model,
            term_structure: TermStructureModel::new(config.term_structure),
            quantifier,
            explainer: None,
        })
    }

    /// Attaches a feature-attribution capability. Explanation failures
    /// fail the forecast call; there is no silent degradation.
    #[must_use]
    pub fn with_explainer(mut self, explainer: Box<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    /// Returns the route this orchestrator serves.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Returns the shared hierarchy matrix.
    #[must_use]
    pub fn hierarchy(&self) -> &Arc<HierarchyMatrix> {
        &self.hierarchy
    }

    /// Returns the term-structure model, for diagnostics inspection.
    #[must_use]
    pub fn term_structure(&self) -> &TermStructureModel {
        &self.term_structure
    }

    /// Returns the uncertainty quantifier.
    #[must_use]
    pub fn quantifier(&self) -> &BayesianUncertaintyQuantifier {
        &self.quantifier
    }

    fn validate_curve_table(&self, forward_curves: &ForwardCurveTable) -> ForecastResult<()> {
        if forward_curves.tenors() != self.hierarchy.tenors() {
            return Err(ForecastError::shape_mismatch(
                format!("forward curves over {:?}", self.hierarchy.tenors()),
                format!("forward curves over {:?}", forward_curves.tenors()),
            ));
        }
        Ok(())
    }

    /// Runs the full pipeline and assembles one forecast record.
    ///
    /// Fit, predict, curve fit, regime resolution, and uncertainty all
    /// run in sequence; the first failure aborts the call.
    ///
    /// # Errors
    ///
    /// Propagates every component's error unchanged: shape mismatches
    /// between tables and the hierarchy, fit failures, and malformed
    /// regime or expert inputs.
    pub fn forecast(
        &mut self,
        features: &FeatureTable,
        targets: &TargetTable,
        forward_curves: &ForwardCurveTable,
        conditions: &MarketConditions,
    ) -> ForecastResult<ForecastRecord> {
        self.validate_curve_table(forward_curves)?;

        self.model.fit(features, targets)?;
        let points = self.model.predict(features)?;

        self.term_structure.fit(forward_curves)?;
        let horizons: Vec<f64> = self.hierarchy.tenors().iter().map(Tenor::horizon).collect();
        let curve_points = self.term_structure.predict(&horizons)?;
        let term_variance = self.term_structure.rate_uncertainty(&horizons)?;

        if let Some(label) = &conditions.regime {
            self.quantifier.record_regime(label)?;
        }

        let base_variance = self.model.residual_variances()?;
        let expert_variance = conditions
            .expert_uncertainty
            .as_ref()
            .map(|map| self.quantifier.expert_variances(map))
            .transpose()?;
        let sources = UncertaintySources {
            base_variance: &base_variance,
            term_structure_variance: &term_variance,
            expert_variance: expert_variance.as_deref(),
        };
        let uncertainty = self.quantifier.quantify(&sources, conditions)?;

        let explanation = self
            .explainer
            .as_ref()
            .map(|e| e.explain(&self.model, features))
            .transpose()?;

        let curve_rates = self
            .hierarchy
            .tenors()
            .iter()
            .zip(&curve_points)
            .map(|(tenor, point)| (tenor.code().to_string(), point.rate))
            .collect();

        info!(
            "assembled forecast for route {}: {} tenors, {} levels",
            self.route,
            self.hierarchy.n_tenors(),
            self.hierarchy.n_levels()
        );

        Ok(ForecastRecord {
            route: self.route.clone(),
            generated_at: Utc::now(),
            base: points.base,
            aggregates: points.aggregates,
            curve_rates,
            uncertainty,
            explanation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tenor(code: &str) -> Tenor {
        Tenor::parse(code).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn orchestrator() -> FFAOrchestrator {
        FFAOrchestrator::new(
            "C5",
            vec!["route".to_string(), "global".to_string()],
            vec![tenor("1M"), tenor("2M"), tenor("3M")],
            OrchestratorConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_mismatched_curve_table() {
        let mut orch = orchestrator();
        let features = FeatureTable::new(vec!["spot".to_string()]).unwrap();
        let targets = TargetTable::new();

        let mut curves = ForwardCurveTable::new(vec![tenor("1M"), tenor("2M")]).unwrap();
        curves.push_observation(date(1), vec![50.0, 51.0]).unwrap();

        assert!(matches!(
            orch.forecast(&features, &targets, &curves, &MarketConditions::unobserved()),
            Err(ForecastError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_regime_label_fails_the_call() {
        let mut orch = orchestrator();
        let mut features = FeatureTable::new(vec!["spot".to_string()]).unwrap();
        let mut targets = TargetTable::new();
        let mut curves =
            ForwardCurveTable::new(vec![tenor("1M"), tenor("2M"), tenor("3M")]).unwrap();
        for d in 1..=4 {
            for code in ["1M", "2M", "3M"] {
                features.push_row(tenor(code), date(d), vec![50.0]).unwrap();
                targets.push(tenor(code), date(d), 100.0);
            }
            curves.push_observation(date(d), vec![50.0, 50.0, 50.0]).unwrap();
        }

        let result = orch.forecast(
            &features,
            &targets,
            &curves,
            &MarketConditions::observed("hurricane"),
        );
        assert!(matches!(result, Err(ForecastError::Configuration { .. })));
    }
}
