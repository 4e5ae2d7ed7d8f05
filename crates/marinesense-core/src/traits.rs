//! Core abstractions for forecasting models and explainers.

use crate::error::ForecastResult;
use crate::types::{Explanation, FeatureTable, HierarchicalForecast, TargetTable, Tenor};

/// A forecasting model producing hierarchy-coherent point forecasts.
///
/// The trait is the seam between the orchestrator and concrete model
/// families: the hierarchical regression model today, alternates later.
/// Implementations mutate internal parameters on `fit`, so one model
/// instance serves at most one forecast call at a time; distinct routes
/// own distinct instances and may run in parallel.
pub trait ForecastModel: Send + Sync {
    /// Fits the model from features and observed targets.
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch when the tables do not align with the
    /// tenors the model was constructed for, or a fit failure on
    /// degenerate input.
    fn fit(&mut self, features: &FeatureTable, targets: &TargetTable) -> ForecastResult<()>;

    /// Predicts a value for every hierarchy node.
    ///
    /// # Errors
    ///
    /// Returns `NotFitted` when called before a successful `fit`.
    fn predict(&self, features: &FeatureTable) -> ForecastResult<HierarchicalForecast>;

    /// Returns true once `fit` has succeeded.
    fn is_fitted(&self) -> bool;

    /// The base tenors this model forecasts, in hierarchy order.
    fn tenors(&self) -> &[Tenor];
}

/// An external feature-attribution capability.
///
/// Receives the fitted base model and the feature table it was fitted
/// from, and returns per-feature attribution scores. The mechanism
/// (SHAP or otherwise) is opaque to the core.
pub trait Explainer: Send + Sync {
    /// Computes attribution scores for the fitted model.
    fn explain(
        &self,
        model: &dyn ForecastModel,
        features: &FeatureTable,
    ) -> ForecastResult<Explanation>;
}
