//! # MarineSense Forecast
//!
//! Hierarchy-consistent FFA forecasting with regime-aware uncertainty.
//!
//! The pipeline has four pieces:
//!
//! - [`hierarchy::HierarchyMatrix`]: the dense roll-up from base tenors
//!   to aggregate levels, shared by everything downstream
//! - [`model::HierarchicalFFAModel`]: per-tenor ridge regressions with
//!   structural reconciliation (bottom-up, top-down, or middle-out)
//! - [`uncertainty::BayesianUncertaintyQuantifier`]: three-source
//!   variance combination, regime-marginalized and propagated through
//!   the hierarchy
//! - [`orchestrator::FFAOrchestrator`]: one-call assembly of a complete
//!   [`marinesense_core::types::ForecastRecord`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use marinesense_core::types::{FeatureTable, MarketConditions, TargetTable, Tenor};
//! use marinesense_curves::ForwardCurveTable;
//! use marinesense_forecast::{FFAOrchestrator, OrchestratorConfig};
//!
//! # fn main() -> marinesense_core::error::ForecastResult<()> {
//! let tenors: Vec<Tenor> = ["1M", "2M", "3M"]
//!     .iter()
//!     .map(|c| Tenor::parse(c))
//!     .collect::<Result<_, _>>()?;
//! let mut orchestrator = FFAOrchestrator::new(
//!     "C5",
//!     vec!["route".to_string(), "global".to_string()],
//!     tenors.clone(),
//!     OrchestratorConfig::default(),
//! )?;
//!
//! let features = FeatureTable::new(vec!["spot".to_string()])?;
//! let targets = TargetTable::new();
//! let curves = ForwardCurveTable::new(tenors)?;
//! let record = orchestrator.forecast(
//!     &features,
//!     &targets,
//!     &curves,
//!     &MarketConditions::observed("calm"),
//! )?;
//! println!("1M interval: {:?}", record.interval_for("1M"));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::similar_names)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::float_cmp)]

pub mod hierarchy;
pub mod model;
pub mod orchestrator;
pub mod uncertainty;

pub use hierarchy::{HierarchyMatrix, TenorMembership};
pub use model::{HierarchicalFFAModel, ModelConfig, ReconciliationPolicy};
pub use orchestrator::{FFAOrchestrator, OrchestratorConfig};
pub use uncertainty::{
    BayesianUncertaintyQuantifier, QuantifierConfig, RegimeSpec, UncertaintySources,
};
