//! # MarineSense Core
//!
//! Core types, traits, and error handling for the MarineSense FFA
//! forecasting library.
//!
//! This crate provides the foundational building blocks used throughout
//! MarineSense:
//!
//! - **Types**: Domain types like [`types::Tenor`], [`types::FeatureTable`],
//!   and the immutable [`types::ForecastRecord`] output
//! - **Traits**: The [`traits::ForecastModel`] and [`traits::Explainer`]
//!   seams between the orchestrator and pluggable capabilities
//! - **Errors**: The unified [`error::ForecastError`] taxonomy
//!
//! ## Design Philosophy
//!
//! - **Type Safety**: Tenor codes and hierarchy nodes are parsed and
//!   validated once, at the edge
//! - **Immutability**: Forecast outputs are value objects, never mutated
//!   after assembly
//! - **Explicit Over Implicit**: Optional inputs carry documented defaults
//!   in a configuration record, not ad hoc missing-argument handling

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

pub mod error;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ForecastError, ForecastResult};
    pub use crate::traits::{Explainer, ForecastModel};
    pub use crate::types::{
        Explanation, FeatureTable, ForecastRecord, HierarchicalForecast, MarketConditions,
        NodeUncertainty, SourceContribution, TargetTable, Tenor, UncertaintyReport,
    };
}

pub use error::{ForecastError, ForecastResult};
