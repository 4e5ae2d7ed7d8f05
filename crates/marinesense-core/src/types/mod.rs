//! Domain types for FFA forecasting.

mod feature_table;
mod forecast;
mod market;
mod tenor;

pub use feature_table::{FeatureRow, FeatureTable, TargetRow, TargetTable};
pub use forecast::{
    Explanation, ForecastRecord, HierarchicalForecast, NodeUncertainty, SourceContribution,
    UncertaintyReport,
};
pub use market::MarketConditions;
pub use tenor::Tenor;
