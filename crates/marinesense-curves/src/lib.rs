//! # MarineSense Curves
//!
//! Term structure modeling for FFA forward curves.
//!
//! This crate fits a smooth curve shape over tenor horizons from a
//! table of observed forward curves, and predicts rates at arbitrary
//! (possibly unquoted) horizons:
//!
//! - [`forward_table::ForwardCurveTable`]: observed quotes, one row per
//!   date and one column per tenor
//! - [`term_structure::TermStructureModel`]: fit/predict over a
//!   configurable curve family ([`term_structure::CurveMethod`])
//!
//! Fit residual variance feeds the downstream uncertainty layer;
//! extrapolated horizons are flagged and widened there.

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

pub mod forward_table;
pub mod term_structure;

pub use forward_table::{CurveObservation, ForwardCurveTable};
pub use term_structure::{
    CurveMethod, CurveParameters, CurvePoint, FitDiagnostics, TermStructureConfig,
    TermStructureModel,
};
