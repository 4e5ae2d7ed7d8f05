//! # MarineSense Math
//!
//! Numerical utilities for the MarineSense FFA forecasting library.
//!
//! This crate provides:
//!
//! - **Curves**: Tenor-horizon curve families (Nelson-Siegel, natural
//!   cubic spline) behind one evaluation trait
//! - **Optimization**: Bounded-budget nonlinear least-squares minimizer
//! - **Stats**: Mixture-variance decomposition, covariance propagation,
//!   and correlated source combination
//!
//! ## Design Philosophy
//!
//! - **Numerical Stability**: Taylor guards near zero, no silent NaNs
//! - **Fail Fast**: Every iterative routine honors a hard budget and
//!   reports its last state instead of blocking

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
#![allow(clippy::many_single_char_names)]
#![allow(clippy::uninlined_format_args)]

pub mod curves;
pub mod error;
pub mod optimization;
pub mod stats;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::curves::{NaturalCubicSpline, NelsonSiegel, TenorCurve};
    pub use crate::error::{MathError, MathResult};
    pub use crate::optimization::{minimize, OptimizerConfig, OptimizerResult};
    pub use crate::stats::{
        correlated_combination, mixture_variance, propagate_variance, sample_variance,
        weighted_mean,
    };
}

pub use error::{MathError, MathResult};
