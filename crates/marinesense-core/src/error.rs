//! Error types for the MarineSense library.
//!
//! All forecasting components surface failures through [`ForecastError`];
//! the orchestrator never substitutes defaults or returns a partially
//! reconciled record.

use thiserror::Error;

/// A specialized Result type for forecasting operations.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// The main error type for forecasting operations.
#[derive(Error, Debug, Clone)]
pub enum ForecastError {
    /// Malformed hierarchy, tenor, or regime definitions.
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Description of the configuration problem.
        reason: String,
    },

    /// `predict` was called before `fit`.
    #[error("{component} has not been fitted; call fit before predict")]
    NotFitted {
        /// The component that was queried before fitting.
        component: String,
    },

    /// A model fit failed to converge or received degenerate input.
    #[error("Fit failed after {iterations} iterations (residual: {residual:.4e}): {message}")]
    FitFailure {
        /// Number of iterations attempted.
        iterations: usize,
        /// Final residual norm.
        residual: f64,
        /// Description of the failure.
        message: String,
    },

    /// Feature, target, or hierarchy dimensions disagree.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// The expected shape or set.
        expected: String,
        /// The actual shape or set.
        actual: String,
    },
}

impl ForecastError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Creates a not-fitted error for the named component.
    #[must_use]
    pub fn not_fitted(component: impl Into<String>) -> Self {
        Self::NotFitted {
            component: component.into(),
        }
    }

    /// Creates a fit-failure error.
    #[must_use]
    pub fn fit_failure(iterations: usize, residual: f64, message: impl Into<String>) -> Self {
        Self::FitFailure {
            iterations,
            residual,
            message: message.into(),
        }
    }

    /// Creates a shape-mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::not_fitted("TermStructureModel");
        assert!(err.to_string().contains("TermStructureModel"));

        let err = ForecastError::fit_failure(200, 1.5e-3, "optimizer stalled");
        assert!(err.to_string().contains("200 iterations"));
        assert!(err.to_string().contains("optimizer stalled"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = ForecastError::shape_mismatch("3 tenors", "2 tenors");
        assert_eq!(err.to_string(), "Shape mismatch: expected 3 tenors, got 2 tenors");
    }
}
