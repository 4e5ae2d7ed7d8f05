//! Observed forward-curve quotes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use marinesense_core::error::{ForecastError, ForecastResult};
use marinesense_core::types::Tenor;

/// One observed forward curve: the quoted rate per tenor on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveObservation {
    /// Quote date.
    pub date: NaiveDate,
    /// Quoted rates, aligned with the table's tenor columns.
    rates: Vec<f64>,
}

impl CurveObservation {
    /// Returns the quoted rates in tenor-column order.
    #[must_use]
    pub fn rates(&self) -> &[f64] {
        &self.rates
    }
}

/// A table of observed forward curves: one row per quote date, one
/// column per tenor.
///
/// Tenor columns are fixed at construction and ordered by horizon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardCurveTable {
    tenors: Vec<Tenor>,
    observations: Vec<CurveObservation>,
}

impl ForwardCurveTable {
    /// Creates an empty table with the given tenor columns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no tenors are given, a tenor
    /// repeats, or the tenors are not in ascending horizon order.
    pub fn new(tenors: Vec<Tenor>) -> ForecastResult<Self> {
        if tenors.is_empty() {
            return Err(ForecastError::configuration(
                "forward curve table requires at least one tenor",
            ));
        }
        for (i, tenor) in tenors.iter().enumerate() {
            if tenors[..i].contains(tenor) {
                return Err(ForecastError::configuration(format!(
                    "duplicate tenor '{tenor}' in forward curve table"
                )));
            }
            if i > 0 && tenors[i - 1].horizon() >= tenor.horizon() {
                return Err(ForecastError::configuration(format!(
                    "tenors must ascend by horizon: '{}' before '{tenor}'",
                    tenors[i - 1]
                )));
            }
        }
        Ok(Self {
            tenors,
            observations: Vec::new(),
        })
    }

    /// Appends one observed curve.
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch if the rate count disagrees with the
    /// tenor columns.
    pub fn push_observation(&mut self, date: NaiveDate, rates: Vec<f64>) -> ForecastResult<()> {
        if rates.len() != self.tenors.len() {
            return Err(ForecastError::shape_mismatch(
                format!("{} rates", self.tenors.len()),
                format!("{} rates", rates.len()),
            ));
        }
        self.observations.push(CurveObservation { date, rates });
        Ok(())
    }

    /// Returns the tenor columns in horizon order.
    #[must_use]
    pub fn tenors(&self) -> &[Tenor] {
        &self.tenors
    }

    /// Returns the tenor horizons in years, in column order.
    #[must_use]
    pub fn horizons(&self) -> Vec<f64> {
        self.tenors.iter().map(Tenor::horizon).collect()
    }

    /// Returns all observations in insertion order.
    #[must_use]
    pub fn observations(&self) -> &[CurveObservation] {
        &self.observations
    }

    /// Returns true if no curves have been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Returns the most recent quote date, if any.
    #[must_use]
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|obs| obs.date).max()
    }
}
