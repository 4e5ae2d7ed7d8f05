//! Feature and target tables keyed by (tenor, date).
//!
//! Both tables are fully materialized before entering the forecasting
//! pipeline and are consumed immutably by fit and predict calls.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};
use crate::types::Tenor;

/// One observation row of a [`FeatureTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Tenor this row describes.
    pub tenor: Tenor,
    /// Observation date.
    pub date: NaiveDate,
    /// Feature values, aligned with the table's column names.
    values: Vec<f64>,
}

impl FeatureRow {
    /// Returns the feature values in column order.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// A table of model features keyed by (tenor, date).
///
/// Column names are fixed at construction; every row must carry exactly
/// one value per column. Rows are never mutated once pushed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    feature_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Creates an empty table with the given feature columns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no columns are given or a column
    /// name repeats.
    pub fn new(feature_names: Vec<String>) -> ForecastResult<Self> {
        if feature_names.is_empty() {
            return Err(ForecastError::configuration(
                "feature table requires at least one column",
            ));
        }
        for (i, name) in feature_names.iter().enumerate() {
            if feature_names[..i].contains(name) {
                return Err(ForecastError::configuration(format!(
                    "duplicate feature column '{name}'"
                )));
            }
        }
        Ok(Self {
            feature_names,
            rows: Vec::new(),
        })
    }

    /// Appends one observation row.
    ///
    /// # Errors
    ///
    /// Returns a shape mismatch if the value count disagrees with the
    /// column count.
    pub fn push_row(
        &mut self,
        tenor: Tenor,
        date: NaiveDate,
        values: Vec<f64>,
    ) -> ForecastResult<()> {
        if values.len() != self.feature_names.len() {
            return Err(ForecastError::shape_mismatch(
                format!("{} feature values", self.feature_names.len()),
                format!("{} feature values", values.len()),
            ));
        }
        self.rows.push(FeatureRow {
            tenor,
            date,
            values,
        });
        Ok(())
    }

    /// Returns the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Returns the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Returns all rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over the rows belonging to one tenor.
    pub fn rows_for_tenor<'a>(
        &'a self,
        tenor: &'a Tenor,
    ) -> impl Iterator<Item = &'a FeatureRow> + 'a {
        self.rows.iter().filter(move |row| &row.tenor == tenor)
    }

    /// Returns the most recent row for a tenor, if any.
    ///
    /// The returned reference borrows from the table only, so it stays
    /// valid after the lookup key is dropped.
    #[must_use]
    pub fn latest_for_tenor(&self, tenor: &Tenor) -> Option<&FeatureRow> {
        self.rows
            .iter()
            .filter(|row| &row.tenor == tenor)
            .max_by_key(|row| row.date)
    }
}

/// Observed settlement values keyed by (tenor, date).
///
/// The fit targets for the hierarchical model: one realized value per
/// base tenor per observation date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetTable {
    rows: Vec<TargetRow>,
}

/// One observed settlement value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    /// Tenor this value settles.
    pub tenor: Tenor,
    /// Observation date.
    pub date: NaiveDate,
    /// Settlement value.
    pub value: f64,
}

impl TargetTable {
    /// Creates an empty target table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one observed value.
    pub fn push(&mut self, tenor: Tenor, date: NaiveDate, value: f64) {
        self.rows.push(TargetRow { tenor, date, value });
    }

    /// Returns all rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> &[TargetRow] {
        &self.rows
    }

    /// Returns true if the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Looks up the value for an exact (tenor, date) key.
    #[must_use]
    pub fn value_for(&self, tenor: &Tenor, date: NaiveDate) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| &row.tenor == tenor && row.date == date)
            .map(|row| row.value)
    }

    /// Returns the (date, value) series for one tenor, sorted by date.
    #[must_use]
    pub fn series_for_tenor(&self, tenor: &Tenor) -> Vec<(NaiveDate, f64)> {
        let mut series: Vec<(NaiveDate, f64)> = self
            .rows
            .iter()
            .filter(|row| &row.tenor == tenor)
            .map(|row| (row.date, row.value))
            .collect();
        series.sort_by_key(|(date, _)| *date);
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenor(code: &str) -> Tenor {
        Tenor::parse(code).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn test_feature_table_rejects_empty_columns() {
        assert!(FeatureTable::new(vec![]).is_err());
    }

    #[test]
    fn test_feature_table_rejects_duplicate_columns() {
        let cols = vec!["spot".to_string(), "spot".to_string()];
        assert!(FeatureTable::new(cols).is_err());
    }

    #[test]
    fn test_push_row_shape_check() {
        let mut table =
            FeatureTable::new(vec!["spot".to_string(), "vol".to_string()]).unwrap();
        let err = table.push_row(tenor("1M"), date(1), vec![1.0]);
        assert!(matches!(err, Err(ForecastError::ShapeMismatch { .. })));
        assert!(table.push_row(tenor("1M"), date(1), vec![1.0, 2.0]).is_ok());
    }

    #[test]
    fn test_latest_for_tenor() {
        let mut table = FeatureTable::new(vec!["spot".to_string()]).unwrap();
        table.push_row(tenor("1M"), date(1), vec![10.0]).unwrap();
        table.push_row(tenor("1M"), date(3), vec![30.0]).unwrap();
        table.push_row(tenor("1M"), date(2), vec![20.0]).unwrap();
        table.push_row(tenor("2M"), date(9), vec![90.0]).unwrap();

        let latest = table.latest_for_tenor(&tenor("1M")).unwrap();
        assert_eq!(latest.date, date(3));
        assert_eq!(latest.values(), &[30.0]);
    }

    #[test]
    fn test_latest_row_outlives_lookup_key() {
        let mut table = FeatureTable::new(vec!["spot".to_string()]).unwrap();
        table.push_row(tenor("1M"), date(1), vec![10.0]).unwrap();
        table.push_row(tenor("1M"), date(2), vec![20.0]).unwrap();

        // The returned borrow is tied to the table, not the key.
        let latest = {
            let key = tenor("1M");
            table.latest_for_tenor(&key)
        };
        assert_eq!(latest.unwrap().values(), &[20.0]);
    }

    #[test]
    fn test_target_series_sorted() {
        let mut targets = TargetTable::new();
        targets.push(tenor("1M"), date(3), 3.0);
        targets.push(tenor("1M"), date(1), 1.0);
        targets.push(tenor("2M"), date(2), 9.0);

        let series = targets.series_for_tenor(&tenor("1M"));
        assert_eq!(series, vec![(date(1), 1.0), (date(3), 3.0)]);
        assert_eq!(targets.value_for(&tenor("2M"), date(2)), Some(9.0));
        assert_eq!(targets.value_for(&tenor("2M"), date(4)), None);
    }
}
