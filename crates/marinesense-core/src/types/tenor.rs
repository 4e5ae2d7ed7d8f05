//! FFA tenor identifiers.
//!
//! A tenor names a forward-looking maturity bucket for an FFA contract,
//! e.g. `"1M"` (one month out), `"2Q"` (two quarters out), `"1Y"`
//! (one calendar year out). Tenors order by horizon length.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, ForecastResult};

/// A forward maturity bucket for an FFA contract.
///
/// Parsed from a code of the form `<count><unit>` where the unit is one of
/// `M` (month), `Q` (quarter), or `Y` (year). The numeric horizon in years
/// is derived from the code and drives ordering and curve evaluation.
///
/// # Example
///
/// ```rust
/// use marinesense_core::types::Tenor;
///
/// let near: Tenor = "1M".parse().unwrap();
/// let far: Tenor = "1Y".parse().unwrap();
/// assert!(near < far);
/// assert!((far.horizon() - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tenor {
    code: String,
    horizon: f64,
}

impl Tenor {
    /// Parses a tenor from its market code.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the code is not of the form
    /// `<count><M|Q|Y>` with a positive count.
    pub fn parse(code: &str) -> ForecastResult<Self> {
        let code = code.trim().to_uppercase();
        // Market codes are ASCII; checking up front keeps the byte-index
        // split below on char boundaries.
        if !code.is_ascii() {
            return Err(ForecastError::configuration(format!(
                "tenor code '{code}' contains non-ASCII characters"
            )));
        }
        if code.len() < 2 {
            return Err(ForecastError::configuration(format!(
                "tenor code '{code}' too short; expected e.g. 1M, 2Q, 1Y"
            )));
        }

        let (count_str, unit) = code.split_at(code.len() - 1);
        let count: u32 = count_str.parse().map_err(|_| {
            ForecastError::configuration(format!("tenor code '{code}' has non-numeric count"))
        })?;
        if count == 0 {
            return Err(ForecastError::configuration(format!(
                "tenor code '{code}' has zero count"
            )));
        }

        let years_per_unit = match unit {
            "M" => 1.0 / 12.0,
            "Q" => 0.25,
            "Y" => 1.0,
            other => {
                return Err(ForecastError::configuration(format!(
                    "tenor code '{code}' has unknown unit '{other}'; expected M, Q, or Y"
                )))
            }
        };

        Ok(Self {
            horizon: f64::from(count) * years_per_unit,
            code,
        })
    }

    /// Returns the market code, e.g. `"3M"`.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Returns the horizon in years.
    #[must_use]
    pub fn horizon(&self) -> f64 {
        self.horizon
    }
}

impl FromStr for Tenor {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Tenor {
    type Error = ForecastError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Tenor> for String {
    fn from(tenor: Tenor) -> Self {
        tenor.code
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

impl PartialEq for Tenor {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Tenor {}

impl std::hash::Hash for Tenor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.code.hash(state);
    }
}

impl PartialOrd for Tenor {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tenor {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Horizon drives ordering; the code breaks ties so that distinct
        // codes with equal horizons (e.g. 3M vs 1Q) stay distinct in sets.
        self.horizon
            .total_cmp(&other.horizon)
            .then_with(|| self.code.cmp(&other.code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month_quarter_year() {
        let m = Tenor::parse("1M").unwrap();
        let q = Tenor::parse("1Q").unwrap();
        let y = Tenor::parse("1Y").unwrap();

        assert!((m.horizon() - 1.0 / 12.0).abs() < 1e-12);
        assert!((q.horizon() - 0.25).abs() < 1e-12);
        assert!((y.horizon() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_parse_normalizes_case() {
        let t = Tenor::parse(" 3m ").unwrap();
        assert_eq!(t.code(), "3M");
    }

    #[test]
    fn test_ordering_by_horizon() {
        let mut tenors: Vec<Tenor> = ["1Y", "1M", "2Q", "3M"]
            .iter()
            .map(|c| c.parse().unwrap())
            .collect();
        tenors.sort();

        let codes: Vec<&str> = tenors.iter().map(Tenor::code).collect();
        assert_eq!(codes, vec!["1M", "3M", "2Q", "1Y"]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(Tenor::parse("").is_err());
        assert!(Tenor::parse("M").is_err());
        assert!(Tenor::parse("0M").is_err());
        assert!(Tenor::parse("3W").is_err());
        assert!(Tenor::parse("xM").is_err());
        // Multi-byte unit characters must error, not panic on a byte
        // split inside a char boundary.
        assert!(Tenor::parse("1µ").is_err());
        assert!(Tenor::parse("µµ").is_err());
    }

    #[test]
    fn test_equal_horizon_distinct_codes() {
        let q = Tenor::parse("1Q").unwrap();
        let m = Tenor::parse("3M").unwrap();
        assert_ne!(q, m);
        assert!((q.horizon() - m.horizon()).abs() < 1e-12);
    }
}
