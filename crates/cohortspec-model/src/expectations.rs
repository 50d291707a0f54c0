//! Expectation specs used to synthesise placeholder data
//!
//! Expectations never influence real extraction. They describe how the
//! consuming engine should sample dummy values for each variable.

use crate::DateExpr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that category ratios sum to one
pub const RATIO_TOLERANCE: f64 = 1e-6;

/// How event dates are spread across the expectation date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rate {
    /// Every subject has a value
    Universal,
    /// Dates uniformly distributed
    Uniform,
    /// Dates skewed towards the latest bound
    ExponentialIncrease,
}

/// Numeric distribution for `float` and `int` expectations
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "snake_case")]
pub enum Distribution {
    Normal { mean: f64, stddev: f64 },
    Uniform { min: f64, max: f64 },
    /// Age structure of the general population
    PopulationAges,
}

/// Category ratios for categorical variables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryExpectation {
    pub ratios: IndexMap<String, f64>,
}

impl CategoryExpectation {
    pub fn total(&self) -> f64 {
        self.ratios.values().sum()
    }

    pub fn sums_to_one(&self) -> bool {
        (self.total() - 1.0).abs() <= RATIO_TOLERANCE
    }
}

/// Bounds for sampled dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateExpectation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earliest: Option<DateExpr>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateExpr>,
}

/// Dummy-data parameters for one variable, or the document defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Expectations {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateExpectation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float: Option<Distribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub int: Option<Distribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryExpectation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bool: Option<bool>,
}

impl Expectations {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay these expectations on `defaults`, key by key. Keys set here win.
    pub fn merged_over(&self, defaults: &Expectations) -> Expectations {
        Expectations {
            date: self.date.clone().or_else(|| defaults.date.clone()),
            rate: self.rate.or(defaults.rate),
            incidence: self.incidence.or(defaults.incidence),
            float: self.float.or(defaults.float),
            int: self.int.or(defaults.int),
            category: self.category.clone().or_else(|| defaults.category.clone()),
            bool: self.bool.or(defaults.bool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_distribution_deserialize() {
        let normal: Distribution =
            serde_json::from_str(r#"{"distribution": "normal", "mean": 28, "stddev": 8}"#).unwrap();
        assert_eq!(normal, Distribution::Normal { mean: 28.0, stddev: 8.0 });

        let ages: Distribution = serde_json::from_str(r#"{"distribution": "population_ages"}"#).unwrap();
        assert_eq!(ages, Distribution::PopulationAges);
    }

    #[test]
    fn test_ratios_sum() {
        let category: CategoryExpectation = serde_json::from_str(
            r#"{"ratios": {"1": 0.6, "2": 0.2, "3": 0.025, "4": 0.025, "5": 0.15}}"#,
        )
        .unwrap();
        assert!(category.sums_to_one());
        assert_eq!(category.ratios.keys().collect::<Vec<_>>(), vec!["1", "2", "3", "4", "5"]);

        let short: CategoryExpectation =
            serde_json::from_str(r#"{"ratios": {"1": 0.6, "2": 0.3}}"#).unwrap();
        assert!(!short.sums_to_one());
    }

    #[test]
    fn test_merged_over_defaults() {
        let defaults = Expectations {
            date: Some(DateExpectation {
                earliest: Some(NaiveDate::from_ymd_opt(1900, 1, 1).unwrap().into()),
                latest: Some(DateExpr::today()),
            }),
            rate: Some(Rate::ExponentialIncrease),
            incidence: Some(0.5),
            float: Some(Distribution::Normal { mean: 80.0, stddev: 10.0 }),
            ..Expectations::default()
        };
        let own = Expectations {
            incidence: Some(0.05),
            rate: Some(Rate::Universal),
            ..Expectations::default()
        };

        let merged = own.merged_over(&defaults);
        assert_eq!(merged.incidence, Some(0.05));
        assert_eq!(merged.rate, Some(Rate::Universal));
        assert_eq!(merged.float, defaults.float);
        assert_eq!(merged.date, defaults.date);
        assert!(Expectations::default().is_empty());
    }
}
