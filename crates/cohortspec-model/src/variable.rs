//! Variable definitions and the operator vocabulary

use crate::{CodingSystem, DateExpr, DateWindow, Expectations, PopulationExpr};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// What an event operator returns per subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Returning {
    #[default]
    BinaryFlag,
    Date,
    NumberOfMatchesInPeriod,
    NumberOfEpisodes,
    NumericValue,
    Code,
    Category,
}

impl Returning {
    pub const ALL: [Returning; 7] = [
        Returning::BinaryFlag,
        Returning::Date,
        Returning::NumberOfMatchesInPeriod,
        Returning::NumberOfEpisodes,
        Returning::NumericValue,
        Returning::Code,
        Returning::Category,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Returning::BinaryFlag => "binary_flag",
            Returning::Date => "date",
            Returning::NumberOfMatchesInPeriod => "number_of_matches_in_period",
            Returning::NumberOfEpisodes => "number_of_episodes",
            Returning::NumericValue => "numeric_value",
            Returning::Code => "code",
            Returning::Category => "category",
        }
    }

    /// Return type of the column produced
    pub fn return_type(&self) -> ReturnType {
        match self {
            Returning::BinaryFlag => ReturnType::Bool,
            Returning::Date => ReturnType::Date,
            Returning::NumberOfMatchesInPeriod | Returning::NumberOfEpisodes => ReturnType::Int,
            Returning::NumericValue => ReturnType::Float,
            Returning::Code => ReturnType::Str,
            Returning::Category => ReturnType::Category,
        }
    }
}

impl fmt::Display for Returning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Returning {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Returning::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown returning value '{}'", s))
    }
}

/// Which match within the window an event operator reports on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    #[default]
    Any,
    FirstMatch,
    LastMatch,
}

/// Granularity of reported dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DateFormat {
    Year,
    Month,
    Day,
}

impl DateFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::Year => "YYYY",
            DateFormat::Month => "YYYY-MM",
            DateFormat::Day => "YYYY-MM-DD",
        }
    }
}

impl FromStr for DateFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "YYYY" => Ok(DateFormat::Year),
            "YYYY-MM" => Ok(DateFormat::Month),
            "YYYY-MM-DD" => Ok(DateFormat::Day),
            other => Err(format!("unsupported date format '{}'", other)),
        }
    }
}

impl fmt::Display for DateFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pattern())
    }
}

impl Serialize for DateFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.pattern())
    }
}

/// Column type tag of an extracted value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Bool,
    Int,
    Float,
    Date,
    Str,
    Category,
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReturnType::Bool => "bool",
            ReturnType::Int => "int",
            ReturnType::Float => "float",
            ReturnType::Date => "date",
            ReturnType::Str => "str",
            ReturnType::Category => "category",
        };
        f.write_str(name)
    }
}

/// Age in whole years on a reference date
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgeAsOf {
    pub reference_date: DateExpr,
}

/// Most recent BMI recorded in a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MostRecentBmi {
    pub window: DateWindow,
    pub minimum_age_at_measurement: u32,
    pub include_measurement_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
}

impl MostRecentBmi {
    pub const DEFAULT_MINIMUM_AGE: u32 = 16;
}

/// Mean of the values recorded on the latest measurement day in a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeanRecordedValue {
    pub codelist: String,
    pub on_most_recent_day_of_measurement: bool,
    pub window: DateWindow,
    pub include_measurement_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
}

/// Parameters shared by the medication and clinical-event operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventQuery {
    pub codelist: String,
    pub window: DateWindow,
    pub returning: Returning,
    pub match_policy: MatchPolicy,
    pub include_date_of_match: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
}

impl EventQuery {
    pub fn new(codelist: impl Into<String>) -> Self {
        Self {
            codelist: codelist.into(),
            window: DateWindow::unbounded(),
            returning: Returning::default(),
            match_policy: MatchPolicy::default(),
            include_date_of_match: false,
            date_format: None,
        }
    }
}

/// Boolean combination of other variables
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Satisfying {
    pub expression: PopulationExpr,
}

/// The extraction operator a variable is bound to
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum Operator {
    AgeAsOf(AgeAsOf),
    MostRecentBmi(MostRecentBmi),
    MeanRecordedValue(MeanRecordedValue),
    WithTheseMedications(EventQuery),
    WithTheseClinicalEvents(EventQuery),
    Satisfying(Satisfying),
}

impl Operator {
    pub const NAMES: [&'static str; 6] = [
        "age_as_of",
        "most_recent_bmi",
        "mean_recorded_value",
        "with_these_medications",
        "with_these_clinical_events",
        "satisfying",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operator::AgeAsOf(_) => "age_as_of",
            Operator::MostRecentBmi(_) => "most_recent_bmi",
            Operator::MeanRecordedValue(_) => "mean_recorded_value",
            Operator::WithTheseMedications(_) => "with_these_medications",
            Operator::WithTheseClinicalEvents(_) => "with_these_clinical_events",
            Operator::Satisfying(_) => "satisfying",
        }
    }

    pub fn return_type(&self) -> ReturnType {
        match self {
            Operator::AgeAsOf(_) => ReturnType::Int,
            Operator::MostRecentBmi(_) | Operator::MeanRecordedValue(_) => ReturnType::Float,
            Operator::WithTheseMedications(query) | Operator::WithTheseClinicalEvents(query) => {
                query.returning.return_type()
            }
            Operator::Satisfying(_) => ReturnType::Bool,
        }
    }

    /// Codelist referenced by the operator, if any
    pub fn codelist(&self) -> Option<&str> {
        match self {
            Operator::MeanRecordedValue(params) => Some(&params.codelist),
            Operator::WithTheseMedications(query) | Operator::WithTheseClinicalEvents(query) => {
                Some(&query.codelist)
            }
            _ => None,
        }
    }

    pub fn window(&self) -> Option<&DateWindow> {
        match self {
            Operator::MostRecentBmi(params) => Some(&params.window),
            Operator::MeanRecordedValue(params) => Some(&params.window),
            Operator::WithTheseMedications(query) | Operator::WithTheseClinicalEvents(query) => {
                Some(&query.window)
            }
            _ => None,
        }
    }

    /// Coding systems the operator can match against
    pub fn accepted_systems(&self) -> &'static [CodingSystem] {
        match self {
            Operator::WithTheseMedications(_) => &[CodingSystem::Snomed, CodingSystem::Dmd],
            Operator::WithTheseClinicalEvents(_) | Operator::MeanRecordedValue(_) => {
                &[CodingSystem::Ctv3, CodingSystem::Snomed, CodingSystem::Readv2]
            }
            _ => &[],
        }
    }

    /// Suffix of the extra date column this operator adds, if requested
    pub fn date_column_suffix(&self) -> Option<&'static str> {
        match self {
            Operator::MostRecentBmi(MostRecentBmi { include_measurement_date: true, .. })
            | Operator::MeanRecordedValue(MeanRecordedValue { include_measurement_date: true, .. }) => {
                Some("date_measured")
            }
            Operator::WithTheseMedications(query) | Operator::WithTheseClinicalEvents(query)
                if query.include_date_of_match && query.returning != Returning::Date =>
            {
                Some("date")
            }
            _ => None,
        }
    }

    /// Variables read by a `satisfying` expression
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            Operator::Satisfying(params) => params.expression.referenced_variables().into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

/// One named derived variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(flatten)]
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_expectations: Option<Expectations>,
}

impl VariableDefinition {
    pub fn new(name: impl Into<String>, operator: Operator) -> Self {
        Self {
            name: name.into(),
            operator,
            return_expectations: None,
        }
    }

    pub fn with_expectations(mut self, expectations: Expectations) -> Self {
        self.return_expectations = Some(expectations);
        self
    }

    pub fn return_type(&self) -> ReturnType {
        self.operator.return_type()
    }

    pub fn is_boolean(&self) -> bool {
        self.return_type() == ReturnType::Bool
    }

    /// Name of the extra date column, when the operator produces one
    pub fn date_column(&self) -> Option<String> {
        self.operator
            .date_column_suffix()
            .map(|suffix| format!("{}_{}", self.name, suffix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn ace_inhibitor() -> VariableDefinition {
        let mut query = EventQuery::new("ace_codes");
        query.window = DateWindow::between(
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap().into(),
            NaiveDate::from_ymd_opt(2020, 12, 16).unwrap().into(),
        );
        query.include_date_of_match = true;
        query.date_format = Some(DateFormat::Day);
        VariableDefinition::new("ace_inhibitor", Operator::WithTheseMedications(query))
    }

    #[test]
    fn test_return_types() {
        assert_eq!(ace_inhibitor().return_type(), ReturnType::Bool);
        assert!(ace_inhibitor().is_boolean());

        let mut numeric = EventQuery::new("creatinine_codes");
        numeric.returning = Returning::NumericValue;
        assert_eq!(Operator::WithTheseClinicalEvents(numeric).return_type(), ReturnType::Float);

        let age = Operator::AgeAsOf(AgeAsOf {
            reference_date: DateExpr::index_date(),
        });
        assert_eq!(age.return_type(), ReturnType::Int);
        assert_eq!(age.codelist(), None);
    }

    #[test]
    fn test_date_column_suffix() {
        assert_eq!(ace_inhibitor().operator.date_column_suffix(), Some("date"));
        assert_eq!(ace_inhibitor().date_column().as_deref(), Some("ace_inhibitor_date"));

        let mut date_query = EventQuery::new("ckd_codes");
        date_query.returning = Returning::Date;
        date_query.include_date_of_match = true;
        assert_eq!(Operator::WithTheseClinicalEvents(date_query).date_column_suffix(), None);
    }

    #[test]
    fn test_serialize_flattens_operator() {
        let json = serde_json::to_value(ace_inhibitor()).unwrap();
        assert_eq!(json["operator"], "with_these_medications");
        assert_eq!(json["codelist"], "ace_codes");
        assert_eq!(json["window"]["start"], "2000-01-01");
        assert_eq!(json["date_format"], "YYYY-MM-DD");
        assert_eq!(json["returning"], "binary_flag");
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!("numeric_value".parse::<Returning>(), Ok(Returning::NumericValue));
        assert!("bogus".parse::<Returning>().is_err());
        assert_eq!("YYYY-MM".parse::<DateFormat>(), Ok(DateFormat::Month));
    }
}
