//! The cohort specification document

use crate::{Codelist, Expectations, ReturnType, VariableDefinition};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Serialize;

/// Identifier column the consuming engine prepends to every output row
pub const PATIENT_ID_COLUMN: &str = "patient_id";

/// Names that cannot be used for variables
pub const RESERVED_NAMES: [&str; 2] = [PATIENT_ID_COLUMN, "population"];

/// One column of the extraction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ReturnType,
    /// Variable that produces the column; `None` for the identifier column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

/// A loaded, immutable cohort specification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyDefinition {
    pub index_date: NaiveDate,
    pub default_expectations: Expectations,
    pub population: VariableDefinition,
    pub variables: IndexMap<String, VariableDefinition>,
    pub codelists: IndexMap<String, Codelist>,
}

impl StudyDefinition {
    pub fn variable(&self, name: &str) -> Option<&VariableDefinition> {
        self.variables.get(name)
    }

    pub fn codelist(&self, name: &str) -> Option<&Codelist> {
        self.codelists.get(name)
    }

    /// Expectations used for dummy data: the variable's own, overlaid on the
    /// document defaults
    pub fn effective_expectations(&self, variable: &VariableDefinition) -> Expectations {
        match &variable.return_expectations {
            Some(own) => own.merged_over(&self.default_expectations),
            None => self.default_expectations.clone(),
        }
    }

    /// Columns the consuming engine produces, in order
    pub fn columns(&self) -> Vec<OutputColumn> {
        let mut columns = vec![OutputColumn {
            name: PATIENT_ID_COLUMN.to_string(),
            column_type: ReturnType::Int,
            variable: None,
        }];

        for variable in self.variables.values() {
            columns.push(OutputColumn {
                name: variable.name.clone(),
                column_type: variable.return_type(),
                variable: Some(variable.name.clone()),
            });
            if let Some(name) = variable.date_column() {
                columns.push(OutputColumn {
                    name,
                    column_type: ReturnType::Date,
                    variable: Some(variable.name.clone()),
                });
            }
        }

        columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AgeAsOf, DateExpr, DateWindow, EventQuery, MostRecentBmi, Operator, Rate,
    };
    use pretty_assertions::assert_eq;

    fn study() -> StudyDefinition {
        let population = VariableDefinition::new(
            "population",
            Operator::WithTheseClinicalEvents(EventQuery::new("hf_codes")),
        );
        let age = VariableDefinition::new(
            "age",
            Operator::AgeAsOf(AgeAsOf {
                reference_date: DateExpr::index_date(),
            }),
        )
        .with_expectations(Expectations {
            rate: Some(Rate::Universal),
            ..Expectations::default()
        });
        let bmi = VariableDefinition::new(
            "bmi",
            Operator::MostRecentBmi(MostRecentBmi {
                window: DateWindow::unbounded(),
                minimum_age_at_measurement: 18,
                include_measurement_date: true,
                date_format: None,
            }),
        );

        StudyDefinition {
            index_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            default_expectations: Expectations {
                incidence: Some(0.5),
                rate: Some(Rate::ExponentialIncrease),
                ..Expectations::default()
            },
            population,
            variables: [("age".to_string(), age), ("bmi".to_string(), bmi)]
                .into_iter()
                .collect(),
            codelists: IndexMap::new(),
        }
    }

    #[test]
    fn test_columns() {
        let names: Vec<_> = study().columns().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["patient_id", "age", "bmi", "bmi_date_measured"]);
    }

    #[test]
    fn test_effective_expectations() {
        let study = study();
        let age = study.variable("age").unwrap();
        let effective = study.effective_expectations(age);
        assert_eq!(effective.rate, Some(Rate::Universal));
        assert_eq!(effective.incidence, Some(0.5));

        let bmi = study.variable("bmi").unwrap();
        assert_eq!(study.effective_expectations(bmi), study.default_expectations);
    }
}
