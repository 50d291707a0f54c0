//! Command tests against the heart failure study

use cohortspec::cli::codelists::{self, CodelistsConfig};
use cohortspec::cli::columns::{self, ColumnsConfig};
use cohortspec::cli::inspect::{VariableRow, format_window};
use cohortspec::cli::load::{LoadOptions, load_study};
use cohortspec::cli::output::OutputFormat;
use cohortspec::cli::validate::{self, ValidateConfig};
use pretty_assertions::assert_eq;
use rstest::{fixture, rstest};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

fn study_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../cohortspec-loader/tests/fixtures/heart_failure/study_definition.json")
}

#[fixture]
fn options() -> LoadOptions {
    LoadOptions {
        today: Some("2021-03-01".to_string()),
        ..LoadOptions::default()
    }
}

fn read_json(path: &PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[rstest]
fn test_codelist_summary(options: LoadOptions) {
    let study = load_study(&study_path(), &options, false).unwrap();
    let summaries = codelists::summarise(&study);

    assert_eq!(summaries.len(), 13);

    let hf = summaries.iter().find(|s| s.name == "hf_codes").unwrap();
    assert_eq!(hf.system, "ctv3");
    assert_eq!(hf.codes, 5);
    assert_eq!(hf.used_by, vec!["population"]);

    let ethnicity = summaries.iter().find(|s| s.name == "ethnicity_codes").unwrap();
    assert_eq!(ethnicity.categories, vec!["1", "2", "3", "4", "5"]);
    assert_eq!(ethnicity.used_by, vec!["ethnicity_codes"]);

    let beta_blockers = summaries.iter().find(|s| s.name == "bb_codes").unwrap();
    assert_eq!(beta_blockers.system, "snomed");
    assert!(beta_blockers.used_by.is_empty());
}

#[rstest]
#[case("population", "with_these_clinical_events", "binary_flag", "hf_codes", ">= 2000-01-01")]
#[case("age", "age_as_of", "int", "-", "-")]
#[case("bmi", "most_recent_bmi", "float", "-", "2010-01-01 .. 2020-12-16")]
#[case("ckd", "with_these_clinical_events", "date", "ckd_codes", "any time")]
#[case("creatinine", "with_these_clinical_events", "numeric_value", "creatinine_codes", "<= 2020-12-16")]
fn test_variable_rows(
    options: LoadOptions,
    #[case] name: &str,
    #[case] operator: &str,
    #[case] returns: &str,
    #[case] codelist: &str,
    #[case] window: &str,
) {
    let study = load_study(&study_path(), &options, false).unwrap();
    let variable = if name == "population" {
        &study.population
    } else {
        study.variable(name).unwrap()
    };

    let row = VariableRow::new(variable);
    assert_eq!(row.operator, operator);
    assert_eq!(row.returns, returns);
    assert_eq!(row.codelist, codelist);
    assert_eq!(row.window, window);
    if let Some(window_def) = variable.operator.window() {
        assert_eq!(format_window(window_def), window);
    }
}

#[rstest]
#[tokio::test]
async fn test_columns_written_as_json(options: LoadOptions) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("columns.json");

    columns::columns(ColumnsConfig {
        file: study_path(),
        options,
        verbose: false,
        output_format: OutputFormat::Json,
        output_file: Some(output.clone()),
    })
    .await
    .unwrap();

    let columns = read_json(&output);
    let columns = columns.as_array().unwrap();
    assert_eq!(columns.len(), 19);
    assert_eq!(columns[0], serde_json::json!({"name": "patient_id", "type": "int"}));
    assert_eq!(
        columns[1],
        serde_json::json!({"name": "age", "type": "int", "variable": "age"})
    );
}

#[rstest]
#[tokio::test]
async fn test_codelists_table(options: LoadOptions) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("codelists.txt");

    codelists::codelists(CodelistsConfig {
        file: study_path(),
        options,
        verbose: false,
        output_format: OutputFormat::Table,
        output_file: Some(output.clone()),
    })
    .await
    .unwrap();

    let table = std::fs::read_to_string(&output).unwrap();
    assert!(table.contains("Used by"));
    assert!(table.contains("systolic_blood_pressure_codes"));
    assert!(table.contains("1, 2, 3, 4, 5"));
}

#[rstest]
#[tokio::test]
async fn test_validate_json_report(options: LoadOptions) {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("report.json");

    validate::validate(ValidateConfig {
        files: vec![study_path()],
        options,
        verbose: false,
        output_format: Some(OutputFormat::Json),
        output_file: Some(output.clone()),
    })
    .await
    .unwrap();

    let report = read_json(&output);
    assert_eq!(report[0]["success"], Value::Bool(true));
    let codes: Vec<_> = report[0]["diagnostics"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["code"].as_str().unwrap().to_string())
        .collect();
    assert!(codes.contains(&"CSP0217".to_string()));
    assert!(codes.contains(&"CSP0108".to_string()));
}

#[rstest]
#[tokio::test]
async fn test_strict_validation_fails(options: LoadOptions) {
    let options = LoadOptions { strict: true, ..options };

    let err = validate::validate(ValidateConfig {
        files: vec![study_path()],
        options: options.clone(),
        verbose: false,
        output_format: None,
        output_file: None,
    })
    .await
    .unwrap_err();
    assert!(err.to_string().starts_with("Validation failed"));

    let err = load_study(&study_path(), &options, false).unwrap_err();
    assert!(err.to_string().contains("could not be loaded"));
    assert!(err.to_string().contains("0 error(s)"));
}

#[test]
fn test_missing_file() {
    let err = load_study(&PathBuf::from("does/not/exist.json"), &LoadOptions::default(), false).unwrap_err();
    assert!(err.to_string().contains("1 error(s)"));
}
