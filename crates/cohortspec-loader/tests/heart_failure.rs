//! Loading the heart-failure study end to end

use chrono::NaiveDate;
use cohortspec_diagnostics::{CSP0108, CSP0217, Severity};
use cohortspec_loader::{LoadOutcome, LoaderConfig, load_file};
use cohortspec_model::{
    DateExpr, DateFormat, DateWindow, MatchPolicy, Operator, Returning, StudyDefinition,
};
use insta::assert_yaml_snapshot;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/heart_failure/study_definition.json")
}

fn config() -> LoaderConfig {
    LoaderConfig::new().with_today(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap())
}

fn load() -> LoadOutcome {
    load_file(fixture(), &config())
}

fn study() -> StudyDefinition {
    let outcome = load();
    outcome.study.unwrap_or_else(|| panic!("study failed to load: {:#?}", outcome.diagnostics))
}

fn ymd(y: i32, m: u32, d: u32) -> DateExpr {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().into()
}

#[test]
fn test_ace_inhibitor() {
    let study = study();
    let ace = study.variable("ace_inhibitor").unwrap();

    let Operator::WithTheseMedications(query) = &ace.operator else {
        panic!("Expected with_these_medications, got {}", ace.operator.name());
    };
    assert_eq!(ace.operator.name(), "with_these_medications");
    assert_eq!(query.window, DateWindow::between(ymd(2000, 1, 1), ymd(2020, 12, 16)));
    assert_eq!(query.returning, Returning::BinaryFlag);
    assert!(query.include_date_of_match);
    assert_eq!(query.date_format, Some(DateFormat::Day));
    assert_eq!(ace.return_expectations.as_ref().unwrap().incidence, Some(0.05));
    assert_eq!(study.codelist(&query.codelist).unwrap().len(), 4);
}

#[test]
fn test_document_shape() {
    let study = study();

    assert_eq!(study.index_date, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    assert_eq!(study.variables.len(), 11);
    assert_eq!(study.codelists.len(), 13);
    assert!(study.population.is_boolean());
    assert_eq!(study.population.operator.codelist(), Some("hf_codes"));
}

#[test]
fn test_legacy_flags_normalised() {
    let study = study();

    let Operator::WithTheseClinicalEvents(ckd) = &study.variable("ckd").unwrap().operator else {
        panic!("Expected with_these_clinical_events");
    };
    assert_eq!(ckd.returning, Returning::Date);
    assert_eq!(ckd.match_policy, MatchPolicy::FirstMatch);
    assert_eq!(ckd.date_format, Some(DateFormat::Month));

    let Operator::WithTheseClinicalEvents(creatinine) = &study.variable("creatinine").unwrap().operator else {
        panic!("Expected with_these_clinical_events");
    };
    assert_eq!(creatinine.match_policy, MatchPolicy::LastMatch);
    assert_eq!(creatinine.window, DateWindow::on_or_before(ymd(2020, 12, 16)));
    assert_eq!(creatinine.date_format, Some(DateFormat::Month));
}

#[test]
fn test_effective_expectations() {
    let study = study();

    let age = study.effective_expectations(study.variable("age").unwrap());
    assert_eq!(age.incidence, Some(0.5));
    assert_eq!(age.date.unwrap().latest, Some(DateExpr::today()));

    let bmi = study.effective_expectations(study.variable("bmi").unwrap());
    assert_eq!(bmi.incidence, Some(0.8));
}

#[test]
fn test_ethnicity_categories() {
    let study = study();
    let ethnicity = study.codelist("ethnicity_codes").unwrap();

    assert!(ethnicity.is_categorised());
    assert_eq!(ethnicity.categories().into_iter().collect::<Vec<_>>(), vec!["1", "2", "3", "4", "5"]);
    let ratios = &study.variable("ethnicity_codes").unwrap().return_expectations.as_ref().unwrap().category;
    assert!(ratios.as_ref().unwrap().sums_to_one());
}

#[test]
fn test_diagnostics() {
    let outcome = load();

    assert!(!outcome.diagnostics.has_errors());
    assert_eq!(outcome.diagnostics.iter().filter(|d| d.code == CSP0108).count(), 7);
    assert!(outcome.diagnostics.iter().filter(|d| d.code == CSP0217).all(|d| d.severity == Severity::Warning));

    let summary: Vec<String> = outcome
        .diagnostics
        .iter()
        .map(|d| format!("{} {} {}", d.code, d.severity, d.path.as_deref().unwrap_or("-")))
        .collect();
    assert_yaml_snapshot!("heart_failure_diagnostics", summary);
}

#[test]
fn test_strict_rejects_the_study() {
    let outcome = load_file(fixture(), &config().strict(true));
    assert!(outcome.study.is_none());
    assert!(!outcome.diagnostics.has_errors());
}

#[test]
fn test_output_columns() {
    let columns: Vec<String> = study()
        .columns()
        .into_iter()
        .map(|column| format!("{} {}", column.name, column.column_type))
        .collect();
    assert_yaml_snapshot!("heart_failure_columns", columns);
}

#[test]
fn test_reload_is_identical() {
    let first = load();
    let second = load();

    assert_eq!(first.study, second.study);
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(
        serde_json::to_value(first.study.unwrap()).unwrap(),
        serde_json::to_value(second.study.unwrap()).unwrap()
    );
}
