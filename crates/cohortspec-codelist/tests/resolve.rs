//! Tests for resolving codelist declarations against files on disk

use cohortspec_codelist::CodelistResolver;
use cohortspec_diagnostics::{CSP0301, CSP0302, CSP0306};
use cohortspec_model::{CodelistDeclaration, CodingSystem};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const ETHNICITY_CSV: &str = "\
Code,Description,Grouping_6
XaJQv,\"White, British\",1
XaJQw,\"White, Irish\",1
XaJR0,Indian,3
XaJR2,Pakistani,3
XaJR5,\"Black, Caribbean\",4
";

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("codelists")).unwrap();
    fs::write(dir.path().join("codelists/ethnicity.csv"), ETHNICITY_CSV).unwrap();
    dir
}

#[test]
fn test_categorised_codelist() {
    let dir = setup();
    let resolver = CodelistResolver::with_paths(Vec::new());
    let decl = CodelistDeclaration::csv("ethnicity_codes", CodingSystem::Ctv3, "codelists/ethnicity.csv", "Code")
        .with_category_column("Grouping_6");

    let checked = resolver.resolve(&decl, Some(dir.path())).unwrap();

    assert!(checked.diagnostics.is_empty(), "{:?}", checked.diagnostics);
    assert_eq!(checked.codelist.len(), 5);
    assert!(checked.codelist.is_categorised());
    assert_eq!(
        checked.codelist.categories().into_iter().collect::<Vec<_>>(),
        vec!["1", "3", "4"]
    );
}

#[test]
fn test_two_codelists_share_one_file() {
    let dir = setup();
    let resolver = CodelistResolver::with_paths(Vec::new());
    let codes = CodelistDeclaration::csv("eth", CodingSystem::Ctv3, "codelists/ethnicity.csv", "Code");
    let grouped = codes.clone().with_category_column("Grouping_6");

    resolver.resolve(&codes, Some(dir.path())).unwrap();
    resolver.resolve(&grouped, Some(dir.path())).unwrap();

    assert_eq!(resolver.cached_files(), 1);
}

#[test]
fn test_missing_category_column() {
    let dir = setup();
    let resolver = CodelistResolver::with_paths(Vec::new());
    let decl = CodelistDeclaration::csv("eth", CodingSystem::Ctv3, "codelists/ethnicity.csv", "Code")
        .with_category_column("Grouping_16");

    let err = resolver.resolve(&decl, Some(dir.path())).unwrap_err();
    assert_eq!(err.code(), CSP0301);
}

#[test]
fn test_row_problems_are_diagnostics() {
    let dir = setup();
    fs::write(
        dir.path().join("codelists/hf.csv"),
        "CTV3ID,Term\nG58..,Heart failure\n,Missing code\n\"G580.\n",
    )
    .unwrap();
    let resolver = CodelistResolver::with_paths(Vec::new());
    let decl = CodelistDeclaration::csv("hf_codes", CodingSystem::Ctv3, "codelists/hf.csv", "CTV3ID");

    // Unterminated quote is fatal
    let err = resolver.resolve(&decl, Some(dir.path())).unwrap_err();
    assert_eq!(err.code(), CSP0306);

    fs::write(
        dir.path().join("codelists/hf.csv"),
        "CTV3ID,Term\nG58..,Heart failure\n,Missing code\n",
    )
    .unwrap();
    resolver.clear_cache();

    let checked = resolver.resolve(&decl, Some(dir.path())).unwrap();
    assert_eq!(checked.codelist.len(), 1);
    assert!(checked.diagnostics.contains_code(CSP0302));
    let empty = checked.diagnostics.iter().next().unwrap();
    assert!(empty.related[0].message.ends_with("row 3"));
}
