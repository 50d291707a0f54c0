//! Turning raw code entries into a checked codelist

use crate::csv::CsvTable;
use crate::format::is_well_formed;
use cohortspec_diagnostics::{
    CSP0301, CSP0302, CSP0303, CSP0304, CSP0306, CSP0307, CSP0308, CohortError, Diagnostic,
    Diagnostics, RelatedInfo, Result,
};
use cohortspec_model::{ClinicalCode, Codelist, CodingSystem};
use std::collections::HashMap;

/// Examples quoted in a malformed-code warning
const MALFORMED_EXAMPLES: usize = 3;

/// A code as read from its source, before checking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCode {
    /// File line, `None` for inline codes
    pub line: Option<usize>,
    pub code: String,
    pub category: Option<String>,
}

/// A codelist together with what was found while reading it
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedCodelist {
    pub codelist: Codelist,
    pub diagnostics: Diagnostics,
}

/// Extract raw codes from `column` (and optionally `category_column`) of a
/// table. Missing columns are fatal; short rows are reported and skipped.
pub fn raw_codes_from_table(
    table: &CsvTable,
    column: &str,
    category_column: Option<&str>,
    file: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<RawCode>> {
    let code_index = column_index(table, column, file)?;
    let category_index = category_column
        .map(|name| column_index(table, name, file))
        .transpose()?;
    let needed = code_index.max(category_index.unwrap_or(0));

    let mut codes = Vec::with_capacity(table.records.len());
    for record in &table.records {
        if record.fields.len() <= needed {
            diagnostics.push(
                Diagnostic::error(
                    CSP0306,
                    format!(
                        "Row has {} fields, expected at least {}",
                        record.fields.len(),
                        needed + 1
                    ),
                )
                .with_related(row_info(file, record.line)),
            );
            continue;
        }

        let code = record.get(code_index).unwrap_or_default().to_string();
        let category = category_index
            .and_then(|index| record.get(index))
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        codes.push(RawCode {
            line: Some(record.line),
            code,
            category,
        });
    }

    Ok(codes)
}

fn column_index(table: &CsvTable, column: &str, file: &str) -> Result<usize> {
    table.column_index(column).ok_or_else(|| CohortError::Codelist {
        code: CSP0301,
        message: format!(
            "Column '{}' not found; available columns: {}",
            column,
            table.headers.join(", ")
        ),
        file: Some(file.to_string()),
        row: Some(1),
    })
}

/// Check raw codes and build the codelist: empty codes are errors,
/// repeated codes are collapsed, malformed codes are warned about.
pub fn check_codes(
    name: &str,
    system: CodingSystem,
    raw: Vec<RawCode>,
    source: &str,
    mut diagnostics: Diagnostics,
) -> CheckedCodelist {
    let mut codes: Vec<ClinicalCode> = Vec::with_capacity(raw.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut malformed = Vec::new();

    for entry in raw {
        let at = |d: Diagnostic| match entry.line {
            Some(line) => d.with_related(row_info(source, line)),
            None => d,
        };

        if entry.code.is_empty() {
            diagnostics.push(at(Diagnostic::error(
                CSP0302,
                format!("Empty code in codelist '{}'", name),
            )));
            continue;
        }

        if let Some(&index) = seen.get(&entry.code) {
            let existing = &codes[index];
            if existing.category == entry.category {
                diagnostics.push(at(Diagnostic::warning(
                    CSP0303,
                    format!("Code '{}' is listed more than once in codelist '{}'", entry.code, name),
                )));
            } else {
                diagnostics.push(at(Diagnostic::error(
                    CSP0304,
                    format!(
                        "Code '{}' has conflicting categories {} and {} in codelist '{}'",
                        entry.code,
                        describe_category(existing.category.as_deref()),
                        describe_category(entry.category.as_deref()),
                        name
                    ),
                )));
            }
            continue;
        }

        if !is_well_formed(system, &entry.code) {
            malformed.push(entry.code.clone());
        }

        seen.insert(entry.code.clone(), codes.len());
        codes.push(ClinicalCode {
            code: entry.code,
            category: entry.category,
        });
    }

    if !malformed.is_empty() {
        let examples: Vec<_> = malformed.iter().take(MALFORMED_EXAMPLES).map(|c| format!("'{}'", c)).collect();
        diagnostics.push(
            Diagnostic::warning(
                CSP0308,
                format!(
                    "{} code(s) in codelist '{}' do not look like {} codes, e.g. {}",
                    malformed.len(),
                    name,
                    system,
                    examples.join(", ")
                ),
            )
            .with_help("Check that the declared system matches the codelist file"),
        );
    }

    if codes.is_empty() {
        diagnostics.push(Diagnostic::warning(
            CSP0307,
            format!("Codelist '{}' contains no codes", name),
        ));
    }

    CheckedCodelist {
        codelist: Codelist::new(name, system, codes),
        diagnostics,
    }
}

fn describe_category(category: Option<&str>) -> String {
    match category {
        Some(label) => format!("'{}'", label),
        None => "(none)".to_string(),
    }
}

fn row_info(file: &str, line: usize) -> RelatedInfo {
    RelatedInfo::new(format!("{} row {}", file, line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::parse_csv;
    use pretty_assertions::assert_eq;

    fn raw(code: &str, category: Option<&str>, line: usize) -> RawCode {
        RawCode {
            line: Some(line),
            code: code.to_string(),
            category: category.map(str::to_string),
        }
    }

    #[test]
    fn test_raw_codes_with_category() {
        let table = parse_csv("Code,Grouping_6\nXaJQv,1\nXaJQy,2\nXaJR0,\n", "eth.csv").unwrap();
        let mut diagnostics = Diagnostics::new();
        let codes = raw_codes_from_table(&table, "Code", Some("Grouping_6"), "eth.csv", &mut diagnostics).unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(codes[0], raw("XaJQv", Some("1"), 2));
        assert_eq!(codes[2], raw("XaJR0", None, 4));
    }

    #[test]
    fn test_missing_column() {
        let table = parse_csv("CTV3ID,Term\nG58..,HF\n", "hf.csv").unwrap();
        let err = raw_codes_from_table(&table, "code", None, "hf.csv", &mut Diagnostics::new()).unwrap_err();
        assert_eq!(err.code(), CSP0301);
        assert!(err.to_string().contains("CTV3ID, Term"));
    }

    #[test]
    fn test_short_row_is_reported() {
        let table = parse_csv("Term,CTV3ID\nHF,G58..\nshort\n", "hf.csv").unwrap();
        let mut diagnostics = Diagnostics::new();
        let codes = raw_codes_from_table(&table, "CTV3ID", None, "hf.csv", &mut diagnostics).unwrap();

        assert_eq!(codes.len(), 1);
        assert!(diagnostics.contains_code(CSP0306));
    }

    #[test]
    fn test_check_codes() {
        let checked = check_codes(
            "hf_codes",
            CodingSystem::Ctv3,
            vec![
                raw("G58..", None, 2),
                raw("", None, 3),
                raw("G58..", None, 4),
                raw("G580.", None, 5),
            ],
            "hf.csv",
            Diagnostics::new(),
        );

        assert_eq!(checked.codelist.len(), 2);
        assert_eq!(checked.diagnostics.error_count(), 1);
        assert!(checked.diagnostics.contains_code(CSP0302));
        assert!(checked.diagnostics.contains_code(CSP0303));
        let empty = checked.diagnostics.iter().find(|d| d.code == CSP0302).unwrap();
        assert_eq!(empty.related[0].message, "hf.csv row 3");
    }

    #[test]
    fn test_conflicting_category() {
        let checked = check_codes(
            "eth",
            CodingSystem::Ctv3,
            vec![raw("XaJQv", Some("1"), 2), raw("XaJQv", Some("2"), 3)],
            "eth.csv",
            Diagnostics::new(),
        );
        assert!(checked.diagnostics.contains_code(CSP0304));
        assert_eq!(checked.codelist.codes[0].category.as_deref(), Some("1"));
    }

    #[test]
    fn test_malformed_codes_summarised() {
        let checked = check_codes(
            "meds",
            CodingSystem::Dmd,
            vec![raw("ramipril", None, 2), raw("lisinopril", None, 3), raw("318135009", None, 4)],
            "meds.csv",
            Diagnostics::new(),
        );
        let warnings: Vec<_> = checked.diagnostics.iter().filter(|d| d.code == CSP0308).collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.starts_with("2 code(s)"));
        assert!(!checked.diagnostics.has_errors());
    }

    #[test]
    fn test_empty_codelist_warns() {
        let checked = check_codes("none", CodingSystem::Snomed, Vec::new(), "inline", Diagnostics::new());
        assert!(checked.codelist.is_empty());
        assert!(checked.diagnostics.contains_code(CSP0307));
    }
}
