//! Loading orchestration: JSON text, schema mapping, codelist resolution and
//! semantic checks

use crate::config::LoaderConfig;
use crate::raw::{Entries, RawDocument};
use crate::schema::{parse_codelist, parse_expectations, parse_index_date, parse_population, parse_variable};
use crate::validate::{Validator, check_variable_name};
use cohortspec_codelist::CodelistResolver;
use cohortspec_diagnostics::{CSP0100, CSP0103, CSP0216, CSP0401, CSP0404, Diagnostic, Diagnostics};
use cohortspec_model::{Codelist, DateContext, Expectations, StudyDefinition, VariableDefinition};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Result of loading one document
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    /// The study, present when loading produced no errors (and, in strict
    /// mode, no warnings)
    pub study: Option<StudyDefinition>,
    /// Everything found, in discovery order
    pub diagnostics: Diagnostics,
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        self.study.is_some()
    }
}

/// Loads documents with one configuration and a shared codelist cache
pub struct Loader {
    config: LoaderConfig,
    resolver: Arc<CodelistResolver>,
}

impl Loader {
    pub fn new(config: LoaderConfig) -> Self {
        let resolver = Arc::new(CodelistResolver::new(config.codelist_paths.clone()));
        Self { config, resolver }
    }

    /// Share a resolver, and so its cache, between loaders
    pub fn with_resolver(config: LoaderConfig, resolver: Arc<CodelistResolver>) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn resolver(&self) -> &Arc<CodelistResolver> {
        &self.resolver
    }

    pub fn load_str(&self, source: &str) -> LoadOutcome {
        self.load_with_base(source, self.config.base_dir())
    }

    /// Load a document from disk. Relative codelist paths resolve against the
    /// document's directory unless the configuration names a base directory.
    pub fn load_file(&self, path: &Path) -> LoadOutcome {
        log::debug!("Loading {}", path.display());
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                let code = if err.kind() == io::ErrorKind::NotFound { CSP0404 } else { CSP0401 };
                let mut diagnostics = Diagnostics::new();
                diagnostics.push(Diagnostic::error(code, format!("Cannot read {}: {}", path.display(), err)));
                return LoadOutcome {
                    study: None,
                    diagnostics,
                };
            }
        };

        let base_dir = self.config.base_dir.clone().unwrap_or_else(|| document_dir(path));
        self.load_with_base(&source, Some(&base_dir))
    }

    fn load_with_base(&self, source: &str, base_dir: Option<&Path>) -> LoadOutcome {
        let mut diagnostics = Diagnostics::new();
        let study = self.build(source, base_dir, &mut diagnostics);

        let rejected = diagnostics.has_errors() || (self.config.strict && diagnostics.warning_count() > 0);
        log::debug!(
            "Loaded document: {} error(s), {} warning(s){}",
            diagnostics.error_count(),
            diagnostics.warning_count(),
            if rejected { ", rejected" } else { "" }
        );

        LoadOutcome {
            study: if rejected { None } else { study },
            diagnostics,
        }
    }

    fn build(&self, source: &str, base_dir: Option<&Path>, diagnostics: &mut Diagnostics) -> Option<StudyDefinition> {
        let raw = match RawDocument::parse(source) {
            Ok(raw) => raw,
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                return None;
            }
        };

        for key in raw.unknown.keys() {
            diagnostics.push(
                Diagnostic::warning(CSP0103, format!("Unknown member '{}' is ignored", key))
                    .at_path(key.clone())
                    .with_help("Top-level members are index_date, default_expectations, population, variables and codelists"),
            );
        }

        let index_date = parse_index_date(raw.index_date.as_ref(), diagnostics);
        let default_expectations = raw
            .default_expectations
            .as_ref()
            .and_then(|value| parse_expectations("default_expectations", value, diagnostics))
            .unwrap_or_default();

        let (codelists, declared_codelists) = self.load_codelists(raw.codelists.as_ref(), base_dir, diagnostics);
        let (variables, declared_variables) = load_variables(raw.variables.as_ref(), diagnostics);

        let population = match &raw.population {
            Some(value) => parse_population(value, diagnostics),
            None => {
                diagnostics.push(Diagnostic::error(CSP0100, "Missing required field 'population'"));
                None
            }
        };

        let context = index_date.map(|index_date| DateContext {
            index_date,
            today: self.config.today(),
        });
        Validator::new(
            context,
            &default_expectations,
            &variables,
            &declared_variables,
            &codelists,
            &declared_codelists,
        )
        .run(population.as_ref(), diagnostics);

        Some(StudyDefinition {
            index_date: index_date?,
            default_expectations,
            population: population?,
            variables,
            codelists,
        })
    }

    fn load_codelists(
        &self,
        entries: Option<&Entries>,
        base_dir: Option<&Path>,
        diagnostics: &mut Diagnostics,
    ) -> (IndexMap<String, Codelist>, HashSet<String>) {
        let mut codelists = IndexMap::new();
        let mut declared = HashSet::new();

        for (name, value) in entries.into_iter().flat_map(|entries| &entries.0) {
            let path = format!("codelists.{}", name);
            if !declared.insert(name.clone()) {
                diagnostics.push(
                    Diagnostic::error(CSP0216, format!("Codelist '{}' is declared more than once", name))
                        .at_path(path),
                );
                continue;
            }

            let Some(declaration) = parse_codelist(name, &path, value, diagnostics) else {
                continue;
            };
            match self.resolver.resolve(&declaration, base_dir) {
                Ok(checked) => {
                    log::debug!("Codelist '{}': {} code(s)", name, checked.codelist.len());
                    diagnostics.extend(checked.diagnostics.into_iter().map(|d| with_default_path(d, &path)));
                    codelists.insert(name.clone(), checked.codelist);
                }
                Err(err) => {
                    diagnostics.push(with_default_path(err.to_diagnostic(), &path));
                }
            }
        }

        (codelists, declared)
    }
}

fn load_variables(
    entries: Option<&Entries>,
    diagnostics: &mut Diagnostics,
) -> (IndexMap<String, VariableDefinition>, HashSet<String>) {
    let mut variables = IndexMap::new();
    let mut declared = HashSet::new();

    for (name, value) in entries.into_iter().flat_map(|entries| &entries.0) {
        let valid = check_variable_name(name, &declared, diagnostics);
        declared.insert(name.clone());
        if !valid {
            continue;
        }
        if let Some(definition) = parse_variable(name, &format!("variables.{}", name), value, diagnostics) {
            variables.insert(name.clone(), definition);
        }
    }

    (variables, declared)
}

fn with_default_path(mut diagnostic: Diagnostic, path: &str) -> Diagnostic {
    if diagnostic.path.is_none() {
        diagnostic.path = Some(path.to_string());
    }
    diagnostic
}

fn document_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Load a document held in memory
pub fn load_str(source: &str, config: &LoaderConfig) -> LoadOutcome {
    Loader::new(config.clone()).load_str(source)
}

/// Load a document from disk
pub fn load_file(path: impl AsRef<Path>, config: &LoaderConfig) -> LoadOutcome {
    Loader::new(config.clone()).load_file(path.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cohortspec_diagnostics::{CSP0001, CSP0200, CSP0217};
    use pretty_assertions::assert_eq;

    fn config() -> LoaderConfig {
        LoaderConfig::new().with_today(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap())
    }

    fn loader() -> Loader {
        Loader::with_resolver(config(), Arc::new(CodelistResolver::with_paths(Vec::new())))
    }

    const MINIMAL: &str = r#"{
        "index_date": "2020-12-16",
        "population": {"operator": "with_these_clinical_events", "codelist": "hf_codes"},
        "codelists": {"hf_codes": {"codes": ["G58..", "G580."], "system": "ctv3"}},
        "variables": {
            "age": {"operator": "age_as_of", "reference_date": "index_date",
                    "return_expectations": {"int": {"distribution": "population_ages"}}}
        }
    }"#;

    #[test]
    fn test_minimal_document() {
        let outcome = loader().load_str(MINIMAL);
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);

        let study = outcome.study.unwrap();
        assert_eq!(study.index_date, NaiveDate::from_ymd_opt(2020, 12, 16).unwrap());
        assert_eq!(study.variables.keys().collect::<Vec<_>>(), vec!["age"]);
        assert_eq!(study.codelist("hf_codes").unwrap().len(), 2);
    }

    #[test]
    fn test_strict_rejects_warnings() {
        let source = MINIMAL.replace("\"index_date\": \"2020-12-16\",", "\"index_date\": \"2020-12-16\", \"indx\": 1,");
        let outcome = loader().load_str(&source);
        assert!(outcome.is_success());
        assert!(outcome.diagnostics.contains_code(CSP0103));

        let strict = Loader::with_resolver(config().strict(true), Arc::new(CodelistResolver::with_paths(Vec::new())));
        assert!(!strict.load_str(&source).is_success());
    }

    #[test]
    fn test_missing_members() {
        let outcome = loader().load_str("{}");
        assert!(outcome.study.is_none());
        let messages: Vec<_> = outcome.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["Missing required field 'index_date'", "Missing required field 'population'"]
        );
    }

    #[test]
    fn test_syntax_error_stops_loading() {
        let outcome = loader().load_str("{\"index_date\": \"2020-12-16\",}");
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics.iter().next().unwrap().code, CSP0001);
    }

    #[test]
    fn test_duplicate_variable_keeps_first() {
        let source = MINIMAL.replace(
            "\"variables\": {",
            "\"variables\": {\"age\": {\"operator\": \"age_as_of\", \"reference_date\": \"today\"},",
        );
        let outcome = loader().load_str(&source);
        assert!(outcome.diagnostics.contains_code(CSP0200));
        assert!(outcome.study.is_none());
    }

    #[test]
    fn test_unused_codelist_warning() {
        let source = MINIMAL.replace(
            "\"codelists\": {",
            "\"codelists\": {\"spare\": {\"codes\": [\"XE2q5\"], \"system\": \"ctv3\"},",
        );
        let outcome = loader().load_str(&source);
        assert!(outcome.is_success());
        let diag = outcome.diagnostics.iter().find(|d| d.code == CSP0217).unwrap();
        assert_eq!(diag.path.as_deref(), Some("codelists.spare"));
    }

    #[test]
    fn test_unreadable_file() {
        let outcome = loader().load_file(Path::new("does/not/exist.json"));
        assert_eq!(outcome.diagnostics.iter().next().unwrap().code, CSP0404);
    }

    #[test]
    fn test_document_dir() {
        assert_eq!(document_dir(Path::new("study.json")), PathBuf::from("."));
        assert_eq!(document_dir(Path::new("analysis/study.json")), PathBuf::from("analysis"));
    }
}
