//! Codelists command implementation

use super::load::{LoadOptions, load_study};
use super::output::{self, OutputFormat};
use crate::StudyDefinition;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

/// Configuration for codelists command
pub struct CodelistsConfig {
    pub file: PathBuf,
    pub options: LoadOptions,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Summary of one loaded codelist
#[derive(Debug, Serialize, Tabled)]
pub struct CodelistSummary {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "System")]
    pub system: String,
    #[tabled(rename = "Codes")]
    pub codes: usize,
    #[tabled(rename = "Categories")]
    #[tabled(display_with = "display_list")]
    pub categories: Vec<String>,
    #[tabled(rename = "Used by")]
    #[tabled(display_with = "display_list")]
    pub used_by: Vec<String>,
}

fn display_list(items: &[String]) -> String {
    if items.is_empty() { "-".to_string() } else { items.join(", ") }
}

/// Summarise every codelist with the variables that reference it
pub fn summarise(study: &StudyDefinition) -> Vec<CodelistSummary> {
    let variables: Vec<_> = std::iter::once(&study.population).chain(study.variables.values()).collect();

    study
        .codelists
        .values()
        .map(|codelist| CodelistSummary {
            name: codelist.name.clone(),
            system: codelist.system.as_str().to_string(),
            codes: codelist.len(),
            categories: codelist.categories().into_iter().map(str::to_string).collect(),
            used_by: variables
                .iter()
                .filter(|variable| variable.operator.codelist() == Some(codelist.name.as_str()))
                .map(|variable| variable.name.clone())
                .collect(),
        })
        .collect()
}

/// List the codelists a study loaded
pub async fn codelists(config: CodelistsConfig) -> Result<()> {
    let study = load_study(&config.file, &config.options, config.verbose)?;
    let summaries = summarise(&study);

    let rendered = output::render(&summaries, summaries.iter().collect(), config.output_format)?;

    output::write_output(&rendered, config.output_file.as_deref())
}
