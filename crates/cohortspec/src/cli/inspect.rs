//! Inspect command implementation

use super::load::{LoadOptions, load_study};
use super::output::{self, OutputFormat};
use crate::model::{DateWindow, Operator, VariableDefinition};
use anyhow::Result;
use std::path::PathBuf;
use tabled::Tabled;

/// Configuration for inspect command
pub struct InspectConfig {
    pub file: PathBuf,
    pub options: LoadOptions,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// One variable as shown in the table view
#[derive(Debug, Tabled)]
pub struct VariableRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Operator")]
    pub operator: &'static str,
    #[tabled(rename = "Returns")]
    pub returns: String,
    #[tabled(rename = "Codelist")]
    pub codelist: String,
    #[tabled(rename = "Window")]
    pub window: String,
}

impl VariableRow {
    pub fn new(variable: &VariableDefinition) -> Self {
        let returns = match &variable.operator {
            Operator::WithTheseMedications(query) | Operator::WithTheseClinicalEvents(query) => {
                query.returning.as_str().to_string()
            }
            operator => operator.return_type().to_string(),
        };
        Self {
            name: variable.name.clone(),
            operator: variable.operator.name(),
            returns,
            codelist: variable.operator.codelist().unwrap_or("-").to_string(),
            window: variable.operator.window().map_or_else(|| "-".to_string(), format_window),
        }
    }
}

/// Human-readable form of a date window
pub fn format_window(window: &DateWindow) -> String {
    match (&window.start, &window.end) {
        (Some(start), Some(end)) => format!("{} .. {}", start, end),
        (Some(start), None) => format!(">= {}", start),
        (None, Some(end)) => format!("<= {}", end),
        (None, None) => "any time".to_string(),
    }
}

/// Print the loaded study, as JSON or as a variable table
pub async fn inspect(config: InspectConfig) -> Result<()> {
    let study = load_study(&config.file, &config.options, config.verbose)?;

    let rows = std::iter::once(&study.population)
        .chain(study.variables.values())
        .map(VariableRow::new)
        .collect();
    let rendered = output::render(&study, rows, config.output_format)?;

    output::write_output(&rendered, config.output_file.as_deref())
}
