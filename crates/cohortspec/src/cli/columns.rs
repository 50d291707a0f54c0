//! Columns command implementation

use super::load::{LoadOptions, load_study};
use super::output::{self, OutputFormat};
use crate::model::OutputColumn;
use anyhow::Result;
use std::path::PathBuf;
use tabled::Tabled;

/// Configuration for columns command
pub struct ColumnsConfig {
    pub file: PathBuf,
    pub options: LoadOptions,
    pub verbose: bool,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

#[derive(Debug, Tabled)]
pub struct ColumnRow {
    #[tabled(rename = "Column")]
    pub name: String,
    #[tabled(rename = "Type")]
    pub column_type: String,
    #[tabled(rename = "Variable")]
    pub variable: String,
}

impl From<&OutputColumn> for ColumnRow {
    fn from(column: &OutputColumn) -> Self {
        Self {
            name: column.name.clone(),
            column_type: column.column_type.to_string(),
            variable: column.variable.clone().unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// List the columns an extraction of the study would produce
pub async fn columns(config: ColumnsConfig) -> Result<()> {
    let study = load_study(&config.file, &config.options, config.verbose)?;
    let columns = study.columns();

    let rows = columns.iter().map(ColumnRow::from).collect();
    let rendered = output::render(&columns, rows, config.output_format)?;

    output::write_output(&rendered, config.output_file.as_deref())
}
