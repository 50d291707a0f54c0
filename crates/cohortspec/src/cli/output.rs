//! Output formatting utilities

use anyhow::{Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Compact JSON
    Json,
    /// Indented JSON
    #[default]
    Pretty,
    /// Human-readable table
    Table,
}

/// When to colour terminal output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Set up color output based on user preference
pub fn setup_colors(mode: ColorMode) {
    let enabled = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal(),
    };
    colored::control::set_override(enabled);
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error) -> String {
    format!("{} {:#}", "Error:".red().bold(), error)
}

/// Format a success message for display
pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Indent every line of a multi-line block
pub fn indent(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    text.lines().map(|line| format!("{}{}", pad, line)).collect::<Vec<_>>().join("\n")
}

/// Render `value` as JSON, or `rows` as a table
pub fn render<T: Serialize, R: Tabled>(value: &T, rows: Vec<R>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(value).context("Failed to serialize JSON"),
        OutputFormat::Pretty => serde_json::to_string_pretty(value).context("Failed to serialize JSON"),
        OutputFormat::Table if rows.is_empty() => Ok("(empty)".to_string()),
        OutputFormat::Table => Ok(Table::new(rows).with(Style::modern()).to_string()),
    }
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file =
            File::create(path).with_context(|| format!("Failed to create output file: {}", path.display()))?;
        writeln!(file, "{}", content).with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!("{}", format_success(&format!("Output written to {}", path.display())));
    } else {
        println!("{}", content);
    }
    Ok(())
}
