//! Validate command implementation

use super::load::LoadOptions;
use super::output::{self, OutputFormat};
use crate::{Diagnostics, LoadOutcome, Loader, Severity};
use anyhow::{Context, Result, bail};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for validate command
pub struct ValidateConfig {
    pub files: Vec<PathBuf>,
    pub options: LoadOptions,
    pub verbose: bool,
    /// Machine-readable report instead of terminal output
    pub output_format: Option<OutputFormat>,
    pub output_file: Option<PathBuf>,
}

/// Validation result for a single file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: PathBuf,
    pub success: bool,
    pub diagnostics: Diagnostics,
}

impl FileReport {
    fn new(file: PathBuf, outcome: LoadOutcome) -> Self {
        Self {
            file,
            success: outcome.is_success(),
            diagnostics: outcome.diagnostics.sorted(),
        }
    }
}

/// Validate cohort specification files
pub async fn validate(config: ValidateConfig) -> Result<()> {
    if config.files.is_empty() {
        bail!("No files specified for validation");
    }

    let reports = check_files(&config.files, &config.options).await?;

    if let Some(format) = config.output_format {
        let rendered = match format {
            OutputFormat::Json => serde_json::to_string(&reports)?,
            OutputFormat::Pretty | OutputFormat::Table => serde_json::to_string_pretty(&reports)?,
        };
        output::write_output(&rendered, config.output_file.as_deref())?;
        if reports.iter().all(|report| report.success) {
            return Ok(());
        }
        bail!("Validation failed");
    }

    for report in &reports {
        print_report(report, config.verbose);
    }
    summarise(&reports, config.options.strict)
}

/// Load every file on the blocking pool, sharing one codelist cache
pub async fn check_files(files: &[PathBuf], options: &LoadOptions) -> Result<Vec<FileReport>> {
    let loader = Arc::new(Loader::new(options.loader_config()?));
    log::debug!("Validating {} file(s), strict: {}", files.len(), options.strict);

    let tasks = files.iter().cloned().map(|file| {
        let loader = Arc::clone(&loader);
        tokio::task::spawn_blocking(move || {
            let outcome = loader.load_file(&file);
            FileReport::new(file, outcome)
        })
    });

    let reports = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.context("Validation task failed"))
        .collect::<Result<Vec<_>>>()?;
    log::debug!("{} codelist file(s) read", loader.resolver().cached_files());
    Ok(reports)
}

fn summarise(reports: &[FileReport], strict: bool) -> Result<()> {
    let errors: usize = reports.iter().map(|r| r.diagnostics.error_count()).sum();
    let warnings: usize = reports.iter().map(|r| r.diagnostics.warning_count()).sum();

    println!();
    if errors == 0 && (warnings == 0 || !strict) {
        let mut message = format!("All {} file(s) validated successfully", reports.len());
        if warnings > 0 {
            message.push_str(&format!(" with {} warning(s)", warnings));
        }
        println!("{}", output::format_success(&message));
        return Ok(());
    }

    let mut summary = Vec::new();
    if errors > 0 {
        summary.push(format!("{} error(s)", errors).red().to_string());
    }
    if warnings > 0 {
        summary.push(format!("{} warning(s)", warnings).yellow().to_string());
    }
    if strict && errors == 0 {
        eprintln!("{}", "Strict mode: treating warnings as errors".yellow());
    }
    bail!("Validation failed: found {}", summary.join(", "))
}

/// Print validation result for a file
fn print_report(report: &FileReport, verbose: bool) {
    let status = if report.success {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("{} {}", status, report.file.display().to_string().cyan());

    let name = report.file.display().to_string();
    for diagnostic in &report.diagnostics {
        if verbose || diagnostic.severity <= Severity::Warning {
            println!("{}", output::indent(&diagnostic.render(&name), 2));
        }
    }
}
