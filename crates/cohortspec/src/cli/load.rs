//! Shared document loading for the inspection commands

use crate::{LoaderConfig, StudyDefinition, load_file};
use anyhow::{Context, Result, bail};
use cohortspec_diagnostics::Severity;
use std::path::{Path, PathBuf};

/// Loader settings common to every command
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub codelist_paths: Vec<PathBuf>,
    /// Date `today` resolves to, as YYYY-MM-DD
    pub today: Option<String>,
    pub strict: bool,
}

impl LoadOptions {
    pub fn loader_config(&self) -> Result<LoaderConfig> {
        let mut config = LoaderConfig::new()
            .with_codelist_paths(self.codelist_paths.iter().cloned())
            .strict(self.strict);
        if let Some(today) = &self.today {
            let date = cohortspec_parser::parse_calendar_date(today)
                .with_context(|| format!("Invalid --today value '{}'", today))?;
            config = config.with_today(date);
        }
        Ok(config)
    }
}

/// Load a study for inspection. Diagnostics go to stderr; the study is only
/// returned when it loaded cleanly.
pub fn load_study(file: &Path, options: &LoadOptions, verbose: bool) -> Result<StudyDefinition> {
    let config = options.loader_config()?;
    if verbose {
        eprintln!("Loading: {}", file.display());
    }

    let outcome = load_file(file, &config);
    let name = file.display().to_string();
    for diagnostic in &outcome.diagnostics {
        if verbose || diagnostic.severity <= Severity::Warning {
            eprintln!("{}", diagnostic.render(&name));
        }
    }

    match outcome.study {
        Some(study) => {
            log::debug!(
                "{}: {} variable(s), {} codelist(s), {} column(s)",
                name,
                study.variables.len(),
                study.codelists.len(),
                study.columns().len()
            );
            Ok(study)
        }
        None => bail!(
            "{} could not be loaded ({} error(s), {} warning(s))",
            name,
            outcome.diagnostics.error_count(),
            outcome.diagnostics.warning_count()
        ),
    }
}
