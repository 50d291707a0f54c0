//! Loader configuration

use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Settings for one load
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    /// Directory relative codelist paths are resolved against first.
    /// `load_file` uses the document's directory when unset.
    pub base_dir: Option<PathBuf>,
    /// Extra directories searched for codelist files, after `base_dir`
    pub codelist_paths: Vec<PathBuf>,
    /// Date `today` resolves to. Defaults to the local date.
    pub today: Option<NaiveDate>,
    /// Treat warnings as errors
    pub strict: bool,
}

impl LoaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_codelist_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.codelist_paths.push(path.into());
        self
    }

    pub fn with_codelist_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.codelist_paths.extend(paths);
        self
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}
