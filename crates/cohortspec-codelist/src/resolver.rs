//! Codelist resolution: file lookup, caching and checking

use crate::codes::{CheckedCodelist, RawCode, check_codes, raw_codes_from_table};
use crate::csv::{CsvTable, parse_csv};
use cohortspec_diagnostics::{CSP0300, CSP0401, CohortError, Diagnostics, Result};
use cohortspec_model::{CodelistDeclaration, CodelistSource};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment variable holding extra codelist directories, in the
/// platform's `PATH` syntax
pub const CODELIST_PATH_ENV: &str = "COHORTSPEC_CODELIST_PATH";

/// Resolves codelist declarations to checked codelists.
///
/// CSV paths are tried relative to the document directory first, then each
/// search path in order. Parsed files are cached by canonical path, so a file
/// shared by several codelists or documents is read once.
pub struct CodelistResolver {
    search_paths: Vec<PathBuf>,
    cache: Arc<RwLock<HashMap<PathBuf, Arc<CsvTable>>>>,
}

impl CodelistResolver {
    /// Create a resolver with explicit search paths followed by the
    /// directories listed in `COHORTSPEC_CODELIST_PATH`
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        let mut paths = search_paths;
        if let Some(env_paths) = std::env::var_os(CODELIST_PATH_ENV) {
            paths.extend(std::env::split_paths(&env_paths).filter(|path| !path.as_os_str().is_empty()));
            log::debug!("Codelist search paths: {:?}", paths);
        }
        Self::with_paths(paths)
    }

    /// Create a resolver that ignores the environment
    pub fn with_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Resolve a declaration. Missing files, missing columns and unreadable
    /// files are errors; problems with individual codes are returned as
    /// diagnostics alongside the codelist.
    pub fn resolve(&self, declaration: &CodelistDeclaration, base_dir: Option<&Path>) -> Result<CheckedCodelist> {
        match &declaration.source {
            CodelistSource::Inline { codes } => {
                let raw = codes
                    .iter()
                    .map(|code| RawCode {
                        line: None,
                        code: code.trim().to_string(),
                        category: None,
                    })
                    .collect();
                Ok(check_codes(
                    &declaration.name,
                    declaration.system,
                    raw,
                    "inline codes",
                    Diagnostics::new(),
                ))
            }
            CodelistSource::Csv {
                path,
                column,
                category_column,
            } => {
                let file = self.locate(path, base_dir).ok_or_else(|| {
                    CohortError::codelist(
                        CSP0300,
                        format!(
                            "Codelist file '{}' for '{}' not found",
                            path.display(),
                            declaration.name
                        ),
                    )
                })?;
                let table = self.load_table(&file)?;
                let display = file.display().to_string();

                let mut diagnostics = Diagnostics::new();
                let raw = raw_codes_from_table(
                    &table,
                    column,
                    category_column.as_deref(),
                    &display,
                    &mut diagnostics,
                )?;
                let checked = check_codes(&declaration.name, declaration.system, raw, &display, diagnostics);
                log::debug!(
                    "Resolved codelist {} ({} codes) from {}",
                    declaration.name,
                    checked.codelist.len(),
                    display
                );
                Ok(checked)
            }
        }
    }

    /// Find a codelist file
    pub fn locate(&self, path: &Path, base_dir: Option<&Path>) -> Option<PathBuf> {
        if path.is_absolute() {
            return path.is_file().then(|| path.to_path_buf());
        }

        base_dir
            .into_iter()
            .chain(self.search_paths.iter().map(PathBuf::as_path))
            .map(|dir| dir.join(path))
            .find(|candidate| candidate.is_file())
    }

    fn load_table(&self, path: &Path) -> Result<Arc<CsvTable>> {
        let canonical = path.canonicalize().map_err(|e| {
            CohortError::codelist(CSP0300, format!("Failed to resolve path {}: {}", path.display(), e))
        })?;

        {
            let cache = self.cache.read();
            if let Some(table) = cache.get(&canonical) {
                log::trace!("Codelist cache hit: {}", canonical.display());
                return Ok(Arc::clone(table));
            }
        }

        let content = fs::read_to_string(&canonical).map_err(|e| {
            CohortError::system(CSP0401, format!("Failed to read {}: {}", canonical.display(), e))
        })?;
        let table = Arc::new(parse_csv(&content, &path.display().to_string())?);

        {
            let mut cache = self.cache.write();
            cache.insert(canonical, Arc::clone(&table));
        }

        Ok(table)
    }

    /// Number of files currently cached
    pub fn cached_files(&self) -> usize {
        self.cache.read().len()
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        cache.clear();
    }

    /// Get the search paths
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }
}

impl Default for CodelistResolver {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cohortspec_model::CodingSystem;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_resolve_relative_to_base_dir() {
        let temp_dir = TempDir::new().unwrap();
        write_csv(temp_dir.path(), "hf.csv", "CTV3ID\nG58..\nG580.\n");

        let resolver = CodelistResolver::with_paths(Vec::new());
        let decl = CodelistDeclaration::csv("hf_codes", CodingSystem::Ctv3, "hf.csv", "CTV3ID");
        let checked = resolver.resolve(&decl, Some(temp_dir.path())).unwrap();

        assert_eq!(checked.codelist.len(), 2);
        assert!(checked.diagnostics.is_empty());
    }

    #[test]
    fn test_resolve_from_search_path() {
        let temp_dir = TempDir::new().unwrap();
        write_csv(temp_dir.path(), "hf.csv", "CTV3ID\nG58..\n");

        let resolver = CodelistResolver::with_paths(vec![temp_dir.path().to_path_buf()]);
        let decl = CodelistDeclaration::csv("hf_codes", CodingSystem::Ctv3, "hf.csv", "CTV3ID");
        assert!(resolver.resolve(&decl, None).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let resolver = CodelistResolver::with_paths(Vec::new());
        let decl = CodelistDeclaration::csv("hf_codes", CodingSystem::Ctv3, "missing.csv", "CTV3ID");
        let err = resolver.resolve(&decl, None).unwrap_err();
        assert_eq!(err.code(), CSP0300);
    }

    #[test]
    fn test_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_csv(temp_dir.path(), "hf.csv", "CTV3ID\nG58..\n");

        let resolver = CodelistResolver::with_paths(Vec::new());
        let decl = CodelistDeclaration::csv("hf_codes", CodingSystem::Ctv3, "hf.csv", "CTV3ID");

        // First load
        let first = resolver.resolve(&decl, Some(temp_dir.path())).unwrap();
        assert_eq!(resolver.cached_files(), 1);

        // Modify file
        write_csv(temp_dir.path(), "hf.csv", "CTV3ID\nG58..\nG580.\n");

        // Second load should return cached content
        let second = resolver.resolve(&decl, Some(temp_dir.path())).unwrap();
        assert_eq!(first.codelist, second.codelist);

        // Clear cache
        resolver.clear_cache();

        // Third load should get new content
        let third = resolver.resolve(&decl, Some(temp_dir.path())).unwrap();
        assert_eq!(third.codelist.len(), 2);
        assert!(path.exists());
    }

    #[test]
    fn test_inline_codes() {
        let resolver = CodelistResolver::with_paths(Vec::new());
        let decl = CodelistDeclaration::inline("creatinine_codes", CodingSystem::Ctv3, ["XE2q5", " XE2q5 "]);
        let checked = resolver.resolve(&decl, None).unwrap();

        assert_eq!(checked.codelist.len(), 1);
        assert_eq!(checked.diagnostics.warning_count(), 1);
        assert_eq!(resolver.cached_files(), 0);
    }
}
