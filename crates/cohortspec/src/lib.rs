//! Cohort specification documents for Rust
//!
//! A cohort specification declares a research cohort and the per-subject
//! variables an extraction engine should derive for it. This crate bundles:
//! - the typed model of such documents
//! - parsers for the date and population expressions embedded in them
//! - codelist loading and checking
//! - a loader that validates a whole document and reports diagnostics
//!
//! # Example
//!
//! ```no_run
//! use cohortspec::{LoaderConfig, load_file};
//!
//! let outcome = load_file("analysis/study_definition.json", &LoaderConfig::default());
//! if let Some(study) = outcome.study {
//!     for column in study.columns() {
//!         println!("{} ({})", column.name, column.column_type);
//!     }
//! }
//! ```

// Re-export all public APIs from internal crates
pub use cohortspec_codelist as codelist;
pub use cohortspec_diagnostics as diagnostics;
pub use cohortspec_loader as loader;
pub use cohortspec_model as model;
pub use cohortspec_parser as parser;

// Convenience re-exports
pub use cohortspec_diagnostics::{CohortError, Diagnostic, Diagnostics, Result, Severity};
pub use cohortspec_loader::{LoadOutcome, Loader, LoaderConfig, load_file, load_str};
pub use cohortspec_model::{StudyDefinition, VariableDefinition};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
