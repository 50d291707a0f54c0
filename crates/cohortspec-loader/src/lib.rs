//! Loader and validator for cohort specification documents
//!
//! Loading runs in three stages:
//! 1. JSON text to a loosely typed document (syntax errors carry line and column)
//! 2. schema mapping of every member onto the typed model, including codelist
//!    resolution
//! 3. semantic checks across members: names, references, windows, expectations
//!
//! Problems are collected rather than returned on first failure, so one run
//! reports everything wrong with a document.
//!
//! ```no_run
//! use cohortspec_loader::{LoaderConfig, load_file};
//!
//! let outcome = load_file("study_definition.json", &LoaderConfig::default());
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{}", diagnostic);
//! }
//! ```

mod config;
mod fields;
mod loader;
mod raw;
mod schema;
mod validate;

pub use config::LoaderConfig;
pub use loader::{LoadOutcome, Loader, load_file, load_str};
