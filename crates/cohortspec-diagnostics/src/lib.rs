//! Cohort specification diagnostics and error handling
//!
//! This crate provides the error handling infrastructure shared by the loader,
//! parser and codelist crates: numbered error codes, document locations and
//! diagnostic reporting.

mod error;
mod error_code;
mod location;

pub use error::*;
pub use error_code::*;
pub use location::*;

/// Result type for cohort specification operations
pub type Result<T> = std::result::Result<T, CohortError>;
