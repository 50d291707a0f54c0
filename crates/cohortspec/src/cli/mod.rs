//! CLI functionality for the cohortspec tool
//!
//! - validation of one or more documents
//! - inspection of a loaded study, its output columns and its codelists
//! - output formatting

pub mod codelists;
pub mod columns;
pub mod inspect;
pub mod load;
pub mod output;
pub mod validate;
