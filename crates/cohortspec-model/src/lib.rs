//! Cohort specification data model
//!
//! This crate defines the typed representation of a cohort specification
//! document: the index date, default expectations, population predicate and
//! the named variable definitions, each bound to one operator from a fixed
//! extraction vocabulary.

mod codelist;
mod date;
mod expectations;
mod expression;
mod study;
mod variable;

pub use codelist::*;
pub use date::*;
pub use expectations::*;
pub use expression::*;
pub use study::*;
pub use variable::*;
