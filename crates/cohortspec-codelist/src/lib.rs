//! Codelist loading for cohort specifications
//!
//! Codelists come from CSV reference files (one code column, optionally a
//! category column) or are listed inline in the document. Every codelist is
//! checked for empty, repeated and malformed codes before it is handed to the
//! loader.

mod codes;
mod csv;
mod format;
mod resolver;

pub use codes::{CheckedCodelist, RawCode, check_codes, raw_codes_from_table};
pub use csv::{CsvRecord, CsvTable, parse_csv};
pub use format::{code_pattern, is_well_formed};
pub use resolver::{CODELIST_PATH_ENV, CodelistResolver};
