//! Parsers for the small expression languages embedded in cohort documents
//!
//! Documents are JSON, but two kinds of string values carry their own
//! grammar:
//! - date expressions (`2020-01-01`, `today`, `index_date - 1 year`,
//!   `first_day_of_month(index_date)`)
//! - `satisfying` expressions (`hf AND NOT (dialysis OR age < 18)`)
//!
//! Both are parsed with winnow using recursive descent.

mod combinators;
mod date;
mod expression;

pub use combinators::is_identifier;
pub use date::{parse_calendar_date, parse_date_expr};
pub use expression::parse_population_expr;
