//! Common parser combinators

use chrono::NaiveDate;
use cohortspec_diagnostics::{CohortError, ErrorCode, SourceLocation};
use winnow::ascii::{digit1, multispace0};
use winnow::combinator::{eof, opt, terminated};
use winnow::error::{ContextError, ParseError, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

pub type Input<'a> = &'a str;
pub type PResult<O> = ModalResult<O>;

/// Words with a meaning in population expressions
const KEYWORDS: [&str; 3] = ["and", "or", "not"];

/// Skip optional whitespace
pub fn ws(input: &mut Input<'_>) -> PResult<()> {
    multispace0.void().parse_next(input)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn identifier<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .context(StrContext::Label("identifier"))
        .parse_next(input)
}

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

/// Case-insensitive keyword that is not a prefix of a longer identifier
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&mut Input<'a>) -> PResult<()> {
    move |input: &mut Input<'a>| {
        identifier
            .verify(|word: &str| word.eq_ignore_ascii_case(kw))
            .void()
            .context(StrContext::Expected(StrContextValue::StringLiteral(kw)))
            .parse_next(input)
    }
}

/// A non-negative integer
pub fn unsigned(input: &mut Input<'_>) -> PResult<i32> {
    digit1.try_map(str::parse::<i32>).parse_next(input)
}

/// A decimal number with optional sign and fraction
pub fn number(input: &mut Input<'_>) -> PResult<f64> {
    (opt('-'), digit1, opt(('.', digit1)))
        .take()
        .try_map(str::parse::<f64>)
        .context(StrContext::Label("number"))
        .parse_next(input)
}

fn fixed_digits<'a>(count: usize) -> impl FnMut(&mut Input<'a>) -> PResult<u32> {
    move |input: &mut Input<'a>| {
        take_while(count, |c: char| c.is_ascii_digit())
            .try_map(str::parse::<u32>)
            .parse_next(input)
    }
}

/// ISO calendar date `YYYY-MM-DD`, rejecting impossible dates such as `2021-02-30`
pub fn calendar_date(input: &mut Input<'_>) -> PResult<NaiveDate> {
    (fixed_digits(4), '-', fixed_digits(2), '-', fixed_digits(2))
        .verify_map(|(year, _, month, _, day)| {
            i32::try_from(year)
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
        })
        .context(StrContext::Label("calendar date"))
        .context(StrContext::Expected(StrContextValue::Description("YYYY-MM-DD")))
        .parse_next(input)
}

/// Check whether `name` is usable as a variable or codelist name
pub fn is_identifier(name: &str) -> bool {
    terminated(identifier, eof)
        .parse(name)
        .is_ok_and(|word| !is_keyword(word))
}

/// Convert a winnow parse failure into a located parse error
pub fn to_parse_error(
    code: ErrorCode,
    what: &str,
    source: &str,
    error: ParseError<Input<'_>, ContextError>,
) -> CohortError {
    let offset = error.offset();
    let detail = error.inner().to_string();
    let message = if detail.is_empty() {
        format!("Invalid {} at column {}", what, offset + 1)
    } else {
        format!("Invalid {} at column {}: {}", what, offset + 1, detail.replace('\n', "; "))
    };
    CohortError::parse_at(
        code,
        message,
        source,
        SourceLocation::at_offset(source, offset),
    )
}
