//! Date expression parser

use crate::combinators::{Input, PResult, calendar_date, identifier, to_parse_error, unsigned, ws};
use chrono::NaiveDate;
use cohortspec_diagnostics::{CSP0003, Result};
use cohortspec_model::{DateAnchor, DateExpr, Offset, PeriodUnit, Truncation};
use winnow::combinator::{alt, cut_err, delimited, opt, terminated};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;

/// Parse a date expression such as `index_date - 3 months`
pub fn parse_date_expr(source: &str) -> Result<DateExpr> {
    delimited(ws, date_expr, ws)
        .parse(source)
        .map_err(|e| to_parse_error(CSP0003, "date expression", source, e))
}

/// Parse a bare `YYYY-MM-DD` date
pub fn parse_calendar_date(source: &str) -> Result<NaiveDate> {
    terminated(calendar_date, ws)
        .parse(source)
        .map_err(|e| to_parse_error(CSP0003, "calendar date", source, e))
}

fn date_expr(input: &mut Input<'_>) -> PResult<DateExpr> {
    let (anchor, truncation) = base(input)?;
    ws(input)?;
    let offset = opt(offset).parse_next(input)?;
    Ok(DateExpr {
        anchor,
        truncation,
        offset,
    })
}

fn base(input: &mut Input<'_>) -> PResult<(DateAnchor, Option<Truncation>)> {
    alt((
        truncated.map(|(truncation, anchor)| (anchor, Some(truncation))),
        anchor.map(|anchor| (anchor, None)),
    ))
    .parse_next(input)
}

/// `first_day_of_month(index_date)`
fn truncated(input: &mut Input<'_>) -> PResult<(Truncation, DateAnchor)> {
    let truncation = identifier.verify_map(Truncation::from_name).parse_next(input)?;
    ws(input)?;
    let anchor = cut_err(delimited(('(', ws), anchor, (ws, ')')))
        .context(StrContext::Expected(StrContextValue::Description("(date)")))
        .parse_next(input)?;
    Ok((truncation, anchor))
}

fn anchor(input: &mut Input<'_>) -> PResult<DateAnchor> {
    alt((
        calendar_date.map(DateAnchor::Date),
        identifier.verify_map(|name: &str| match name {
            "index_date" => Some(DateAnchor::IndexDate),
            "today" => Some(DateAnchor::Today),
            _ => None,
        }),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "YYYY-MM-DD, index_date or today",
    )))
    .parse_next(input)
}

/// `+ 1 year`, `- 30 days`
fn offset(input: &mut Input<'_>) -> PResult<Offset> {
    let sign = alt(('+'.value(1), '-'.value(-1))).parse_next(input)?;
    ws(input)?;
    let amount = cut_err(unsigned)
        .context(StrContext::Expected(StrContextValue::Description("number of periods")))
        .parse_next(input)?;
    ws(input)?;
    let unit = cut_err(period_unit).parse_next(input)?;
    Ok(Offset::new(sign * amount, unit))
}

fn period_unit(input: &mut Input<'_>) -> PResult<PeriodUnit> {
    identifier
        .verify_map(|word: &str| match word {
            "day" | "days" => Some(PeriodUnit::Day),
            "month" | "months" => Some(PeriodUnit::Month),
            "year" | "years" => Some(PeriodUnit::Year),
            _ => None,
        })
        .context(StrContext::Expected(StrContextValue::Description("days, months or years")))
        .parse_next(input)
}
