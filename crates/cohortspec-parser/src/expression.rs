//! Population expression parser using recursive descent with precedence climbing
//!
//! Precedence, lowest first: `OR`, `AND`, `NOT`, comparison.

use crate::combinators::{Input, PResult, identifier, is_keyword, keyword, number, to_parse_error, ws};
use cohortspec_diagnostics::{CSP0004, Result};
use cohortspec_model::{CompareOp, Literal, PopulationExpr};
use winnow::combinator::{alt, cut_err, delimited, opt, preceded};
use winnow::error::{StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::take_till;

/// Parse the expression of a `satisfying` definition
pub fn parse_population_expr(source: &str) -> Result<PopulationExpr> {
    delimited(ws, or_expression, ws)
        .parse(source)
        .map_err(|e| to_parse_error(CSP0004, "population expression", source, e))
}

fn or_expression(input: &mut Input<'_>) -> PResult<PopulationExpr> {
    let mut left = and_expression(input)?;

    loop {
        let checkpoint = *input;
        ws(input)?;
        if opt(keyword("or")).parse_next(input)?.is_some() {
            ws(input)?;
            let right = cut_err(and_expression).parse_next(input)?;
            left = PopulationExpr::or(left, right);
        } else {
            *input = checkpoint;
            break;
        }
    }

    Ok(left)
}

fn and_expression(input: &mut Input<'_>) -> PResult<PopulationExpr> {
    let mut left = not_expression(input)?;

    loop {
        let checkpoint = *input;
        ws(input)?;
        if opt(keyword("and")).parse_next(input)?.is_some() {
            ws(input)?;
            let right = cut_err(not_expression).parse_next(input)?;
            left = PopulationExpr::and(left, right);
        } else {
            *input = checkpoint;
            break;
        }
    }

    Ok(left)
}

fn not_expression(input: &mut Input<'_>) -> PResult<PopulationExpr> {
    if opt(keyword("not")).parse_next(input)?.is_some() {
        ws(input)?;
        let operand = cut_err(not_expression).parse_next(input)?;
        return Ok(PopulationExpr::not(operand));
    }
    primary(input)
}

fn primary(input: &mut Input<'_>) -> PResult<PopulationExpr> {
    alt((
        preceded(('(', ws), cut_err((or_expression, ws, ')')))
            .map(|(expr, _, _)| expr),
        comparison,
        variable_name.map(PopulationExpr::variable),
    ))
    .context(StrContext::Expected(StrContextValue::Description(
        "variable, comparison or parenthesised expression",
    )))
    .parse_next(input)
}

fn comparison(input: &mut Input<'_>) -> PResult<PopulationExpr> {
    let variable = variable_name(input)?;
    ws(input)?;
    let op = compare_op(input)?;
    ws(input)?;
    let value = cut_err(literal)
        .context(StrContext::Expected(StrContextValue::Description("number or quoted string")))
        .parse_next(input)?;
    Ok(PopulationExpr::compare(variable, op, value))
}

fn variable_name<'a>(input: &mut Input<'a>) -> PResult<&'a str> {
    identifier.verify(|word: &str| !is_keyword(word)).parse_next(input)
}

fn compare_op(input: &mut Input<'_>) -> PResult<CompareOp> {
    alt((
        ">=".value(CompareOp::GtEq),
        "<=".value(CompareOp::LtEq),
        "!=".value(CompareOp::NotEq),
        "==".value(CompareOp::Eq),
        "=".value(CompareOp::Eq),
        ">".value(CompareOp::Gt),
        "<".value(CompareOp::Lt),
    ))
    .parse_next(input)
}

fn literal(input: &mut Input<'_>) -> PResult<Literal> {
    alt((
        number.map(Literal::Number),
        delimited('\'', take_till(0.., '\''), '\'').map(|s: &str| Literal::String(s.to_string())),
        delimited('"', take_till(0.., '"'), '"').map(|s: &str| Literal::String(s.to_string())),
    ))
    .parse_next(input)
}
