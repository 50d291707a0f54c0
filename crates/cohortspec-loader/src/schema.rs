//! Second loading stage: mapping JSON members onto the typed model
//!
//! Each function reports what it finds into the shared diagnostics and
//! returns `None` when the element cannot be built.

use crate::fields::{Fields, embedded_parse_error, parse_date_at, type_error};
use cohortspec_diagnostics::{
    CSP0100, CSP0101, CSP0102, CSP0104, CSP0105, CSP0106, CSP0107, CSP0108, CSP0109, CSP0305,
    Diagnostic, Diagnostics,
};
use cohortspec_model::{
    AgeAsOf, CategoryExpectation, CodelistDeclaration, CodingSystem, DateExpectation, DateExpr,
    DateFormat, DateWindow, Distribution, EventQuery, Expectations, MatchPolicy, MeanRecordedValue,
    MostRecentBmi, Operator, Rate, Returning, Satisfying, VariableDefinition,
};
use cohortspec_parser::parse_population_expr;
use serde::de::DeserializeOwned;
use serde_json::Value;

const RETURN_EXPECTATIONS: &str = "return_expectations";
const POPULATION: &str = "population";

/// Map one variable definition
pub fn parse_variable(name: &str, path: &str, value: &Value, diagnostics: &mut Diagnostics) -> Option<VariableDefinition> {
    let errors_before = diagnostics.error_count();
    let mut fields = Fields::of(path, value, diagnostics)?;

    let operator_name = fields.required_string("operator", diagnostics)?;
    let operator = parse_operator(operator_name, &mut fields, diagnostics);

    let return_expectations = fields
        .get(RETURN_EXPECTATIONS)
        .and_then(|value| parse_expectations(&fields.child(RETURN_EXPECTATIONS), value, diagnostics));

    if operator.is_some() {
        fields.finish(diagnostics);
    }

    let operator = operator?;
    if diagnostics.error_count() > errors_before {
        return None;
    }

    Some(VariableDefinition {
        name: name.to_string(),
        operator,
        return_expectations,
    })
}

fn parse_operator(name: &str, fields: &mut Fields<'_>, diagnostics: &mut Diagnostics) -> Option<Operator> {
    match name {
        "age_as_of" => {
            let reference_date = fields.required_date_expr("reference_date", diagnostics)?;
            Some(Operator::AgeAsOf(AgeAsOf { reference_date }))
        }
        "most_recent_bmi" => {
            let window = parse_window(fields, diagnostics)?;
            let minimum_age_at_measurement = fields
                .unsigned("minimum_age_at_measurement", diagnostics)
                .unwrap_or(MostRecentBmi::DEFAULT_MINIMUM_AGE);
            let include_measurement_date = fields.flag("include_measurement_date", diagnostics).unwrap_or(false);
            let date_format = parse_date_format(fields, diagnostics);
            Some(Operator::MostRecentBmi(MostRecentBmi {
                window,
                minimum_age_at_measurement,
                include_measurement_date,
                date_format,
            }))
        }
        "mean_recorded_value" => {
            let codelist = fields.required_string("codelist", diagnostics);
            let on_most_recent_day = match fields.required("on_most_recent_day_of_measurement", diagnostics) {
                Some(Value::Bool(true)) => Some(true),
                Some(other) => {
                    diagnostics.push(
                        type_error(&fields.child("on_most_recent_day_of_measurement"), "true", other)
                            .with_help("Only the mean of the most recent day of measurement is supported"),
                    );
                    None
                }
                None => None,
            };
            let window = parse_window(fields, diagnostics);
            let include_measurement_date = fields.flag("include_measurement_date", diagnostics).unwrap_or(false);
            let date_format = parse_date_format(fields, diagnostics);
            Some(Operator::MeanRecordedValue(MeanRecordedValue {
                codelist: codelist?.to_string(),
                on_most_recent_day_of_measurement: on_most_recent_day?,
                window: window?,
                include_measurement_date,
                date_format,
            }))
        }
        "with_these_medications" => parse_event_query(fields, false, diagnostics).map(Operator::WithTheseMedications),
        "with_these_clinical_events" => {
            parse_event_query(fields, true, diagnostics).map(Operator::WithTheseClinicalEvents)
        }
        "satisfying" => {
            let text = fields.required_string("expression", diagnostics)?;
            match parse_population_expr(text) {
                Ok(expression) => Some(Operator::Satisfying(Satisfying { expression })),
                Err(err) => {
                    diagnostics.push(embedded_parse_error(&err, &fields.child("expression")));
                    None
                }
            }
        }
        other => {
            diagnostics.push(
                Diagnostic::error(CSP0102, format!("Unknown operator '{}'", other))
                    .at_path(fields.child("operator"))
                    .with_help(format!("Supported operators: {}", Operator::NAMES.join(", "))),
            );
            None
        }
    }
}

/// Shared parameters of the medication and clinical-event operators.
/// `clinical` enables the returning values only events can provide.
fn parse_event_query(fields: &mut Fields<'_>, clinical: bool, diagnostics: &mut Diagnostics) -> Option<EventQuery> {
    let errors_before = diagnostics.error_count();

    let codelist = fields.required_string("codelist", diagnostics);
    let window = parse_window(fields, diagnostics);

    let mut returning = fields.string("returning", diagnostics).and_then(|text| {
        match text.parse::<Returning>() {
            Ok(returning) => Some(returning),
            Err(message) => {
                diagnostics.push(
                    Diagnostic::error(CSP0105, message)
                        .at_path(fields.child("returning"))
                        .with_help(format!("Expected one of: {}", returning_names(clinical))),
                );
                None
            }
        }
    });

    let mut find_first = fields.flag("find_first_match_in_period", diagnostics).unwrap_or(false);
    let mut find_last = fields.flag("find_last_match_in_period", diagnostics).unwrap_or(false);

    for (legacy, first) in [("return_first_date_in_period", true), ("return_last_date_in_period", false)] {
        if fields.flag(legacy, diagnostics) != Some(true) {
            continue;
        }
        let replacement = if first { "find_first_match_in_period" } else { "find_last_match_in_period" };
        diagnostics.push(
            Diagnostic::hint(CSP0108, format!("'{}' is deprecated", legacy))
                .at_path(fields.child(legacy))
                .with_help(format!("Use \"returning\": \"date\" with \"{}\": true", replacement)),
        );
        match returning {
            Some(Returning::Date) | None => returning = Some(Returning::Date),
            Some(other) => diagnostics.push(
                Diagnostic::error(
                    CSP0104,
                    format!("'{}' returns a date but returning is '{}'", legacy, other),
                )
                .at_path(fields.path().to_string()),
            ),
        }
        if first {
            find_first = true;
        } else {
            find_last = true;
        }
    }

    if find_first && find_last {
        diagnostics.push(
            Diagnostic::error(CSP0104, "Cannot find both the first and the last match in the period")
                .at_path(fields.path().to_string()),
        );
    }
    let match_policy = match (find_first, find_last) {
        (true, false) => MatchPolicy::FirstMatch,
        (false, true) => MatchPolicy::LastMatch,
        _ => MatchPolicy::Any,
    };

    let returning = returning.unwrap_or_default();
    if !clinical && matches!(returning, Returning::NumericValue | Returning::Category) {
        diagnostics.push(
            Diagnostic::error(
                CSP0105,
                format!("with_these_medications cannot return '{}'", returning),
            )
            .at_path(fields.child("returning"))
            .with_help(format!("Expected one of: {}", returning_names(false))),
        );
    }

    let include_date_of_match = fields.flag("include_date_of_match", diagnostics).unwrap_or(false);
    let date_format = parse_date_format(fields, diagnostics);

    if diagnostics.error_count() > errors_before {
        return None;
    }

    Some(EventQuery {
        codelist: codelist?.to_string(),
        window: window?,
        returning,
        match_policy,
        include_date_of_match,
        date_format,
    })
}

fn returning_names(clinical: bool) -> String {
    Returning::ALL
        .iter()
        .filter(|r| clinical || !matches!(r, Returning::NumericValue | Returning::Category))
        .map(Returning::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `between`, `on_or_before` or `on_or_after`; at most one of them
fn parse_window(fields: &mut Fields<'_>, diagnostics: &mut Diagnostics) -> Option<DateWindow> {
    let between = fields.get("between");
    let on_or_before = fields.get("on_or_before");
    let on_or_after = fields.get("on_or_after");

    let given: Vec<_> = [
        ("between", between.is_some()),
        ("on_or_before", on_or_before.is_some()),
        ("on_or_after", on_or_after.is_some()),
    ]
    .into_iter()
    .filter_map(|(key, present)| present.then_some(key))
    .collect();
    if given.len() > 1 {
        diagnostics.push(
            Diagnostic::error(CSP0104, format!("Only one date window may be given, found {}", given.join(" and ")))
                .at_path(fields.path().to_string()),
        );
        return None;
    }

    if let Some(value) = between {
        let path = fields.child("between");
        let bounds = match value.as_array().map(Vec::as_slice) {
            Some([start, end]) => Some((start, end)),
            _ => None,
        };
        let Some((start, end)) = bounds else {
            diagnostics.push(
                Diagnostic::error(CSP0109, "'between' must be a list of two dates")
                    .at_path(path)
                    .with_help("e.g. \"between\": [\"2010-01-01\", \"index_date\"]"),
            );
            return None;
        };
        let start = date_in_list(start, &format!("{}[0]", path), diagnostics);
        let end = date_in_list(end, &format!("{}[1]", path), diagnostics);
        return Some(DateWindow::between(start?, end?));
    }
    if on_or_before.is_some() {
        return fields.date_expr("on_or_before", diagnostics).map(DateWindow::on_or_before);
    }
    if on_or_after.is_some() {
        return fields.date_expr("on_or_after", diagnostics).map(DateWindow::on_or_after);
    }
    Some(DateWindow::unbounded())
}

fn date_in_list(value: &Value, path: &str, diagnostics: &mut Diagnostics) -> Option<DateExpr> {
    match value.as_str() {
        Some(text) => parse_date_at(text, path, diagnostics),
        None => {
            diagnostics.push(type_error(path, "a date string", value));
            None
        }
    }
}

/// `date_format`, or the legacy `include_day` / `include_month` flags
fn parse_date_format(fields: &mut Fields<'_>, diagnostics: &mut Diagnostics) -> Option<DateFormat> {
    let explicit = fields.string("date_format", diagnostics).and_then(|text| match text.parse::<DateFormat>() {
        Ok(format) => Some(format),
        Err(message) => {
            diagnostics.push(
                Diagnostic::error(CSP0106, message)
                    .at_path(fields.child("date_format"))
                    .with_help("Supported formats are YYYY, YYYY-MM and YYYY-MM-DD"),
            );
            None
        }
    });

    let mut legacy = None;
    for (key, format) in [("include_month", DateFormat::Month), ("include_day", DateFormat::Day)] {
        if fields.flag(key, diagnostics) == Some(true) {
            diagnostics.push(
                Diagnostic::hint(CSP0108, format!("'{}' is deprecated", key))
                    .at_path(fields.child(key))
                    .with_help(format!("Use \"date_format\": \"{}\"", format)),
            );
            legacy = Some(legacy.map_or(format, |current: DateFormat| current.max(format)));
        }
    }

    match (explicit, legacy) {
        (Some(explicit), Some(legacy)) if explicit != legacy => {
            diagnostics.push(
                Diagnostic::error(
                    CSP0104,
                    format!("date_format '{}' conflicts with the legacy flag for '{}'", explicit, legacy),
                )
                .at_path(fields.child("date_format")),
            );
            Some(explicit)
        }
        (explicit, legacy) => explicit.or(legacy),
    }
}

/// Map an expectation spec (`default_expectations` or `return_expectations`)
pub fn parse_expectations(path: &str, value: &Value, diagnostics: &mut Diagnostics) -> Option<Expectations> {
    let mut fields = Fields::of(path, value, diagnostics)?;

    let date = fields.object("date", diagnostics).map(|mut date| {
        let expectation = DateExpectation {
            earliest: date.date_expr("earliest", diagnostics),
            latest: date.date_expr("latest", diagnostics),
        };
        date.finish(diagnostics);
        expectation
    });
    let rate = typed::<Rate>(&mut fields, "rate", diagnostics);
    let incidence = fields.number("incidence", diagnostics);
    let float = typed::<Distribution>(&mut fields, "float", diagnostics);
    let int = typed::<Distribution>(&mut fields, "int", diagnostics);
    let category = typed::<CategoryExpectation>(&mut fields, "category", diagnostics);
    let bool = fields.flag("bool", diagnostics);
    fields.finish(diagnostics);

    Some(Expectations {
        date,
        rate,
        incidence,
        float,
        int,
        category,
        bool,
    })
}

/// Deserialize a member whose shape serde already describes
fn typed<T: DeserializeOwned>(fields: &mut Fields<'_>, key: &'static str, diagnostics: &mut Diagnostics) -> Option<T> {
    let value = fields.get(key)?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            diagnostics.push(Diagnostic::error(CSP0107, format!("Invalid '{}' expectation: {}", key, err)).at_path(fields.child(key)));
            None
        }
    }
}

/// Map one codelist declaration
pub fn parse_codelist(name: &str, path: &str, value: &Value, diagnostics: &mut Diagnostics) -> Option<CodelistDeclaration> {
    let errors_before = diagnostics.error_count();
    let mut fields = Fields::of(path, value, diagnostics)?;

    let system = fields.required_string("system", diagnostics).and_then(|text| {
        match text.parse::<CodingSystem>() {
            Ok(system) => Some(system),
            Err(err) => {
                diagnostics.push(
                    Diagnostic::error(CSP0305, format!("Codelist '{}' uses an {}", name, err))
                        .at_path(fields.child("system"))
                        .with_help(format!(
                            "Supported systems: {}",
                            CodingSystem::ALL.map(|s| s.as_str()).join(", ")
                        )),
                );
                None
            }
        }
    });

    let csv = fields.string("csv", diagnostics);
    let codes = fields.get("codes");
    let declaration = match (csv, codes) {
        (Some(_), Some(_)) => {
            diagnostics.push(
                Diagnostic::error(CSP0104, "A codelist takes either 'csv' or 'codes', not both").at_path(path),
            );
            None
        }
        (Some(file), None) => {
            let column = fields.required_string("column", diagnostics);
            let category_column = fields.string("category_column", diagnostics);
            match (system, column) {
                (Some(system), Some(column)) => {
                    let declaration = CodelistDeclaration::csv(name, system, file, column);
                    Some(match category_column {
                        Some(category) => declaration.with_category_column(category),
                        None => declaration,
                    })
                }
                _ => None,
            }
        }
        (None, Some(value)) => {
            let codes = inline_codes(value, &fields.child("codes"), diagnostics);
            match (system, codes) {
                (Some(system), Some(codes)) => Some(CodelistDeclaration::inline(name, system, codes)),
                _ => None,
            }
        }
        (None, None) => {
            if !fields.has("csv") {
                diagnostics.push(
                    Diagnostic::error(CSP0100, "Missing required field 'csv' or 'codes'").at_path(path),
                );
            }
            None
        }
    };
    fields.finish(diagnostics);

    if diagnostics.error_count() > errors_before {
        return None;
    }
    declaration
}

fn inline_codes(value: &Value, path: &str, diagnostics: &mut Diagnostics) -> Option<Vec<String>> {
    let Some(items) = value.as_array() else {
        diagnostics.push(type_error(path, "a list of codes", value));
        return None;
    };

    let mut codes = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(code) => codes.push(code.to_string()),
            None => diagnostics.push(type_error(&format!("{}[{}]", path, index), "a string", item)),
        }
    }
    (codes.len() == items.len()).then_some(codes)
}

/// Map the population. A bare string is shorthand for a `satisfying`
/// expression.
pub fn parse_population(value: &Value, diagnostics: &mut Diagnostics) -> Option<VariableDefinition> {
    let Some(text) = value.as_str() else {
        return parse_variable(POPULATION, POPULATION, value, diagnostics);
    };
    match parse_population_expr(text) {
        Ok(expression) => Some(VariableDefinition::new(POPULATION, Operator::Satisfying(Satisfying { expression }))),
        Err(err) => {
            diagnostics.push(embedded_parse_error(&err, POPULATION));
            None
        }
    }
}

/// Map the document's `index_date`
pub fn parse_index_date(value: Option<&Value>, diagnostics: &mut Diagnostics) -> Option<chrono::NaiveDate> {
    let Some(value) = value else {
        diagnostics.push(Diagnostic::error(CSP0100, "Missing required field 'index_date'"));
        return None;
    };
    let Some(text) = value.as_str() else {
        diagnostics.push(type_error("index_date", "a YYYY-MM-DD date", value));
        return None;
    };
    match cohortspec_parser::parse_calendar_date(text) {
        Ok(date) => Some(date),
        Err(err) => {
            diagnostics.push(
                embedded_parse_error(&err, "index_date").with_help("The index date must be a calendar date (YYYY-MM-DD)"),
            );
            None
        }
    }
}
