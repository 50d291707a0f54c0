//! Typed access to the members of a JSON object
//!
//! Every key read through [`Fields`] is remembered, so keys nobody asked for
//! can be reported once an object has been mapped.

use cohortspec_diagnostics::{CSP0100, CSP0101, CSP0103, CohortError, Diagnostic, Diagnostics};
use cohortspec_model::DateExpr;
use cohortspec_parser::parse_date_expr;
use serde_json::{Map, Value};

pub struct Fields<'a> {
    path: String,
    map: &'a Map<String, Value>,
    known: Vec<&'static str>,
}

impl<'a> Fields<'a> {
    pub fn new(path: impl Into<String>, map: &'a Map<String, Value>) -> Self {
        Self {
            path: path.into(),
            map,
            known: Vec::new(),
        }
    }

    /// Wrap `value`, reporting an error unless it is an object
    pub fn of(path: impl Into<String>, value: &'a Value, diagnostics: &mut Diagnostics) -> Option<Self> {
        let path = path.into();
        match value.as_object() {
            Some(map) => Some(Self::new(path, map)),
            None => {
                diagnostics.push(type_error(&path, "an object", value));
                None
            }
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path of a member of this object
    pub fn child(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", self.path, key)
        }
    }

    /// Whether `key` is present with a non-null value. Does not mark the key.
    pub fn has(&self, key: &str) -> bool {
        self.map.get(key).is_some_and(|v| !v.is_null())
    }

    /// Raw member. `null` counts as absent.
    pub fn get(&mut self, key: &'static str) -> Option<&'a Value> {
        self.known.push(key);
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub fn required(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<&'a Value> {
        let value = self.get(key);
        if value.is_none() {
            diagnostics.push(
                Diagnostic::error(CSP0100, format!("Missing required field '{}'", key)).at_path(self.path.clone()),
            );
        }
        value
    }

    pub fn string(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<&'a str> {
        let value = self.get(key)?;
        self.expect_str(key, value, diagnostics)
    }

    pub fn required_string(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<&'a str> {
        let value = self.required(key, diagnostics)?;
        self.expect_str(key, value, diagnostics)
    }

    fn expect_str(&self, key: &str, value: &'a Value, diagnostics: &mut Diagnostics) -> Option<&'a str> {
        let text = value.as_str();
        if text.is_none() {
            diagnostics.push(type_error(&self.child(key), "a string", value));
        }
        text
    }

    pub fn flag(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<bool> {
        let value = self.get(key)?;
        let flag = value.as_bool();
        if flag.is_none() {
            diagnostics.push(type_error(&self.child(key), "true or false", value));
        }
        flag
    }

    pub fn number(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<f64> {
        let value = self.get(key)?;
        let number = value.as_f64();
        if number.is_none() {
            diagnostics.push(type_error(&self.child(key), "a number", value));
        }
        number
    }

    pub fn unsigned(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<u32> {
        let value = self.get(key)?;
        let number = value.as_u64().and_then(|n| u32::try_from(n).ok());
        if number.is_none() {
            diagnostics.push(type_error(&self.child(key), "a non-negative whole number", value));
        }
        number
    }

    pub fn object(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<Fields<'a>> {
        let value = self.get(key)?;
        Fields::of(self.child(key), value, diagnostics)
    }

    pub fn date_expr(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<DateExpr> {
        let text = self.string(key, diagnostics)?;
        parse_date_at(text, &self.child(key), diagnostics)
    }

    pub fn required_date_expr(&mut self, key: &'static str, diagnostics: &mut Diagnostics) -> Option<DateExpr> {
        let text = self.required_string(key, diagnostics)?;
        parse_date_at(text, &self.child(key), diagnostics)
    }

    /// Warn about every member that was never read
    pub fn finish(self, diagnostics: &mut Diagnostics) {
        for key in self.map.keys() {
            if !self.known.contains(&key.as_str()) {
                diagnostics.push(
                    Diagnostic::warning(CSP0103, format!("Unknown parameter '{}' is ignored", key))
                        .at_path(self.child(key)),
                );
            }
        }
    }
}

/// Parse a date expression found at `path`
pub fn parse_date_at(text: &str, path: &str, diagnostics: &mut Diagnostics) -> Option<DateExpr> {
    match parse_date_expr(text) {
        Ok(expr) => Some(expr),
        Err(err) => {
            diagnostics.push(embedded_parse_error(&err, path));
            None
        }
    }
}

/// Diagnostic for an expression embedded in a JSON string. Locations inside
/// the string are meaningless in the document, so the path is used instead.
pub fn embedded_parse_error(err: &CohortError, path: &str) -> Diagnostic {
    let mut diagnostic = err.to_diagnostic().at_path(path);
    diagnostic.location = None;
    if diagnostic.help.is_none() {
        diagnostic.help = err.code().info().help.map(str::to_string);
    }
    diagnostic
}

pub fn type_error(path: &str, expected: &str, found: &Value) -> Diagnostic {
    Diagnostic::error(
        CSP0101,
        format!("Expected {}, found {}", expected, json_kind(found)),
    )
    .at_path(path)
}

pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
