//! First loading stage: JSON text to a loosely typed document

use cohortspec_diagnostics::{CSP0001, CSP0002, CSP0101, Diagnostic, SourceLocation};
use indexmap::IndexMap;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::Value;
use serde_json::error::Category;
use std::fmt;

/// Members of a JSON object in document order, repeated keys kept
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entries(pub Vec<(String, Value)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// The document as written
#[derive(Debug, Deserialize)]
pub struct RawDocument {
    pub index_date: Option<Value>,
    pub default_expectations: Option<Value>,
    pub population: Option<Value>,
    #[serde(default)]
    pub codelists: Option<Entries>,
    #[serde(default)]
    pub variables: Option<Entries>,
    /// Top-level members this format does not define
    #[serde(flatten)]
    pub unknown: IndexMap<String, Value>,
}

impl RawDocument {
    pub fn parse(source: &str) -> Result<Self, Diagnostic> {
        serde_json::from_str(source).map_err(|err| json_error(&err, source))
    }
}

/// Diagnostic for a serde_json failure, located in `source`
pub fn json_error(err: &serde_json::Error, source: &str) -> Diagnostic {
    let code = match err.classify() {
        Category::Eof => CSP0002,
        Category::Data => CSP0101,
        Category::Syntax | Category::Io => CSP0001,
    };
    let diagnostic = Diagnostic::error(code, err.to_string());
    if err.line() == 0 {
        diagnostic
    } else {
        diagnostic.with_location(SourceLocation::at_line_col(source, err.line(), err.column().max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_repeated_variable_names_kept() {
        let doc = RawDocument::parse(
            r#"{
                "index_date": "2020-01-01",
                "variables": {
                    "age": {"operator": "age_as_of", "reference_date": "index_date"},
                    "age": {"operator": "age_as_of", "reference_date": "today"}
                }
            }"#,
        )
        .unwrap();

        let names: Vec<_> = doc.variables.unwrap().0.into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["age", "age"]);
    }

    #[test]
    fn test_unknown_top_level_members() {
        let doc = RawDocument::parse(r#"{"index_date": "2020-01-01", "indx_date": "2020-01-01"}"#).unwrap();
        assert_eq!(doc.unknown.keys().collect::<Vec<_>>(), vec!["indx_date"]);
        assert!(doc.population.is_none());
    }

    #[test]
    fn test_syntax_error_location() {
        let source = "{\n  \"index_date\": \"2020-01-01\",\n  \"population\": {,}\n}";
        let diag = RawDocument::parse(source).unwrap_err();
        assert_eq!(diag.code, CSP0001);
        assert_eq!(diag.location.unwrap().line, 3);
    }

    #[test]
    fn test_truncated_document() {
        let diag = RawDocument::parse("{\"index_date\": ").unwrap_err();
        assert_eq!(diag.code, CSP0002);
    }

    #[test]
    fn test_wrong_shape() {
        let diag = RawDocument::parse(r#"{"variables": []}"#).unwrap_err();
        assert_eq!(diag.code, CSP0101);
    }
}
