//! Diagnostic and error types

use crate::{ErrorCode, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - the document cannot be handed to the extraction engine
    Error,
    /// Warning - likely mistake, the document is still usable
    Warning,
    /// Information - informational message
    Info,
    /// Hint - suggestion for improvement
    Hint,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
            Severity::Hint => write!(f, "hint"),
        }
    }
}

/// A diagnostic message with location and context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity level
    pub severity: Severity,
    /// Error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Dotted path of the offending element, e.g. `variables.bmi.between`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Source location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Additional context or help
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Related information
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related: Vec<RelatedInfo>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            path: None,
            location: None,
            help: None,
            related: Vec::new(),
        }
    }

    /// Create a new error diagnostic
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Create a new warning diagnostic
    pub fn warning(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    /// Create a new hint diagnostic
    pub fn hint(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Hint, code, message)
    }

    /// Set the document path
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Set help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Add related information
    pub fn with_related(mut self, info: RelatedInfo) -> Self {
        self.related.push(info);
        self
    }

    /// Whether this diagnostic blocks the document from being used
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Render the diagnostic for a terminal, prefixed with the file name
    #[cfg(feature = "colored")]
    pub fn render(&self, file: &str) -> String {
        use colored::Colorize;

        let level = match self.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
            Severity::Hint => "hint".cyan().bold(),
        };

        let mut out = format!("{}[{}]: {}", level, self.code, self.message);
        match (&self.location, &self.path) {
            (Some(loc), _) => out.push_str(&format!("\n  --> {}:{}", file.cyan(), loc)),
            (None, Some(path)) => out.push_str(&format!("\n  --> {} ({})", file.cyan(), path)),
            (None, None) => out.push_str(&format!("\n  --> {}", file.cyan())),
        }
        if let Some(help) = &self.help {
            out.push_str(&format!("\n  {} {}", "help:".green(), help));
        }
        for related in &self.related {
            out.push_str(&format!("\n  {} {}", "note:".dimmed(), related.message));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.severity, self.code, self.message)?;
        if let Some(path) = &self.path {
            write!(f, " in {}", path)?;
        }
        if let Some(loc) = &self.location {
            write!(f, " at {}", loc)?;
        }
        Ok(())
    }
}

/// Pointer to where a diagnostic originates outside the document, such as a
/// codelist row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInfo {
    pub message: String,
}

impl RelatedInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Ordered collection of diagnostics produced while loading one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.0.extend(diagnostics);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    fn count(&self, severity: Severity) -> usize {
        self.0.iter().filter(|d| d.severity == severity).count()
    }

    /// Check whether any diagnostic carries the given code
    pub fn contains_code(&self, code: ErrorCode) -> bool {
        self.0.iter().any(|d| d.code == code)
    }

    /// Sort by severity, keeping discovery order within a severity
    pub fn sorted(mut self) -> Self {
        self.0.sort_by_key(|d| d.severity);
        self
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self(diagnostics)
    }
}

/// Failure of a single parse, read or codelist step. The loader turns these
/// into [`Diagnostic`]s; nothing below it fails a whole load.
#[derive(Debug, Clone, Error)]
pub enum CohortError {
    /// Malformed JSON, date or population expression
    #[error("{code}: {message}")]
    Parse {
        code: ErrorCode,
        message: String,
        /// Text being parsed
        input: String,
        location: SourceLocation,
    },

    /// Unusable codelist file
    #[error("{code}: {message}")]
    Codelist {
        code: ErrorCode,
        message: String,
        file: Option<String>,
        /// 1-based CSV row
        row: Option<usize>,
    },

    /// I/O failure
    #[error("{code}: {message}")]
    System { code: ErrorCode, message: String },
}

impl CohortError {
    pub fn parse_at(
        code: ErrorCode,
        message: impl Into<String>,
        input: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::Parse {
            code,
            message: message.into(),
            input: input.into(),
            location,
        }
    }

    pub fn codelist(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Codelist {
            code,
            message: message.into(),
            file: None,
            row: None,
        }
    }

    /// Codelist error pointing at a row of `file`
    pub fn codelist_at(code: ErrorCode, message: impl Into<String>, file: impl Into<String>, row: usize) -> Self {
        Self::Codelist {
            code,
            message: message.into(),
            file: Some(file.into()),
            row: Some(row),
        }
    }

    pub fn system(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::System {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { code, .. } | Self::Codelist { code, .. } | Self::System { code, .. } => *code,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Parse { location, .. } => Some(*location),
            _ => None,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::Parse { code, message, input, location } => {
                let diag = Diagnostic::error(*code, message.clone()).with_location(*location);
                // Multi-line inputs are whole documents; quoting them adds nothing
                if input.is_empty() || input.contains('\n') {
                    diag
                } else {
                    diag.with_related(RelatedInfo::new(format!("while parsing '{}'", input)))
                }
            }
            Self::Codelist { code, message, file, row } => {
                let diag = Diagnostic::error(*code, message.clone());
                match (file, row) {
                    (Some(file), Some(row)) => diag.with_related(RelatedInfo::new(format!("{} row {}", file, row))),
                    (Some(file), None) => diag.with_related(RelatedInfo::new(file.clone())),
                    _ => diag,
                }
            }
            Self::System { code, message } => Diagnostic::error(*code, message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CSP0001, CSP0003, CSP0103, CSP0200, CSP0302, CSP0401};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_error_diagnostic() {
        let err = CohortError::parse_at(CSP0003, "Invalid calendar date", "2020-13-01", SourceLocation::new(1, 6, 5));
        assert_eq!(err.code(), CSP0003);
        assert_eq!(err.location().map(|loc| loc.column), Some(6));

        let diag = err.to_diagnostic();
        assert_eq!(diag.location, err.location());
        assert_eq!(diag.related[0].message, "while parsing '2020-13-01'");
    }

    #[test]
    fn test_system_error_diagnostic() {
        let diag = CohortError::system(CSP0401, "Failed to read hf.csv").to_diagnostic();
        assert!(diag.is_error());
        assert_eq!(diag.code, CSP0401);
        assert!(diag.related.is_empty());
    }

    #[test]
    fn test_diagnostic_display() {
        let diag = Diagnostic::error(CSP0001, "expected value")
            .with_location(SourceLocation::new(3, 5, 20));

        assert!(diag.to_string().contains("CSP0001"));
        assert!(diag.to_string().contains("3:5"));
    }

    #[test]
    fn test_codelist_error_related_row() {
        let diag = CohortError::codelist_at(CSP0302, "empty code", "codelists/hf.csv", 4).to_diagnostic();
        assert_eq!(diag.related.len(), 1);
        assert_eq!(diag.related[0].message, "codelists/hf.csv row 4");
    }

    #[test]
    fn test_diagnostics_counts_and_sorting() {
        let mut diags = Diagnostics::new();
        diags.push(Diagnostic::hint(CSP0103, "hint"));
        diags.push(Diagnostic::warning(CSP0103, "warn"));
        diags.push(Diagnostic::error(CSP0200, "err"));

        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 1);

        let severities: Vec<_> = diags.sorted().iter().map(|d| d.severity).collect();
        assert_eq!(severities, vec![Severity::Error, Severity::Warning, Severity::Hint]);
    }
}
