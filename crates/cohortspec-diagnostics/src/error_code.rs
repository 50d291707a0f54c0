//! Diagnostic codes following a structured numbering system
//!
//! Error code ranges:
//! - CSP0001-CSP0099: Parse errors (JSON syntax, date and population expressions)
//! - CSP0100-CSP0199: Schema errors (fields, operators, parameters)
//! - CSP0200-CSP0299: Semantic errors (names, windows, expectations, references)
//! - CSP0300-CSP0399: Codelist errors (CSV files, columns, codes)
//! - CSP0400-CSP0499: System errors (I/O)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Error code identifier, serialized in its `CSPnnnn` form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ErrorCode(u16);

impl ErrorCode {
    /// Create a new error code
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Get the numeric code
    pub const fn code(&self) -> u16 {
        self.0
    }

    /// Get error information for this code
    pub fn info(&self) -> &'static ErrorInfo {
        ERROR_INFO.get(&self.0).unwrap_or(&UNKNOWN_ERROR)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CSP{:04}", self.0)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        code.to_string()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .strip_prefix("CSP")
            .filter(|digits| digits.len() == 4)
            .and_then(|digits| digits.parse().ok())
            .map(Self)
            .ok_or_else(|| format!("invalid diagnostic code '{}'", value))
    }
}

/// Information about an error code
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    /// Short description of the error
    pub description: &'static str,
    /// Detailed help text
    pub help: Option<&'static str>,
}

impl ErrorInfo {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            help: None,
        }
    }

    const fn with_help(mut self, help: &'static str) -> Self {
        self.help = Some(help);
        self
    }
}

static UNKNOWN_ERROR: ErrorInfo = ErrorInfo::new("Unknown error");

static ERROR_INFO: LazyLock<HashMap<u16, ErrorInfo>> = LazyLock::new(|| {
    let mut map = HashMap::new();

    // Parse errors (0001-0099)
    map.insert(1, ErrorInfo::new("Invalid JSON document"));
    map.insert(2, ErrorInfo::new("Unexpected end of input"));
    map.insert(3, ErrorInfo::new("Invalid date expression")
        .with_help("Use YYYY-MM-DD, 'today' or 'index_date', optionally with '+ 3 months'"));
    map.insert(4, ErrorInfo::new("Invalid population expression"));

    // Schema errors (0100-0199)
    map.insert(100, ErrorInfo::new("Missing required field"));
    map.insert(101, ErrorInfo::new("Invalid field type"));
    map.insert(102, ErrorInfo::new("Unknown operator"));
    map.insert(103, ErrorInfo::new("Unknown parameter"));
    map.insert(104, ErrorInfo::new("Conflicting parameters"));
    map.insert(105, ErrorInfo::new("Invalid returning value"));
    map.insert(106, ErrorInfo::new("Invalid date format")
        .with_help("Supported formats are YYYY, YYYY-MM and YYYY-MM-DD"));
    map.insert(107, ErrorInfo::new("Invalid expectation"));
    map.insert(108, ErrorInfo::new("Deprecated parameter"));
    map.insert(109, ErrorInfo::new("Invalid date window"));

    // Semantic errors (0200-0299)
    map.insert(200, ErrorInfo::new("Duplicate variable name"));
    map.insert(201, ErrorInfo::new("Invalid variable name")
        .with_help("Variable names must start with a letter or '_' and contain only letters, digits and '_'"));
    map.insert(202, ErrorInfo::new("Reserved variable name"));
    map.insert(203, ErrorInfo::new("Date window out of order"));
    map.insert(204, ErrorInfo::new("Undefined codelist"));
    map.insert(205, ErrorInfo::new("Undefined variable"));
    map.insert(206, ErrorInfo::new("Circular reference"));
    map.insert(207, ErrorInfo::new("Population is not boolean"));
    map.insert(208, ErrorInfo::new("Category ratios do not sum to 1"));
    map.insert(209, ErrorInfo::new("Incidence out of range"));
    map.insert(210, ErrorInfo::new("Expectation date bounds out of order"));
    map.insert(211, ErrorInfo::new("Invalid distribution parameters"));
    map.insert(212, ErrorInfo::new("Missing expectation for return type"));
    map.insert(213, ErrorInfo::new("Category codelist required"));
    map.insert(214, ErrorInfo::new("Unknown category label"));
    map.insert(215, ErrorInfo::new("Incompatible coding system"));
    map.insert(216, ErrorInfo::new("Duplicate codelist name"));
    map.insert(217, ErrorInfo::new("Unused codelist"));
    map.insert(218, ErrorInfo::new("Duplicate output column")
        .with_help("Rename the variable or drop the extra date column"));

    // Codelist errors (0300-0399)
    map.insert(300, ErrorInfo::new("Codelist file not found"));
    map.insert(301, ErrorInfo::new("Codelist column not found"));
    map.insert(302, ErrorInfo::new("Empty code value"));
    map.insert(303, ErrorInfo::new("Duplicate code"));
    map.insert(304, ErrorInfo::new("Conflicting category for code"));
    map.insert(305, ErrorInfo::new("Unknown coding system"));
    map.insert(306, ErrorInfo::new("Malformed CSV row"));
    map.insert(307, ErrorInfo::new("Empty codelist"));
    map.insert(308, ErrorInfo::new("Code does not match coding system format"));

    // System errors (0400-0499)
    map.insert(401, ErrorInfo::new("I/O error"));
    map.insert(404, ErrorInfo::new("File not found"));

    map
});

// Parse errors
pub const CSP0001: ErrorCode = ErrorCode::new(1);
pub const CSP0002: ErrorCode = ErrorCode::new(2);
pub const CSP0003: ErrorCode = ErrorCode::new(3);
pub const CSP0004: ErrorCode = ErrorCode::new(4);

// Schema errors
pub const CSP0100: ErrorCode = ErrorCode::new(100);
pub const CSP0101: ErrorCode = ErrorCode::new(101);
pub const CSP0102: ErrorCode = ErrorCode::new(102);
pub const CSP0103: ErrorCode = ErrorCode::new(103);
pub const CSP0104: ErrorCode = ErrorCode::new(104);
pub const CSP0105: ErrorCode = ErrorCode::new(105);
pub const CSP0106: ErrorCode = ErrorCode::new(106);
pub const CSP0107: ErrorCode = ErrorCode::new(107);
pub const CSP0108: ErrorCode = ErrorCode::new(108);
pub const CSP0109: ErrorCode = ErrorCode::new(109);

// Semantic errors
pub const CSP0200: ErrorCode = ErrorCode::new(200);
pub const CSP0201: ErrorCode = ErrorCode::new(201);
pub const CSP0202: ErrorCode = ErrorCode::new(202);
pub const CSP0203: ErrorCode = ErrorCode::new(203);
pub const CSP0204: ErrorCode = ErrorCode::new(204);
pub const CSP0205: ErrorCode = ErrorCode::new(205);
pub const CSP0206: ErrorCode = ErrorCode::new(206);
pub const CSP0207: ErrorCode = ErrorCode::new(207);
pub const CSP0208: ErrorCode = ErrorCode::new(208);
pub const CSP0209: ErrorCode = ErrorCode::new(209);
pub const CSP0210: ErrorCode = ErrorCode::new(210);
pub const CSP0211: ErrorCode = ErrorCode::new(211);
pub const CSP0212: ErrorCode = ErrorCode::new(212);
pub const CSP0213: ErrorCode = ErrorCode::new(213);
pub const CSP0214: ErrorCode = ErrorCode::new(214);
pub const CSP0215: ErrorCode = ErrorCode::new(215);
pub const CSP0216: ErrorCode = ErrorCode::new(216);
pub const CSP0217: ErrorCode = ErrorCode::new(217);
pub const CSP0218: ErrorCode = ErrorCode::new(218);

// Codelist errors
pub const CSP0300: ErrorCode = ErrorCode::new(300);
pub const CSP0301: ErrorCode = ErrorCode::new(301);
pub const CSP0302: ErrorCode = ErrorCode::new(302);
pub const CSP0303: ErrorCode = ErrorCode::new(303);
pub const CSP0304: ErrorCode = ErrorCode::new(304);
pub const CSP0305: ErrorCode = ErrorCode::new(305);
pub const CSP0306: ErrorCode = ErrorCode::new(306);
pub const CSP0307: ErrorCode = ErrorCode::new(307);
pub const CSP0308: ErrorCode = ErrorCode::new(308);

// System errors
pub const CSP0401: ErrorCode = ErrorCode::new(401);
pub const CSP0404: ErrorCode = ErrorCode::new(404);
