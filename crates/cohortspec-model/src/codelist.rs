//! Codelists and codelist declarations

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Clinical terminology a codelist is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodingSystem {
    /// Clinical Terms Version 3 (Read v3)
    Ctv3,
    /// Read codes version 2
    Readv2,
    /// SNOMED CT
    Snomed,
    /// NHS Dictionary of medicines and devices
    Dmd,
    /// ICD-10 diagnoses
    Icd10,
    /// OPCS-4 procedures
    Opcs4,
}

impl CodingSystem {
    pub const ALL: [CodingSystem; 6] = [
        CodingSystem::Ctv3,
        CodingSystem::Readv2,
        CodingSystem::Snomed,
        CodingSystem::Dmd,
        CodingSystem::Icd10,
        CodingSystem::Opcs4,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CodingSystem::Ctv3 => "ctv3",
            CodingSystem::Readv2 => "readv2",
            CodingSystem::Snomed => "snomed",
            CodingSystem::Dmd => "dmd",
            CodingSystem::Icd10 => "icd10",
            CodingSystem::Opcs4 => "opcs4",
        }
    }
}

impl fmt::Display for CodingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognised coding system tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCodingSystem(pub String);

impl fmt::Display for UnknownCodingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown coding system '{}'", self.0)
    }
}

impl std::error::Error for UnknownCodingSystem {}

impl FromStr for CodingSystem {
    type Err = UnknownCodingSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        CodingSystem::ALL
            .into_iter()
            .find(|system| system.as_str() == lowered)
            .ok_or_else(|| UnknownCodingSystem(s.to_string()))
    }
}

/// Where the codes of a declared codelist come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodelistSource {
    /// A CSV reference file with a header row
    Csv {
        path: PathBuf,
        column: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        category_column: Option<String>,
    },
    /// Codes listed directly in the document
    Inline { codes: Vec<String> },
}

/// A codelist as declared in the document, before its codes are read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodelistDeclaration {
    pub name: String,
    pub system: CodingSystem,
    pub source: CodelistSource,
}

impl CodelistDeclaration {
    pub fn csv(name: impl Into<String>, system: CodingSystem, path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system,
            source: CodelistSource::Csv {
                path: path.into(),
                column: column.into(),
                category_column: None,
            },
        }
    }

    pub fn inline<S: Into<String>>(name: impl Into<String>, system: CodingSystem, codes: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            system,
            source: CodelistSource::Inline {
                codes: codes.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn with_category_column(mut self, category: impl Into<String>) -> Self {
        if let CodelistSource::Csv { category_column, .. } = &mut self.source {
            *category_column = Some(category.into());
        }
        self
    }

    pub fn declares_categories(&self) -> bool {
        matches!(
            &self.source,
            CodelistSource::Csv {
                category_column: Some(_),
                ..
            }
        )
    }
}

/// One code of a codelist
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ClinicalCode {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ClinicalCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A resolved, immutable codelist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Codelist {
    pub name: String,
    pub system: CodingSystem,
    pub codes: Vec<ClinicalCode>,
}

impl Codelist {
    pub fn new(name: impl Into<String>, system: CodingSystem, codes: Vec<ClinicalCode>) -> Self {
        Self {
            name: name.into(),
            system,
            codes,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.code == code)
    }

    /// Whether every code carries a category label
    pub fn is_categorised(&self) -> bool {
        !self.codes.is_empty() && self.codes.iter().all(|c| c.category.is_some())
    }

    /// Distinct category labels, sorted
    pub fn categories(&self) -> BTreeSet<&str> {
        self.codes
            .iter()
            .filter_map(|c| c.category.as_deref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_coding_system_from_str() {
        assert_eq!("ctv3".parse::<CodingSystem>(), Ok(CodingSystem::Ctv3));
        assert_eq!("SNOMED".parse::<CodingSystem>(), Ok(CodingSystem::Snomed));
        assert_eq!(
            "icd9".parse::<CodingSystem>(),
            Err(UnknownCodingSystem("icd9".to_string()))
        );
    }

    #[test]
    fn test_categories() {
        let codelist = Codelist::new(
            "ethnicity_codes",
            CodingSystem::Ctv3,
            vec![
                ClinicalCode::new("XaJQv").with_category("1"),
                ClinicalCode::new("XaJQw").with_category("1"),
                ClinicalCode::new("XaJQy").with_category("2"),
            ],
        );

        assert!(codelist.is_categorised());
        assert_eq!(codelist.categories().into_iter().collect::<Vec<_>>(), vec!["1", "2"]);
        assert!(codelist.contains("XaJQy"));
        assert!(!codelist.contains("XE2q5"));
    }

    #[test]
    fn test_declaration_category_column() {
        let decl = CodelistDeclaration::csv("eth", CodingSystem::Ctv3, "codelists/eth.csv", "Code")
            .with_category_column("Grouping_6");
        assert!(decl.declares_categories());

        let inline = CodelistDeclaration::inline("creatinine_codes", CodingSystem::Ctv3, ["XE2q5"]);
        assert!(!inline.declares_categories());
    }
}
