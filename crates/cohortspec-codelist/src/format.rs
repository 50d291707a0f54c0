//! Code shape checks per coding system

use cohortspec_model::CodingSystem;
use regex::Regex;
use std::sync::LazyLock;

static READ_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.]{5}$").expect("valid regex"));

static READ_V2_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.]{5}([0-9]{2})?$").expect("valid regex"));

static SCTID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5,17}$").expect("valid regex"));

static ICD10_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]{2}(\.?[0-9A-Z]{1,4})?$").expect("valid regex"));

static OPCS4_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][0-9]{2}(\.?[0-9]{1,2})?$").expect("valid regex"));

/// Pattern a well-formed code of `system` matches
pub fn code_pattern(system: CodingSystem) -> &'static Regex {
    match system {
        CodingSystem::Ctv3 => &READ_CODE,
        CodingSystem::Readv2 => &READ_V2_CODE,
        CodingSystem::Snomed | CodingSystem::Dmd => &SCTID,
        CodingSystem::Icd10 => &ICD10_CODE,
        CodingSystem::Opcs4 => &OPCS4_CODE,
    }
}

pub fn is_well_formed(system: CodingSystem, code: &str) -> bool {
    code_pattern(system).is_match(code)
}
