//! Tests for the naming linter over parsed libraries
//!
//! Covers:
//! - PascalCase findings per declaration category
//! - Generic definition names
//! - Document-level advisories

use cqlsql_analysis::{NameCategory, NamingRule, lint};
use cqlsql_ast::Library;
use cqlsql_diagnostics::{CQL0120, CQL0121, CQL0122, CQL0123};
use cqlsql_parser::parse;
use pretty_assertions::assert_eq;

fn parse_library(input: &str) -> Library {
    parse(input).unwrap_or_else(|e| panic!("Failed to parse library: {:?}", e))
}

#[test]
fn test_snake_case_definition_suggests_pascal_case() {
    let report = lint(&parse_library("define \"initial_population\": true"));
    assert_eq!(report.violations.len(), 1);
    let violation = &report.violations[0];
    assert_eq!(violation.identifier, "initial_population");
    assert_eq!(violation.category, NameCategory::Definition);
    assert_eq!(violation.rule_violated, NamingRule::PascalCase);
    assert_eq!(violation.suggested_rewrite, "InitialPopulation");
    assert!(report.has_violations());
}

#[test]
fn test_clean_library_has_no_violations() {
    let report = lint(&parse_library(
        "library Screening version '1'\ndefine \"InitialPopulation\": true",
    ));
    assert!(!report.has_violations());
    assert!(report.advisories.is_empty());
}

#[test]
fn test_generic_names_are_flagged_regardless_of_case() {
    let report = lint(&parse_library(
        "library L\ndefine \"Result\": true\ndefine \"DATA\": false",
    ));
    let generic: Vec<_> = report
        .violations
        .iter()
        .filter(|v| v.rule_violated == NamingRule::GenericName)
        .map(|v| (v.identifier.as_str(), v.suggested_rewrite.as_str()))
        .collect();
    assert_eq!(generic, vec![("Result", "QualifyingResult"), ("DATA", "QualifyingDATA")]);
}

#[test]
fn test_library_name_must_be_pascal_case() {
    let report = lint(&parse_library("library my_measure\ndefine \"A\": true"));
    assert_eq!(report.violations[0].category, NameCategory::Library);
    assert_eq!(report.violations[0].suggested_rewrite, "MyMeasure");
}

#[test]
fn test_terminology_parameters_and_aliases() {
    let source = r#"
library Measure
valueset "diabetes codes": 'http://example.org/vs'
parameter "Measurement Period" Interval<DateTime>
parameter lookback Integer
define "HasVisit": exists ([Encounter] enc where enc.status = 'finished')
"#;
    let report = lint(&parse_library(source));
    let found: Vec<_> = report
        .violations
        .iter()
        .map(|v| (v.category, v.identifier.as_str()))
        .collect();
    assert_eq!(
        found,
        vec![
            (NameCategory::ValueSet, "diabetes codes"),
            (NameCategory::Parameter, "lookback"),
            (NameCategory::Variable, "enc"),
        ]
    );
}

#[test]
fn test_advisories_for_missing_header_and_definitions() {
    let report = lint(&Library::new());
    let codes: Vec<_> = report.advisories.iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![CQL0122, CQL0123]);
    assert!(!report.has_violations());
}

#[test]
fn test_diagnostics_carry_rule_codes() {
    let report = lint(&parse_library("library L\ndefine \"list\": true"));
    let codes: Vec<_> = report.diagnostics().iter().map(|d| d.code).collect();
    assert_eq!(codes, vec![CQL0120, CQL0121]);
}
