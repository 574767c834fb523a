//! Tests for library-level parsing
//!
//! Covers:
//! - Library header, using and include statements
//! - Terminology (codesystem, valueset, code) declarations
//! - Parameters with opaque types and defaults
//! - Context and define statements, declaration order
//! - Fail-fast syntax errors

use cqlsql_ast::*;
use cqlsql_diagnostics::{CQL0001, CQL0002, CQL0003, CompileError};
use cqlsql_parser::{parse, parse_tokens, tokenize};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn parse_library(input: &str) -> Library {
    parse(input).unwrap_or_else(|e| panic!("Failed to parse library: {:?}", e))
}

const DIABETES_MEASURE: &str = r#"
library DiabetesScreening version '1.0.0'

using FHIR version '4.0.1'

include FHIRHelpers version '4.0.1' called FHIRHelpers
include CommonLogic called Common

codesystem "LOINC": 'http://loinc.org'
valueset "Diabetes": 'http://cts.nlm.nih.gov/fhir/ValueSet/2.16.840.1.113883.3.464.1003.103.12.1001'
code "HbA1c": '4548-4' from "LOINC" display 'Hemoglobin A1c'

parameter "Measurement Period" Interval<DateTime>
  default Interval[@2024-01-01T00:00:00.0, @2025-01-01T00:00:00.0)

context Patient

define "InitialPopulation":
  AgeInYearsAt(start of "Measurement Period") >= 18

define "Denominator":
  "InitialPopulation"

define "Numerator":
  exists ([Condition: "Diabetes"])
"#;

// === Header ===

#[test]
fn test_header_and_usings() {
    let library = parse_library(DIABETES_MEASURE);
    assert_eq!(library.identifier.as_deref(), Some("DiabetesScreening"));
    assert_eq!(library.version.as_deref(), Some("1.0.0"));
    assert_eq!(
        library.usings,
        vec![UsingDefinition {
            model: "FHIR".to_string(),
            version: Some("4.0.1".to_string())
        }]
    );
}

#[test]
fn test_includes() {
    let library = parse_library(DIABETES_MEASURE);
    assert_eq!(library.includes.len(), 2);
    assert_eq!(library.includes[0].alias.as_deref(), Some("FHIRHelpers"));
    assert_eq!(library.includes[1].library, "CommonLogic");
    assert_eq!(library.include("Common").map(|i| i.library.as_str()), Some("CommonLogic"));
}

#[test]
fn test_library_header_is_optional() {
    let library = parse_library("define \"A\": true");
    assert_eq!(library.identifier, None);
    assert_eq!(library.location, None);
    assert_eq!(library.defines.len(), 1);
}

// === Terminology ===

#[test]
fn test_terminology_declarations() {
    let library = parse_library(DIABETES_MEASURE);
    assert_eq!(library.codesystem("LOINC").map(|c| c.uri.as_str()), Some("http://loinc.org"));
    assert_eq!(
        library.valueset("Diabetes").map(|v| v.uri.as_str()),
        Some("http://cts.nlm.nih.gov/fhir/ValueSet/2.16.840.1.113883.3.464.1003.103.12.1001")
    );
    let code = library.code("HbA1c").unwrap_or_else(|| panic!("code not parsed"));
    assert_eq!(code.code, "4548-4");
    assert_eq!(code.system, "LOINC");
    assert_eq!(code.display.as_deref(), Some("Hemoglobin A1c"));
}

// === Parameters ===

#[test]
fn test_parameter_type_is_opaque() {
    let library = parse_library(DIABETES_MEASURE);
    let param = library
        .parameter("Measurement Period")
        .unwrap_or_else(|| panic!("parameter not parsed"));
    assert_eq!(param.data_type.as_deref(), Some("Interval<DateTime>"));
    assert!(matches!(param.default, Some(Expression::Interval(_))));
}

#[test]
fn test_parameter_without_type_or_default() {
    let library = parse_library("parameter Threshold\ndefine \"A\": true");
    assert_eq!(library.parameters[0].name, "Threshold");
    assert_eq!(library.parameters[0].data_type, None);
    assert_eq!(library.parameters[0].default, None);
}

#[test]
fn test_parameter_with_default_only() {
    let library = parse_library("parameter Threshold default 18");
    assert_eq!(
        library.parameters[0].default,
        Some(Expression::literal(Literal::integer("18")))
    );
}

// === Definitions ===

#[test]
fn test_defines_preserve_order() {
    let library = parse_library(DIABETES_MEASURE);
    let names: Vec<_> = library.defines.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["InitialPopulation", "Denominator", "Numerator"]);
}

#[test]
fn test_define_records_context_and_location() {
    let library = parse_library(DIABETES_MEASURE);
    let define = &library.defines[0];
    assert_eq!(define.context.as_deref(), Some("Patient"));
    assert_eq!(define.location.line, 18);
    assert_eq!(define.location.column, 1);
}

#[test]
fn test_define_with_access_modifier() {
    let library = parse_library("define private \"Helper\": 1\ndefine public Other: 2");
    let names: Vec<_> = library.defines.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["Helper", "Other"]);
}

#[test]
fn test_define_bodies() {
    let library = parse_library(DIABETES_MEASURE);
    assert_eq!(
        library.defines[1].expression,
        Expression::identifier("InitialPopulation")
    );
    assert!(matches!(
        &library.defines[2].expression,
        Expression::Unary(UnaryExpr { op: UnaryOp::Exists, .. })
    ));
}

#[test]
fn test_parse_tokens_matches_parse() {
    let from_tokens = parse_tokens(tokenize(DIABETES_MEASURE))
        .unwrap_or_else(|e| panic!("Failed to parse tokens: {:?}", e));
    assert_eq!(from_tokens, parse_library(DIABETES_MEASURE));
}

// === Errors ===

#[test]
fn test_missing_colon_reports_expected_and_found() {
    let err = parse("define \"A\" true").unwrap_err();
    match err {
        CompileError::Syntax {
            code,
            expected,
            found,
            location,
        } => {
            assert_eq!(code, CQL0001);
            assert_eq!(expected, "':'");
            assert_eq!(found, "'true'");
            assert_eq!(location.line, 1);
        }
        other => panic!("Expected syntax error, got: {:?}", other),
    }
}

#[test]
fn test_truncated_define_reports_end_of_input() {
    let err = parse("define \"A\":").unwrap_err();
    assert_eq!(err.code(), CQL0002);
}

#[test]
fn test_unrecognized_character_has_its_own_code() {
    let err = parse("define \"A\": 1 $ 2").unwrap_err();
    match err {
        CompileError::Syntax { code, found, .. } => {
            assert_eq!(code, CQL0003);
            assert_eq!(found, "unknown '$'");
        }
        other => panic!("Expected syntax error, got: {:?}", other),
    }
}

#[test]
fn test_sections_out_of_order_fail() {
    let err = parse("define \"A\": true\nusing FHIR").unwrap_err();
    assert_eq!(err.location().map(|l| l.line), Some(2));
}

#[rstest]
#[case("library")]
#[case("using")]
#[case("include Foo called")]
#[case("valueset \"X\" 'http://x'")]
#[case("code \"X\": '1'")]
#[case("define : true")]
#[case("define \"A\": true )")]
fn test_invalid_statements_fail(#[case] input: &str) {
    assert!(parse(input).is_err(), "expected '{}' to fail", input);
}
