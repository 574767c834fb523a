//! Tests for agreement between the AST and IR backends
//!
//! Covers:
//! - Byte-identical SQL for representative libraries
//! - Matching missing references and unloaded includes
//! - Determinism and parity over generated definition lists

use cqlsql_ir::lower;
use cqlsql_parser::parse;
use cqlsql_sql::{GeneratorOptions, SqlOutput, generate_from_ast, generate_from_ir};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

fn both(source: &str) -> (SqlOutput, SqlOutput) {
    let library = parse(source).unwrap_or_else(|e| panic!("Failed to parse: {:?}", e));
    let options = GeneratorOptions::default();
    let ast = generate_from_ast(&library, &options, &[]);
    let ir = generate_from_ir(&lower(&library).library, &options, &[]);
    (ast, ir)
}

const PREAMBLE: &str = r#"
library Parity version '3.0'
using FHIR version '4.0.1'
include CommonLogic called Common
codesystem "LOINC": 'http://loinc.org'
valueset "Diabetes": 'http://example.org/fhir/ValueSet/diabetes'
valueset "Office Visit": 'http://example.org/fhir/ValueSet/office'
code "HbA1c": '4548-4' from "LOINC"
parameter "Measurement Period" Interval<DateTime>
parameter Threshold Integer default 18
parameter Cutoff Decimal
parameter Reporting Interval<Date> default Interval[@2024-01-01, @2024-07-01)
context Patient
"#;

// === Representative libraries ===

#[rstest]
#[case::age(r#"define "InitialPopulation": AgeInYearsAt(start of "Measurement Period") >= Threshold"#)]
#[case::reference("define \"InitialPopulation\": true\ndefine \"Denominator\": \"InitialPopulation\"")]
#[case::exists_valueset(r#"define "Numerator": exists ([Condition: "Diabetes"])"#)]
#[case::code_in(r#"define "Labs": [Observation: code in "Diabetes"]"#)]
#[case::declared_code(r#"define "A1c": [Observation: "HbA1c"]"#)]
#[case::text_filter("define \"Glucose\": [Observation: 'glucose']")]
#[case::url_filter(r#"define "Urls": [Observation: "http://loinc.org/vs/glucose"]"#)]
#[case::with(r#"define "Visits": [Encounter] E with [Condition] C such that C.onset during E.period where E.status = 'finished'"#)]
#[case::without("define \"NoSurgery\": [Patient] P without [Procedure] Pr such that true")]
#[case::period(r#"define "InPeriod": [Encounter] E where E.period during "Measurement Period""#)]
#[case::starts(r#"define "Recent": [Encounter] E where E.period starts during Reporting"#)]
#[case::timing("define \"Prompt\": [Condition] C with [MedicationRequest] M such that C.onset 3 days or less before M.authoredOn")]
#[case::timing_after("define \"Late\": [Condition] C with [Encounter] E such that C.onset 1 year or more after E.period")]
#[case::date_shift("define \"LastYear\": [Encounter] E where E.period.start after Today() - 1 year")]
#[case::return_value("define \"Values\": [Observation] O return O.value")]
#[case::aggregate(r#"define "Many": Count([Encounter: "Office Visit"]) >= 2"#)]
#[case::functions("define \"Named\": exists ([Observation] O where FHIRHelpers.ToString(O.value) = '5')")]
#[case::unmapped("define \"Odd\": Frobnicate(1) > 0")]
#[case::bound_parameter("define \"Over\": exists ([Observation] O where O.value > Cutoff)")]
#[case::patient_column("define \"Female\": Patient.gender = 'female'")]
#[case::not_null("define \"Dated\": exists ([Condition] C where not (C.onset is null))")]
#[case::union("define \"A\": [Condition]\ndefine \"B\": [Procedure]\ndefine \"Either\": \"A\" union \"B\"")]
#[case::interval("define \"Range\": Interval[1, 10]")]
#[case::missing("define \"Shared\": Common.\"Base Population\"\ndefine \"Unknown\": \"Elsewhere\"")]
#[case::forward("define \"Early\": \"Later\" and true\ndefine \"Later\": true")]
#[case::collision("define \"Visit-A\": true\ndefine \"Visit_A\": false")]
#[case::source_reference("define \"Visits\": [Encounter]\ndefine \"Finished\": \"Visits\" V where V.patient_id is not null")]
fn test_backends_agree(#[case] defines: &str) {
    let (ast, ir) = both(&format!("{PREAMBLE}{defines}\n"));
    assert_eq!(ast.sql, ir.sql);
    assert_eq!(ast.resolution.missing_references, ir.resolution.missing_references);
    assert_eq!(ast.resolution.unloaded_includes, ir.resolution.unloaded_includes);
}

#[test]
fn test_backends_agree_without_header() {
    let (ast, ir) = both("define \"InitialPopulation\": [Encounter]");
    assert_eq!(ast.sql, ir.sql);
    assert!(ir.sql.contains("-- Library: Anonymous\n"));
}

#[test]
fn test_ir_backend_reports_unmapped_functions() {
    let (_, ir) = both(&format!("{PREAMBLE}define \"Odd\": Frobnicate(1) > 0\n"));
    let warning = ir
        .diagnostics
        .iter()
        .find(|d| d.code == cqlsql_diagnostics::CQL0201)
        .unwrap_or_else(|| panic!("no function warning"));
    assert!(warning.location.is_some());
}

// === Generated libraries ===

const FRAGMENTS: [&str; 12] = [
    "true",
    "AgeInYears() >= Threshold",
    "[Encounter]",
    "exists ([Condition: \"Diabetes\"])",
    "[Observation] O where O.value > 5",
    "[Encounter] E where E.period during \"Measurement Period\"",
    "\"Elsewhere\"",
    "Common.\"Base Population\"",
    "Count([Procedure]) > 1",
    "Patient.gender = 'male' or Patient.gender = 'female'",
    "Frobnicate(2)",
    "Interval[@2024-01-01, @2024-02-01]",
];

fn library_source() -> impl Strategy<Value = String> {
    prop::collection::vec((0..FRAGMENTS.len(), 0usize..3), 1..8).prop_map(|picks| {
        let mut source = PREAMBLE.to_string();
        for (i, (fragment, reference)) in picks.iter().enumerate() {
            // Some definitions read an earlier one instead of a fragment
            let body = match (*reference, i) {
                (0, i) if i > 0 => format!("\"Def{}\" and {}", i - 1, FRAGMENTS[*fragment]),
                _ => FRAGMENTS[*fragment].to_string(),
            };
            source.push_str(&format!("define \"Def{i}\": {body}\n"));
        }
        source
    })
}

proptest! {
    #[test]
    fn prop_generation_is_deterministic(source in library_source()) {
        let (first, _) = both(&source);
        let (second, _) = both(&source);
        prop_assert_eq!(first.sql, second.sql);
    }

    #[test]
    fn prop_backends_agree(source in library_source()) {
        let (ast, ir) = both(&source);
        prop_assert_eq!(ast.sql, ir.sql);
        prop_assert_eq!(ast.resolution.missing_references, ir.resolution.missing_references);
    }

    #[test]
    fn prop_every_definition_has_a_cte(source in library_source()) {
        let (ast, _) = both(&source);
        let defines = source.matches("define \"").count();
        let ctes = (0..defines)
            .filter(|i| ast.sql.contains(&format!("\nDef{i} AS (\n")))
            .count();
        prop_assert_eq!(ctes, defines);
    }
}
