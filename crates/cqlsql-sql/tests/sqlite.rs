//! Tests that generated statements run on SQLite
//!
//! Covers:
//! - Patient queries as `IN` and set operands
//! - UNION, EXCEPT and INTERSECT over query sets
//! - Relationships, interval comparisons and value set membership
//! - Population counts over a small fixture

use cqlsql_ir::lower;
use cqlsql_parser::parse;
use cqlsql_sql::schema::BASE_VIEWS;
use cqlsql_sql::{GeneratorOptions, generate_from_ast, generate_from_ir};
use pretty_assertions::assert_eq;
use rstest::rstest;
use sqlx::sqlite::SqliteConnection;
use sqlx::{Connection, Row};

const FIXTURE: &[&str] = &[
    "INSERT INTO Patient VALUES ('pat1', '1960-05-01', 'female', NULL)",
    "INSERT INTO Patient VALUES ('pat2', '1990-03-10', 'male', NULL)",
    "INSERT INTO Patient VALUES ('pat3', '2010-01-01', 'female', NULL)",
    "INSERT INTO Condition VALUES ('c1', 'pat2', 'active', 'confirmed', '44054006', 'http://snomed.info/sct', 'Diabetes', '2023-02-01', NULL, NULL)",
    "INSERT INTO Condition VALUES ('c2', 'pat3', 'resolved', 'confirmed', '195662009', 'http://snomed.info/sct', 'Pharyngitis', '2022-11-01', '2022-11-20', NULL)",
    "INSERT INTO Procedure VALUES ('pr1', 'pat1', 'completed', '80146002', 'http://snomed.info/sct', 'Appendectomy', '2024-03-01', NULL)",
    "INSERT INTO Encounter VALUES ('e1', 'pat1', 'finished', 'AMB', '185349003', 'http://snomed.info/sct', 'Office visit', '2024-02-01', '2024-02-01')",
    "INSERT INTO Encounter VALUES ('e2', 'pat2', 'finished', 'AMB', '185349003', 'http://snomed.info/sct', 'Office visit', '2023-05-01', '2023-05-02')",
    "INSERT INTO Observation VALUES ('o1', 'pat1', 'final', '4548-4', 'http://loinc.org', 'HbA1c', 7.5, '%', NULL, '2024-04-01', '2024-04-01')",
    "INSERT INTO valueset_membership VALUES ('http://example.org/fhir/ValueSet/diabetes', '44054006', 'http://snomed.info/sct')",
];

async fn connect() -> SqliteConnection {
    let mut conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .unwrap_or_else(|e| panic!("Failed to open SQLite: {}", e));
    let mut statements: Vec<String> = BASE_VIEWS
        .iter()
        .map(|view| format!("CREATE TABLE {} ({})", view.resource, view.columns.join(", ")))
        .collect();
    statements.push("CREATE TABLE valueset_membership (valueset_url, code, code_system)".to_string());
    statements.extend(FIXTURE.iter().map(|s| s.to_string()));
    for statement in &statements {
        sqlx::query(statement)
            .execute(&mut conn)
            .await
            .unwrap_or_else(|e| panic!("Failed to run {}: {}", statement, e));
    }
    conn
}

/// SQL for `source`, checked to be the same from both backends
fn statement(source: &str) -> String {
    let library = parse(source).unwrap_or_else(|e| panic!("Failed to parse: {:?}", e));
    let options = GeneratorOptions::default();
    let ast = generate_from_ast(&library, &options, &[]);
    let ir = generate_from_ir(&lower(&library).library, &options, &[]);
    assert_eq!(ast.sql, ir.sql);
    ast.sql
}

/// Initial population and numerator counts reported by the final query
async fn counts(source: &str) -> (i64, i64) {
    let sql = statement(source);
    let mut conn = connect().await;
    let row = sqlx::query(sql.trim_end().trim_end_matches(';'))
        .fetch_one(&mut conn)
        .await
        .unwrap_or_else(|e| panic!("SQLite rejected the statement: {}\n{}", e, sql));
    (
        row.get::<i64, _>("initial_population_count"),
        row.get::<i64, _>("numerator_count"),
    )
}

// === Patient sets ===

#[rstest]
#[case::patient_and("([Patient] P where P.gender = 'female') and true", 2)]
#[case::patient_union("([Patient] P where P.gender = 'female') union [Condition]", 3)]
#[case::patient_except("([Patient] P where P.gender = 'female') except [Procedure]", 1)]
#[case::patient_intersect("([Patient] P where P.gender = 'male') intersect [Condition]", 1)]
#[case::not_member("not (([Patient] P where P.gender = 'female') and true)", 1)]
#[tokio::test]
async fn test_patient_query_sets_run(#[case] body: &str, #[case] expected: i64) {
    let source = format!("define \"InitialPopulation\": {body}");
    assert_eq!(counts(&source).await.0, expected);
}

#[tokio::test]
async fn test_definition_sets_run() {
    let source = "define \"Women\": [Patient] P where P.gender = 'female'\n\
                  define \"Treated\": [Procedure]\n\
                  define \"InitialPopulation\": \"Women\" except \"Treated\"";
    assert_eq!(counts(source).await.0, 1);
}

// === Queries ===

#[rstest]
#[case::without("[Patient] P without [Procedure] Pr such that true", 2)]
#[case::with("[Patient] P with [Encounter] E such that E.period during \"Measurement Period\"", 1)]
#[case::during("[Encounter] E where E.period during \"Measurement Period\"", 1)]
#[case::on_or_before("[Encounter] E where E.period on or before end of \"Measurement Period\"", 2)]
#[case::on_or_after("[Encounter] E where E.period on or after start of \"Measurement Period\"", 1)]
#[case::value("[Observation] O where O.value > 7", 1)]
#[tokio::test]
async fn test_queries_run(#[case] body: &str, #[case] expected: i64) {
    let source = format!("define \"InitialPopulation\": {body}");
    assert_eq!(counts(&source).await.0, expected);
}

#[tokio::test]
async fn test_measure_counts() {
    let source = r#"
library DiabetesScreening version '1.0.0'
valueset "Diabetes": 'http://example.org/fhir/ValueSet/diabetes'
parameter "Measurement Period" Interval<DateTime>
context Patient
define "InitialPopulation": AgeInYearsAt(start of "Measurement Period") >= 18
define "Denominator": "InitialPopulation"
define "Numerator": "Denominator" and exists ([Condition: "Diabetes"])
"#;
    assert_eq!(counts(source).await, (2, 1));
}

#[tokio::test]
async fn test_missing_reference_placeholder_runs() {
    let source = "define \"InitialPopulation\": \"Elsewhere\" or exists ([Condition])";
    assert_eq!(counts(source).await.0, 1);
}
