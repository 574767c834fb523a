//! Tests for query parsing
//!
//! Covers:
//! - Resource references with and without code filters
//! - Alias promotion and query clauses
//! - Relationship clauses (with / without ... such that)
//! - Function calls, member access and intervals

use cqlsql_ast::*;
use cqlsql_parser::parse_expression;
use pretty_assertions::assert_eq;

fn parse_expr(input: &str) -> Expression {
    parse_expression(input).unwrap_or_else(|e| panic!("Failed to parse '{}': {:?}", input, e))
}

fn parse_query(input: &str) -> Query {
    match parse_expr(input) {
        Expression::Query(q) => *q,
        other => panic!("Expected query, got: {:?}", other),
    }
}

// === Resource References ===

#[test]
fn test_bare_resource_reference() {
    assert_eq!(parse_expr("[Patient]"), Expression::resource("Patient", None));
}

#[test]
fn test_resource_reference_with_valueset_filter() {
    assert_eq!(
        parse_expr("[Condition: \"http://cts.nlm.nih.gov/fhir/ValueSet/2.16.840.1.113883.3.464.1003.103.12.1001\"]"),
        Expression::resource(
            "Condition",
            Some(Expression::identifier(
                "http://cts.nlm.nih.gov/fhir/ValueSet/2.16.840.1.113883.3.464.1003.103.12.1001"
            ))
        )
    );
}

#[test]
fn test_resource_reference_with_string_filter() {
    assert_eq!(
        parse_expr("[Observation: 'HbA1c']"),
        Expression::resource("Observation", Some(Expression::literal(Literal::string("HbA1c"))))
    );
}

#[test]
fn test_resource_reference_with_code_in_filter() {
    assert_eq!(
        parse_expr("[Observation: code in \"HbA1c Laboratory Test\"]"),
        Expression::resource(
            "Observation",
            Some(Expression::binary(
                BinaryOp::In,
                Expression::identifier("code"),
                Expression::identifier("HbA1c Laboratory Test")
            ))
        )
    );
}

// === Queries ===

#[test]
fn test_alias_promotes_to_query() {
    let query = parse_query("[Encounter] E");
    assert_eq!(*query.source, Expression::resource("Encounter", None));
    assert_eq!(query.alias.as_deref(), Some("E"));
    assert!(query.where_clause.is_none());
    assert!(query.relationships.is_empty());
}

#[test]
fn test_where_clause() {
    let query = parse_query("[Observation] O where O.status = 'final'");
    assert_eq!(query.alias.as_deref(), Some("O"));
    assert_eq!(
        query.where_clause.as_deref(),
        Some(&Expression::binary(
            BinaryOp::Equal,
            Expression::member(Expression::identifier("O"), "status"),
            Expression::literal(Literal::string("final"))
        ))
    );
}

#[test]
fn test_where_without_alias() {
    let query = parse_query("[Condition] where true");
    assert_eq!(query.alias, None);
    assert!(query.where_clause.is_some());
}

#[test]
fn test_identifier_source_promotes_to_query() {
    let query = parse_query("\"Qualifying Encounters\" E where E.class = 'inpatient'");
    assert_eq!(*query.source, Expression::identifier("Qualifying Encounters"));
    assert_eq!(query.alias.as_deref(), Some("E"));
}

#[test]
fn test_identifier_followed_by_where() {
    let query = parse_query("Adults where true");
    assert_eq!(*query.source, Expression::identifier("Adults"));
    assert_eq!(query.alias, None);
}

#[test]
fn test_with_such_that() {
    let query = parse_query(
        "[Encounter] E with [Condition] C such that C.onset during E.period where E.status = 'finished'",
    );
    assert_eq!(query.relationships.len(), 1);
    let rel = &query.relationships[0];
    assert_eq!(rel.kind, RelationshipKind::With);
    assert_eq!(*rel.source, Expression::resource("Condition", None));
    assert_eq!(rel.alias.as_deref(), Some("C"));
    assert_eq!(
        rel.condition.as_deref(),
        Some(&Expression::binary(
            BinaryOp::During,
            Expression::member(Expression::identifier("C"), "onset"),
            Expression::member(Expression::identifier("E"), "period")
        ))
    );
    assert!(query.where_clause.is_some());
}

#[test]
fn test_without_clause_without_condition() {
    let query = parse_query("[Patient] P without [Procedure] Pr");
    let rel = &query.relationships[0];
    assert_eq!(rel.kind, RelationshipKind::Without);
    assert_eq!(rel.alias.as_deref(), Some("Pr"));
    assert!(rel.condition.is_none());
}

#[test]
fn test_multiple_relationships() {
    let query = parse_query(
        "[Encounter] E with [Condition] C such that true without [Procedure] P such that false",
    );
    let kinds: Vec<_> = query.relationships.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, vec![RelationshipKind::With, RelationshipKind::Without]);
}

#[test]
fn test_return_clause() {
    let query = parse_query("[Observation] O return O.value");
    assert_eq!(
        query.return_clause.as_deref(),
        Some(&Expression::member(Expression::identifier("O"), "value"))
    );
}

#[test]
fn test_exists_over_parenthesized_retrieve() {
    assert_eq!(
        parse_expr("exists ([Condition: \"Diabetes\"])"),
        Expression::unary(
            UnaryOp::Exists,
            Expression::resource("Condition", Some(Expression::identifier("Diabetes")))
        )
    );
}

// === Calls, Members and Intervals ===

#[test]
fn test_function_call_with_nested_unary() {
    assert_eq!(
        parse_expr("AgeInYearsAt(start of \"Measurement Period\") >= 18"),
        Expression::binary(
            BinaryOp::GreaterOrEqual,
            Expression::call(
                "AgeInYearsAt",
                vec![Expression::unary(
                    UnaryOp::StartOf,
                    Expression::identifier("Measurement Period")
                )]
            ),
            Expression::literal(Literal::integer("18"))
        )
    );
}

#[test]
fn test_empty_argument_list() {
    assert_eq!(parse_expr("Today()"), Expression::call("Today", vec![]));
}

#[test]
fn test_qualified_function_call() {
    assert_eq!(
        parse_expr("FHIRHelpers.ToString(X)"),
        Expression::call("FHIRHelpers.ToString", vec![Expression::identifier("X")])
    );
}

#[test]
fn test_keyword_member_names() {
    assert_eq!(
        parse_expr("O.code"),
        Expression::member(Expression::identifier("O"), "code")
    );
    assert_eq!(
        parse_expr("E.period.start"),
        Expression::member(
            Expression::member(Expression::identifier("E"), "period"),
            "start"
        )
    );
}

#[test]
fn test_interval_boundaries() {
    match parse_expr("Interval[@2024-01-01, @2025-01-01)") {
        Expression::Interval(interval) => {
            assert!(interval.start_closed);
            assert!(!interval.end_closed);
            assert_eq!(
                interval.start.as_deref(),
                Some(&Expression::literal(Literal::new(LiteralType::Date, "2024-01-01")))
            );
        }
        other => panic!("Expected interval, got: {:?}", other),
    }
    match parse_expr("Interval(1, 10]") {
        Expression::Interval(interval) => {
            assert!(!interval.start_closed);
            assert!(interval.end_closed);
        }
        other => panic!("Expected interval, got: {:?}", other),
    }
}

#[test]
fn test_quantity_literal() {
    assert_eq!(
        parse_expr("Today() - 1 year"),
        Expression::binary(
            BinaryOp::Subtract,
            Expression::call("Today", vec![]),
            Expression::literal(Literal::quantity("1", "year"))
        )
    );
}

// === Errors ===

#[test]
fn test_unclosed_retrieve_fails() {
    assert!(parse_expression("[Condition: \"X\"").is_err());
}

#[test]
fn test_such_without_that_fails() {
    assert!(parse_expression("[Encounter] E with [Condition] C such C.x").is_err());
}
