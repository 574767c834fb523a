//! Tests for the lexer
//!
//! Covers:
//! - Literal classification (strings, numbers, temporals)
//! - Keywords, identifiers and quoted identifiers
//! - Operators and punctuation
//! - Comments and position tracking
//! - Termination on arbitrary input

use cqlsql_parser::{Keyword, Token, TokenKind, tokenize};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).into_iter().map(|t| t.kind).collect()
}

fn first(source: &str) -> Token {
    tokenize(source).remove(0)
}

// === Literals ===

#[rstest]
#[case("42", TokenKind::Integer, "42")]
#[case("3.14", TokenKind::Decimal, "3.14")]
#[case("'hello'", TokenKind::String, "hello")]
#[case("\"Measurement Period\"", TokenKind::QuotedIdentifier, "Measurement Period")]
#[case("@2024-01-01", TokenKind::Date, "2024-01-01")]
#[case("@2024-01-01T08:30:00.000Z", TokenKind::DateTime, "2024-01-01T08:30:00.000Z")]
#[case("@T08:30:00", TokenKind::Time, "T08:30:00")]
fn test_literal_tokens(#[case] source: &str, #[case] kind: TokenKind, #[case] text: &str) {
    let token = first(source);
    assert_eq!(token.kind, kind);
    assert_eq!(token.literal_text, text);
}

#[test]
fn test_double_quoted_escape() {
    let token = first(r#""say \"hi\"""#);
    assert_eq!(token.kind, TokenKind::QuotedIdentifier);
    assert_eq!(token.literal_text, "say \"hi\"");
}

// === Keywords and Identifiers ===

#[rstest]
#[case("library", Keyword::Library)]
#[case("Define", Keyword::Define)]
#[case("EXISTS", Keyword::Exists)]
#[case("such", Keyword::Such)]
#[case("Interval", Keyword::Interval)]
fn test_keywords(#[case] source: &str, #[case] keyword: Keyword) {
    assert_eq!(first(source).kind, TokenKind::Keyword(keyword));
}

#[test]
fn test_units_are_identifiers() {
    assert_eq!(
        kinds("3 days or less"),
        vec![
            TokenKind::Integer,
            TokenKind::Identifier,
            TokenKind::Keyword(Keyword::Or),
            TokenKind::Identifier,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_identifier_with_underscore_and_digits() {
    let token = first("_value2");
    assert_eq!(token.kind, TokenKind::Identifier);
    assert_eq!(token.literal_text, "_value2");
}

// === Operators and Punctuation ===

#[test]
fn test_two_character_operators() {
    assert_eq!(
        kinds("<= >= != == < > = ~"),
        vec![
            TokenKind::LessEq,
            TokenKind::GreaterEq,
            TokenKind::NotEq,
            TokenKind::Eq,
            TokenKind::Less,
            TokenKind::Greater,
            TokenKind::Eq,
            TokenKind::Tilde,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_punctuation() {
    assert_eq!(
        kinds("[Condition: \"X\"]"),
        vec![
            TokenKind::LBracket,
            TokenKind::Identifier,
            TokenKind::Colon,
            TokenKind::QuotedIdentifier,
            TokenKind::RBracket,
            TokenKind::Eof
        ]
    );
    assert_eq!(
        kinds("(a, b.c) {}"),
        vec![
            TokenKind::LParen,
            TokenKind::Identifier,
            TokenKind::Comma,
            TokenKind::Identifier,
            TokenKind::Dot,
            TokenKind::Identifier,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::RBrace,
            TokenKind::Eof
        ]
    );
}

#[test]
fn test_unknown_characters_do_not_stop_lexing() {
    assert_eq!(
        kinds("a # b $"),
        vec![
            TokenKind::Identifier,
            TokenKind::Unknown,
            TokenKind::Identifier,
            TokenKind::Unknown,
            TokenKind::Eof
        ]
    );
}

// === Comments and Positions ===

#[test]
fn test_comments_produce_no_tokens() {
    assert_eq!(
        kinds("a // line comment\n/* block\ncomment */ b"),
        vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
    );
}

#[test]
fn test_positions_across_block_comment() {
    let tokens = tokenize("define\n/* one\n two\n three */ \"A\": true");
    assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
    // `"A"` follows the comment on line 4
    assert_eq!((tokens[1].line, tokens[1].column), (4, 11));
    assert_eq!((tokens[2].line, tokens[2].column), (4, 14));
    assert_eq!((tokens[3].line, tokens[3].column), (4, 16));
}

#[test]
fn test_columns_count_characters() {
    let tokens = tokenize("'é' x");
    assert_eq!(tokens[1].column, 5);
}

// === Termination ===

proptest! {
    #[test]
    fn prop_always_ends_with_eof(source in any::<String>()) {
        let tokens = tokenize(&source);
        prop_assert!(!tokens.is_empty());
        prop_assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        prop_assert_eq!(tokens.iter().filter(|t| t.is_eof()).count(), 1);
    }

    #[test]
    fn prop_positions_are_monotonic(source in "[a-z0-9 \n'\"/*@:.\\[\\]()]{0,64}") {
        let tokens = tokenize(&source);
        for pair in tokens.windows(2) {
            prop_assert!((pair[0].line, pair[0].column) <= (pair[1].line, pair[1].column));
        }
    }
}
