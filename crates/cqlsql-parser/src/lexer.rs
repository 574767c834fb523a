//! Lexer built from winnow recognisers
//!
//! The driver never fails: a character no recogniser accepts becomes a
//! single-character `Unknown` token, and the stream always ends with `Eof`.

use crate::token::{Keyword, Token, TokenKind};
use cqlsql_diagnostics::SourceLocation;
use winnow::ascii::{digit1, multispace1, till_line_ending};
use winnow::combinator::{alt, opt, preceded, repeat};
use winnow::prelude::*;
use winnow::stream::Stream;
use winnow::token::{one_of, rest, take_until, take_while};

/// Convert source text into tokens terminated by an `Eof` token
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut input = source;
    let mut location = SourceLocation::default();
    let mut tokens = Vec::new();

    loop {
        if let Ok(skipped) = trivia.parse_next(&mut input) {
            location = location.advance(skipped);
        }
        if input.is_empty() {
            break;
        }

        let start = input;
        let (kind, text) = match token.parse_next(&mut input) {
            Ok(lexed) => lexed,
            Err(_) => {
                input = start;
                unknown(&mut input)
            }
        };
        let consumed = &start[..start.len() - input.len()];
        tokens.push(Token::new(kind, text, location));
        location = location.advance(consumed);
    }

    tokens.push(Token::new(TokenKind::Eof, "", location));
    log::debug!("lexed {} tokens", tokens.len());
    tokens
}

// === Trivia ===

fn trivia<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    repeat::<_, _, (), _, _>(0.., alt((multispace1.void(), line_comment, block_comment)))
        .take()
        .parse_next(input)
}

fn line_comment(input: &mut &str) -> ModalResult<()> {
    ("//", till_line_ending).void().parse_next(input)
}

/// An unterminated block comment runs to the end of input
fn block_comment(input: &mut &str) -> ModalResult<()> {
    ("/*", alt(((take_until(0.., "*/"), "*/").void(), rest.void())))
        .void()
        .parse_next(input)
}

// === Tokens ===

fn token(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    alt((
        string_literal,
        quoted_identifier,
        temporal_literal,
        number,
        word,
        operator,
        punctuation,
    ))
    .parse_next(input)
}

fn string_literal(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    '\''.parse_next(input)?;
    Ok(match quoted_text(input, '\'') {
        (text, true) => (TokenKind::String, text),
        (text, false) => (TokenKind::Unknown, format!("'{text}")),
    })
}

fn quoted_identifier(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    '"'.parse_next(input)?;
    Ok(match quoted_text(input, '"') {
        (text, true) => (TokenKind::QuotedIdentifier, text),
        (text, false) => (TokenKind::Unknown, format!("\"{text}")),
    })
}

/// Body of a quoted token after the opening quote; `false` if unterminated
fn quoted_text(input: &mut &str, quote: char) -> (String, bool) {
    let mut text = String::new();
    while let Some(c) = input.next_token() {
        if c == quote {
            return (text, true);
        }
        if c != '\\' {
            text.push(c);
            continue;
        }
        match input.next_token() {
            Some('n') => text.push('\n'),
            Some('t') => text.push('\t'),
            Some('r') => text.push('\r'),
            Some(escaped) => text.push(escaped),
            None => break,
        }
    }
    (text, false)
}

/// `@2024-01-01`, `@2024-01-01T08:30:00Z`, `@T08:30`
fn temporal_literal(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    preceded(
        '@',
        take_while(1.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | ':' | '.' | '+')
        }),
    )
    .map(|text: &str| (classify_temporal(text), text.to_string()))
    .parse_next(input)
}

fn classify_temporal(text: &str) -> TokenKind {
    if text.starts_with('T') {
        TokenKind::Time
    } else if text.contains('T') {
        TokenKind::DateTime
    } else {
        TokenKind::Date
    }
}

fn number(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    (digit1, opt(('.', digit1)))
        .take()
        .map(|text: &str| {
            let kind = if text.contains('.') {
                TokenKind::Decimal
            } else {
                TokenKind::Integer
            };
            (kind, text.to_string())
        })
        .parse_next(input)
}

/// Identifier or keyword
fn word(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .map(|text: &str| {
            let kind = Keyword::lookup(text).map_or(TokenKind::Identifier, TokenKind::Keyword);
            (kind, text.to_string())
        })
        .parse_next(input)
}

fn operator(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    alt((
        alt((
            "==".value(TokenKind::Eq),
            "!=".value(TokenKind::NotEq),
            "<=".value(TokenKind::LessEq),
            ">=".value(TokenKind::GreaterEq),
        )),
        alt((
            '<'.value(TokenKind::Less),
            '>'.value(TokenKind::Greater),
            '='.value(TokenKind::Eq),
            '~'.value(TokenKind::Tilde),
        )),
        alt((
            '+'.value(TokenKind::Plus),
            '-'.value(TokenKind::Minus),
            '*'.value(TokenKind::Star),
            '/'.value(TokenKind::Slash),
            '&'.value(TokenKind::Ampersand),
        )),
    ))
    .with_taken()
    .map(|(kind, text): (TokenKind, &str)| {
        // `==` is an alias of `=`
        let text = if kind == TokenKind::Eq { "=" } else { text };
        (kind, text.to_string())
    })
    .parse_next(input)
}

fn punctuation(input: &mut &str) -> ModalResult<(TokenKind, String)> {
    alt((
        '('.value(TokenKind::LParen),
        ')'.value(TokenKind::RParen),
        '['.value(TokenKind::LBracket),
        ']'.value(TokenKind::RBracket),
        '{'.value(TokenKind::LBrace),
        '}'.value(TokenKind::RBrace),
        ':'.value(TokenKind::Colon),
        ','.value(TokenKind::Comma),
        '.'.value(TokenKind::Dot),
    ))
    .with_taken()
    .map(|(kind, text): (TokenKind, &str)| (kind, text.to_string()))
    .parse_next(input)
}

fn unknown(input: &mut &str) -> (TokenKind, String) {
    let text = input.next_token().map(String::from).unwrap_or_default();
    (TokenKind::Unknown, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_input_is_just_eof() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
        assert_eq!(kinds("  // only a comment"), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        assert_eq!(
            kinds("DEFINE Define define"),
            vec![
                TokenKind::Keyword(Keyword::Define),
                TokenKind::Keyword(Keyword::Define),
                TokenKind::Keyword(Keyword::Define),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_double_equals_is_normalised() {
        let tokens = tokenize("a == b");
        assert_eq!(tokens[1].kind, TokenKind::Eq);
        assert_eq!(tokens[1].literal_text, "=");
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize(r"'it\'s' 'a\nb'");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].literal_text, "it's");
        assert_eq!(tokens[1].literal_text, "a\nb");
    }

    #[test]
    fn test_unterminated_string_is_unknown() {
        let tokens = tokenize("'abc");
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn test_classify_temporal() {
        assert_eq!(classify_temporal("2024-01-01"), TokenKind::Date);
        assert_eq!(classify_temporal("2024-01-01T10:00:00Z"), TokenKind::DateTime);
        assert_eq!(classify_temporal("T10:00"), TokenKind::Time);
    }

    #[test]
    fn test_unterminated_block_comment_runs_to_end() {
        assert_eq!(kinds("a /* never closed"), vec![TokenKind::Identifier, TokenKind::Eof]);
    }
}
