//! Token cursor shared by the statement and expression parsers

use crate::token::{Keyword, Token, TokenKind};
use cqlsql_diagnostics::{CQL0001, CQL0002, CQL0003, CQL0013, CompileError, ErrorCode, Result};

/// Recursive-descent parser over a token stream
///
/// The stream is expected to end with an `Eof` token; one is appended if
/// it does not, so `peek` never runs off the end.
#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Context named by the most recent `context` statement
    pub(crate) context: Option<String>,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let location = tokens.last().map(Token::location).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, "", location));
        }
        Self {
            tokens,
            pos: 0,
            context: None,
        }
    }

    // === Lookahead ===

    pub(crate) fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `n` positions ahead, clamped to the final `Eof`
    pub(crate) fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    pub(crate) fn check_keyword(&self, keyword: Keyword) -> bool {
        self.peek().is_keyword(keyword)
    }

    /// Current token is an identifier spelled `word` (case-insensitive)
    pub(crate) fn check_word(&self, word: &str) -> bool {
        Self::is_word(self.peek(), word)
    }

    pub(crate) fn is_word(token: &Token, word: &str) -> bool {
        token.kind == TokenKind::Identifier && token.literal_text.eq_ignore_ascii_case(word)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.peek().is_eof()
    }

    // === Consumption ===

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn eat_keyword(&mut self, keyword: Keyword) -> bool {
        self.eat(TokenKind::Keyword(keyword))
    }

    pub(crate) fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(CQL0001, kind.describe()))
        }
    }

    pub(crate) fn expect_keyword(&mut self, keyword: Keyword) -> Result<Token> {
        self.expect(TokenKind::Keyword(keyword))
    }

    /// Plain or quoted identifier
    pub(crate) fn expect_name(&mut self) -> Result<String> {
        match self.peek().kind {
            TokenKind::Identifier | TokenKind::QuotedIdentifier => Ok(self.advance().literal_text),
            _ => Err(self.error(CQL0013, "identifier")),
        }
    }

    pub(crate) fn expect_string(&mut self) -> Result<String> {
        Ok(self.expect(TokenKind::String)?.literal_text)
    }

    /// Syntax error at the current token
    ///
    /// The code is replaced by CQL0002 when the current token is `Eof`
    /// and by CQL0003 when it is an unrecognized character.
    pub(crate) fn error(&self, code: ErrorCode, expected: impl Into<String>) -> CompileError {
        let found = self.peek();
        let code = match found.kind {
            TokenKind::Eof => CQL0002,
            TokenKind::Unknown => CQL0003,
            _ => code,
        };
        CompileError::syntax(code, expected, found.describe(), found.location())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenize;

    #[test]
    fn test_peek_is_clamped_to_eof() {
        let parser = Parser::new(tokenize("a"));
        assert_eq!(parser.peek_at(0).kind, TokenKind::Identifier);
        assert!(parser.peek_at(1).is_eof());
        assert!(parser.peek_at(10).is_eof());
    }

    #[test]
    fn test_missing_eof_is_appended() {
        let tokens: Vec<Token> = tokenize("a b").into_iter().filter(|t| !t.is_eof()).collect();
        let mut parser = Parser::new(tokens);
        parser.advance();
        parser.advance();
        assert!(parser.at_end());
        assert!(parser.advance().is_eof());
    }

    #[test]
    fn test_error_at_eof_uses_end_of_input_code() {
        let parser = Parser::new(tokenize(""));
        let err = parser.error(CQL0001, "':'");
        assert_eq!(err.code(), CQL0002);
    }
}
