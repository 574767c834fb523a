//! Library-level statement parsing
//!
//! Sections appear in a fixed order, each optional and repeatable:
//! `library` header, `using`, `include ... called`, terminology and
//! `parameter` declarations, then `context` and `define` statements.

use crate::parser::Parser;
use crate::token::{Keyword, Token, TokenKind};
use crate::tokenize;
use cqlsql_ast::{
    CodeDefinition, CodesystemDefinition, Define, Expression, IncludeDefinition, Library,
    Parameter, UsingDefinition, ValuesetDefinition,
};
use cqlsql_diagnostics::{CQL0001, CQL0017, CQL0020, CQL0022, Result};

/// Parse source text into a [`Library`]
pub fn parse(source: &str) -> Result<Library> {
    parse_tokens(tokenize(source))
}

/// Parse a token stream into a [`Library`], failing on the first syntax error
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Library> {
    let mut parser = Parser::new(tokens);
    let library = parser.library()?;
    log::debug!(
        "parsed library {:?} with {} definitions",
        library.identifier,
        library.defines.len()
    );
    Ok(library)
}

/// Parse a single expression, requiring the whole input to be consumed
pub fn parse_expression(source: &str) -> Result<Expression> {
    let mut parser = Parser::new(tokenize(source));
    let expr = parser.expression()?;
    if !parser.at_end() {
        return Err(parser.error(CQL0001, "end of input"));
    }
    Ok(expr)
}

impl Parser {
    pub(crate) fn library(&mut self) -> Result<Library> {
        let mut library = Library::new();

        if self.check_keyword(Keyword::Library) {
            let header = self.advance();
            library.identifier = Some(self.expect_name().map_err(|_| self.error(CQL0017, "library name"))?);
            library.version = self.version()?;
            library.location = Some(header.location());
        }

        while self.eat_keyword(Keyword::Using) {
            let model = self.expect_name()?;
            let version = self.version()?;
            library.usings.push(UsingDefinition { model, version });
        }

        while self.eat_keyword(Keyword::Include) {
            let name = self.expect_name()?;
            let version = self.version()?;
            let alias = if self.eat_keyword(Keyword::Called) {
                Some(self.expect_name()?)
            } else {
                None
            };
            library.includes.push(IncludeDefinition {
                library: name,
                version,
                alias,
            });
        }

        loop {
            match self.peek().kind {
                TokenKind::Keyword(Keyword::Codesystem) => {
                    let def = self.codesystem()?;
                    library.codesystems.push(def);
                }
                TokenKind::Keyword(Keyword::Valueset) => {
                    let def = self.valueset()?;
                    library.valuesets.push(def);
                }
                TokenKind::Keyword(Keyword::Code) => {
                    let def = self.code()?;
                    library.codes.push(def);
                }
                TokenKind::Keyword(Keyword::Parameter) => {
                    let def = self.parameter()?;
                    library.parameters.push(def);
                }
                _ => break,
            }
        }

        loop {
            match self.peek().kind {
                TokenKind::Keyword(Keyword::Context) => self.context_statement()?,
                TokenKind::Keyword(Keyword::Define) => {
                    let def = self.define()?;
                    library.defines.push(def);
                }
                TokenKind::Eof => break,
                _ => return Err(self.error(CQL0001, "'define'")),
            }
        }

        Ok(library)
    }

    fn version(&mut self) -> Result<Option<String>> {
        if self.eat_keyword(Keyword::Version) {
            Ok(Some(self.expect_string()?))
        } else {
            Ok(None)
        }
    }

    fn codesystem(&mut self) -> Result<CodesystemDefinition> {
        let location = self.advance().location();
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let uri = self
            .expect_string()
            .map_err(|_| self.error(CQL0022, "codesystem URI string"))?;
        let version = self.version()?;
        Ok(CodesystemDefinition {
            name,
            uri,
            version,
            location,
        })
    }

    fn valueset(&mut self) -> Result<ValuesetDefinition> {
        let location = self.advance().location();
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let uri = self
            .expect_string()
            .map_err(|_| self.error(CQL0022, "valueset URI string"))?;
        // version is accepted but membership is keyed by URI only
        self.version()?;
        Ok(ValuesetDefinition {
            name,
            uri,
            location,
        })
    }

    fn code(&mut self) -> Result<CodeDefinition> {
        let location = self.advance().location();
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let code = self
            .expect_string()
            .map_err(|_| self.error(CQL0022, "code string"))?;
        self.expect_keyword(Keyword::From)?;
        let system = self.expect_name()?;
        let display = if self.eat_keyword(Keyword::Display) {
            Some(self.expect_string()?)
        } else {
            None
        };
        Ok(CodeDefinition {
            name,
            code,
            system,
            display,
            location,
        })
    }

    /// `parameter "Name" <type tokens> [default <expr>]`
    fn parameter(&mut self) -> Result<Parameter> {
        let location = self.advance().location();
        let name = self
            .expect_name()
            .map_err(|_| self.error(CQL0020, "parameter name"))?;

        let mut type_tokens = Vec::new();
        while !self.at_end() && !self.check_keyword(Keyword::Default) && !self.at_statement_start() {
            type_tokens.push(self.advance());
        }
        let data_type = (!type_tokens.is_empty()).then(|| join_type_tokens(&type_tokens));

        let default = if self.eat_keyword(Keyword::Default) {
            Some(self.expression()?)
        } else {
            None
        };

        Ok(Parameter {
            name,
            data_type,
            default,
            location,
        })
    }

    fn context_statement(&mut self) -> Result<()> {
        self.advance();
        self.context = Some(self.expect_name()?);
        Ok(())
    }

    /// `define [public|private] "Name": <expr>`
    fn define(&mut self) -> Result<Define> {
        let location = self.advance().location();
        if (self.check_word("public") || self.check_word("private"))
            && matches!(
                self.peek_at(1).kind,
                TokenKind::Identifier | TokenKind::QuotedIdentifier
            )
        {
            self.advance();
        }
        let name = self.expect_name()?;
        self.expect(TokenKind::Colon)?;
        let expression = self.expression()?;
        Ok(Define {
            name,
            expression,
            context: self.context.clone(),
            location,
        })
    }

    fn at_statement_start(&self) -> bool {
        match self.peek().kind {
            TokenKind::Keyword(kw) => kw.starts_statement(),
            _ => false,
        }
    }
}

/// Rebuild a type specifier from its tokens, spacing only between words
fn join_type_tokens(tokens: &[Token]) -> String {
    let is_word = |t: &Token| {
        matches!(
            t.kind,
            TokenKind::Identifier | TokenKind::QuotedIdentifier | TokenKind::Keyword(_)
        )
    };
    let mut text = String::new();
    let mut prev_word = false;
    for token in tokens {
        let word = is_word(token);
        if word && prev_word {
            text.push(' ');
        }
        text.push_str(&token.literal_text);
        prev_word = word;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_type_tokens() {
        let tokens = tokenize("Interval<DateTime>");
        assert_eq!(join_type_tokens(&tokens[..4]), "Interval<DateTime>");
        let tokens = tokenize("List<Tuple { a Integer }>");
        let without_eof = &tokens[..tokens.len() - 1];
        assert_eq!(join_type_tokens(without_eof), "List<Tuple{a Integer}>");
    }
}
