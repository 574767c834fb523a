//! Lexer and recursive-descent parser for measure logic documents
//!
//! [`tokenize`] never fails; unrecognised input becomes `Unknown` tokens.
//! The parser is fail-fast: the first structurally invalid construct is
//! returned as a syntax error and no partial tree is produced.

mod expression;
mod lexer;
mod library;
mod parser;
mod token;

pub use lexer::tokenize;
pub use library::{parse, parse_expression, parse_tokens};
pub use parser::Parser;
pub use token::{Keyword, Token, TokenKind};
