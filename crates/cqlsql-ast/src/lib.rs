//! Abstract syntax tree for measure logic documents
//!
//! A [`Library`] holds header metadata, terminology and parameter
//! declarations, and an ordered list of [`Define`] statements. Expressions
//! are a closed [`Expression`] enum; every consumer matches it exhaustively.

mod expression;
mod library;
mod literal;
mod operator;
mod query;

pub use expression::*;
pub use library::*;
pub use literal::*;
pub use operator::*;
pub use query::*;

/// Type alias for boxed expressions
pub type BoxExpr = Box<Expression>;

/// Type alias for optional boxed expressions
pub type OptBoxExpr = Option<Box<Expression>>;
