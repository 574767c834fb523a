//! Query and retrieve AST nodes

use crate::{BoxExpr, OptBoxExpr};

/// Bracketed resource reference: `[Type]` or `[Type: codeFilter]`
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceReference {
    /// Resource type name (`Condition`, `Observation`, ...)
    pub resource_type: String,
    /// Value set, code or text filter after the colon
    pub code_filter: OptBoxExpr,
}

/// Query expression
///
/// `source` is either a [`ResourceReference`] or an identifier naming an
/// earlier definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub source: BoxExpr,
    pub alias: Option<String>,
    pub relationships: Vec<RelationshipClause>,
    pub where_clause: OptBoxExpr,
    pub return_clause: OptBoxExpr,
}

impl Query {
    /// Resource reference of the source, if the source is a retrieve
    pub fn resource(&self) -> Option<&ResourceReference> {
        match self.source.as_ref() {
            crate::Expression::ResourceReference(r) => Some(r),
            _ => None,
        }
    }
}

/// Kind of relationship clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    With,
    Without,
}

/// `with`/`without` relationship clause
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipClause {
    pub kind: RelationshipKind,
    pub source: BoxExpr,
    pub alias: Option<String>,
    /// `such that` condition
    pub condition: OptBoxExpr,
}
