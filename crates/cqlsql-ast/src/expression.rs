//! Expression AST nodes

use crate::{
    BinaryOp, BoxExpr, DurationUnit, Literal, OffsetBound, OptBoxExpr, Query, ResourceReference,
    TimingDirection, UnaryOp,
};

/// All expression shapes
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // === Literals ===
    /// Literal value (null, boolean, number, string, date, quantity)
    Literal(Literal),

    // === References ===
    /// Reference to a definition, parameter, terminology or query alias
    Identifier(Identifier),
    /// Property access (`expr.member`)
    MemberAccess(MemberAccess),
    /// Function invocation
    FunctionCall(FunctionCall),

    // === Operators ===
    Binary(BinaryExpr),
    Unary(UnaryExpr),
    /// Duration-bounded timing (`A 3 days or less before B`)
    Timing(TimingExpr),

    // === Intervals ===
    Interval(IntervalExpr),

    // === Data access ===
    /// Bracketed resource reference (`[Condition: "Diabetes"]`)
    ResourceReference(ResourceReference),
    /// Query with alias, relationships and filters
    Query(Box<Query>),
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier(Identifier::new(name))
    }

    pub fn literal(literal: Literal) -> Self {
        Self::Literal(literal)
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Self {
        Self::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expression) -> Self {
        Self::Unary(UnaryExpr {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn member(object: Expression, member: impl Into<String>) -> Self {
        Self::MemberAccess(MemberAccess {
            object: Box::new(object),
            member: member.into(),
        })
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Self::FunctionCall(FunctionCall {
            name: name.into(),
            args,
        })
    }

    pub fn resource(resource_type: impl Into<String>, code_filter: Option<Expression>) -> Self {
        Self::ResourceReference(ResourceReference {
            resource_type: resource_type.into(),
            code_filter: code_filter.map(Box::new),
        })
    }

    /// Identifier name, if this is a bare identifier
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Self::Identifier(id) => Some(&id.name),
            _ => None,
        }
    }

    /// Whether the expression yields a boolean by construction
    pub fn is_boolean(&self) -> bool {
        match self {
            Self::Binary(b) => b.op.is_boolean(),
            Self::Unary(u) => u.op.is_boolean(),
            Self::Timing(_) => true,
            Self::Literal(lit) => lit.as_bool().is_some(),
            _ => false,
        }
    }

    /// Short name of the node shape, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Identifier(_) => "identifier",
            Self::MemberAccess(_) => "member access",
            Self::FunctionCall(_) => "function call",
            Self::Binary(_) => "binary expression",
            Self::Unary(_) => "unary expression",
            Self::Timing(_) => "timing expression",
            Self::Interval(_) => "interval",
            Self::ResourceReference(_) => "resource reference",
            Self::Query(_) => "query",
        }
    }
}

/// Identifier reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// Name with quotes removed
    pub name: String,
}

impl Identifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Property access
#[derive(Debug, Clone, PartialEq)]
pub struct MemberAccess {
    pub object: BoxExpr,
    pub member: String,
}

/// Function invocation
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expression>,
}

/// Binary operation expression
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: BoxExpr,
    pub right: BoxExpr,
}

/// Unary operation expression
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub operand: BoxExpr,
}

/// Duration-bounded timing comparison
#[derive(Debug, Clone, PartialEq)]
pub struct TimingExpr {
    pub left: BoxExpr,
    pub right: BoxExpr,
    /// Offset magnitude as written
    pub amount: String,
    pub unit: DurationUnit,
    /// `None` means exactly the offset
    pub bound: Option<OffsetBound>,
    pub direction: TimingDirection,
}

/// Interval constructor with independent boundary closure
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalExpr {
    pub start: OptBoxExpr,
    pub end: OptBoxExpr,
    pub start_closed: bool,
    pub end_closed: bool,
}
