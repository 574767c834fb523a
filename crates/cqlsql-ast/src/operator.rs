//! Operators with precedence information

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
///
/// Precedence follows the parser's cascade: logical-or binds loosest,
/// multiplicative binds tightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    // Precedence 1 (lowest)
    /// Logical or
    Or,

    // Precedence 2
    /// Logical and
    And,

    // Precedence 3
    /// Equality
    Equal,
    /// Inequality
    NotEqual,
    /// Equivalence (`~`)
    Equivalent,
    /// Less than
    Less,
    /// Greater than
    Greater,
    /// Less than or equal
    LessOrEqual,
    /// Greater than or equal
    GreaterOrEqual,

    // Precedence 4 - temporal and membership
    /// Membership (value in value set / interval)
    In,
    /// Interval containment of a point or interval
    During,
    Before,
    After,
    OnOrBefore,
    OnOrAfter,
    Overlaps,
    /// Shares a start point
    Starts,
    /// Shares an end point
    Ends,

    // Precedence 5 - additive and set operations
    Add,
    Subtract,
    /// String concatenation (`&`)
    Concatenate,
    Union,
    Except,
    Intersect,

    // Precedence 6 (highest for binary)
    Multiply,
    Divide,
}

impl BinaryOp {
    /// Get the precedence level (1 = lowest)
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Equal
            | Self::NotEqual
            | Self::Equivalent
            | Self::Less
            | Self::Greater
            | Self::LessOrEqual
            | Self::GreaterOrEqual => 3,
            Self::In
            | Self::During
            | Self::Before
            | Self::After
            | Self::OnOrBefore
            | Self::OnOrAfter
            | Self::Overlaps
            | Self::Starts
            | Self::Ends => 4,
            Self::Add
            | Self::Subtract
            | Self::Concatenate
            | Self::Union
            | Self::Except
            | Self::Intersect => 5,
            Self::Multiply | Self::Divide => 6,
        }
    }

    /// Source spelling
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::Equivalent => "~",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessOrEqual => "<=",
            Self::GreaterOrEqual => ">=",
            Self::In => "in",
            Self::During => "during",
            Self::Before => "before",
            Self::After => "after",
            Self::OnOrBefore => "on or before",
            Self::OnOrAfter => "on or after",
            Self::Overlaps => "overlaps",
            Self::Starts => "starts",
            Self::Ends => "ends",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Concatenate => "&",
            Self::Union => "union",
            Self::Except => "except",
            Self::Intersect => "intersect",
            Self::Multiply => "*",
            Self::Divide => "/",
        }
    }

    /// Operators whose result is a boolean
    pub const fn is_boolean(&self) -> bool {
        matches!(self.precedence(), 1..=4)
    }

    pub const fn is_temporal(&self) -> bool {
        self.precedence() == 4
    }

    pub const fn is_set_operation(&self) -> bool {
        matches!(self, Self::Union | Self::Except | Self::Intersect)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Logical not
    Not,
    /// Non-empty test
    Exists,
    /// Arithmetic negation
    Negate,
    /// `start of` an interval
    StartOf,
    /// `end of` an interval
    EndOf,
    /// Postfix `is null`
    IsNull,
    /// Postfix `is not null`
    IsNotNull,
}

impl UnaryOp {
    pub const fn symbol(&self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Exists => "exists",
            Self::Negate => "-",
            Self::StartOf => "start of",
            Self::EndOf => "end of",
            Self::IsNull => "is null",
            Self::IsNotNull => "is not null",
        }
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self, Self::Not | Self::Exists | Self::IsNull | Self::IsNotNull)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Direction of a duration-bounded timing comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingDirection {
    Before,
    After,
}

/// `or less` / `or more` qualifier of a duration-bounded comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetBound {
    OrLess,
    OrMore,
}

/// Calendar unit of a duration offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DurationUnit {
    Day,
    Week,
    Month,
    Year,
}

impl DurationUnit {
    /// Parse a unit keyword, singular or plural, case-insensitive
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word.to_ascii_lowercase().as_str() {
            "day" | "days" => Some(Self::Day),
            "week" | "weeks" => Some(Self::Week),
            "month" | "months" => Some(Self::Month),
            "year" | "years" => Some(Self::Year),
            _ => None,
        }
    }

    /// Fixed length in days used for window arithmetic
    pub const fn days(&self) -> &'static str {
        match self {
            Self::Day => "1",
            Self::Week => "7",
            Self::Month => "30",
            Self::Year => "365.25",
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Day => "days",
            Self::Week => "weeks",
            Self::Month => "months",
            Self::Year => "years",
        };
        f.write_str(s)
    }
}
