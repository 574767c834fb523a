//! Literal values
//!
//! Literals keep their source text; numeric and temporal values are never
//! normalised so generated SQL reproduces them exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type of a literal value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiteralType {
    Null,
    Boolean,
    Integer,
    Decimal,
    String,
    Date,
    DateTime,
    Time,
    /// Number with a unit (`3 days`, `5 'mg'`)
    Quantity,
}

impl fmt::Display for LiteralType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Integer => "Integer",
            Self::Decimal => "Decimal",
            Self::String => "String",
            Self::Date => "Date",
            Self::DateTime => "DateTime",
            Self::Time => "Time",
            Self::Quantity => "Quantity",
        };
        f.write_str(s)
    }
}

/// A literal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub value_type: LiteralType,
    /// Source text without quotes or the `@` prefix
    pub value: String,
    /// Unit of a quantity literal
    pub unit: Option<String>,
}

impl Literal {
    pub fn new(value_type: LiteralType, value: impl Into<String>) -> Self {
        Self {
            value_type,
            value: value.into(),
            unit: None,
        }
    }

    pub fn null() -> Self {
        Self::new(LiteralType::Null, "null")
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(LiteralType::Boolean, if value { "true" } else { "false" })
    }

    pub fn integer(value: impl Into<String>) -> Self {
        Self::new(LiteralType::Integer, value)
    }

    pub fn decimal(value: impl Into<String>) -> Self {
        Self::new(LiteralType::Decimal, value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(LiteralType::String, value)
    }

    pub fn quantity(value: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            value_type: LiteralType::Quantity,
            value: value.into(),
            unit: Some(unit.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.value_type == LiteralType::Null
    }

    /// Boolean value, if this is a boolean literal
    pub fn as_bool(&self) -> Option<bool> {
        match (self.value_type, self.value.as_str()) {
            (LiteralType::Boolean, "true") => Some(true),
            (LiteralType::Boolean, "false") => Some(false),
            _ => None,
        }
    }
}
