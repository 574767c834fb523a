//! Operator translation
//!
//! Backends lower operands first and hand the text to these functions.
//! An operand may carry interval bounds, which membership and timing
//! operators compare against instead of the operand's own text.

use cqlsql_ast::{BinaryOp, DurationUnit, OffsetBound, TimingDirection};

/// Lowered interval ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bounds {
    pub low: String,
    pub high: String,
    pub low_closed: bool,
    pub high_closed: bool,
}

impl Bounds {
    pub fn closed(low: impl Into<String>, high: impl Into<String>) -> Self {
        Self {
            low: low.into(),
            high: high.into(),
            low_closed: true,
            high_closed: true,
        }
    }
}

/// A lowered operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub sql: String,
    pub bounds: Option<Bounds>,
}

impl Operand {
    pub fn value(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bounds: None,
        }
    }

    pub fn interval(bounds: Bounds) -> Self {
        Self {
            sql: bounds.low.clone(),
            bounds: Some(bounds),
        }
    }

    fn low(&self) -> &str {
        self.bounds.as_ref().map_or(&self.sql, |b| &b.low)
    }

    fn high(&self) -> &str {
        self.bounds.as_ref().map_or(&self.sql, |b| &b.high)
    }
}

pub fn comparison_symbol(op: BinaryOp) -> Option<&'static str> {
    let symbol = match op {
        BinaryOp::Equal | BinaryOp::Equivalent => "=",
        BinaryOp::NotEqual => "<>",
        BinaryOp::Less => "<",
        BinaryOp::Greater => ">",
        BinaryOp::LessOrEqual => "<=",
        BinaryOp::GreaterOrEqual => ">=",
        _ => return None,
    };
    Some(symbol)
}

pub fn arithmetic_symbol(op: BinaryOp) -> Option<&'static str> {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Concatenate => "||",
        _ => return None,
    };
    Some(symbol)
}

pub fn set_keyword(op: BinaryOp) -> Option<&'static str> {
    let keyword = match op {
        BinaryOp::Union => "UNION",
        BinaryOp::Except => "EXCEPT",
        BinaryOp::Intersect => "INTERSECT",
        _ => return None,
    };
    Some(keyword)
}

/// `value` inside `bounds`, honouring open ends
pub fn within(value: &str, bounds: &Bounds) -> String {
    if bounds.low_closed && bounds.high_closed {
        return format!("{value} BETWEEN {} AND {}", bounds.low, bounds.high);
    }
    let low = if bounds.low_closed { ">=" } else { ">" };
    let high = if bounds.high_closed { "<=" } else { "<" };
    format!("({value} {low} {} AND {value} {high} {})", bounds.low, bounds.high)
}

pub fn binary(op: BinaryOp, left: &Operand, right: &Operand) -> String {
    match op {
        BinaryOp::And => format!("{} AND {}", left.sql, right.sql),
        BinaryOp::Or => format!("({} OR {})", left.sql, right.sql),
        BinaryOp::In | BinaryOp::During => match (&left.bounds, &right.bounds) {
            (Some(inner), Some(outer)) => {
                format!("({} AND {})", within(&inner.low, outer), within(&inner.high, outer))
            }
            (None, Some(outer)) => within(&left.sql, outer),
            _ if op == BinaryOp::In => format!("{} IN ({})", left.sql, right.sql),
            _ => format!("{} = {}", left.sql, right.sql),
        },
        BinaryOp::Overlaps => match (&left.bounds, &right.bounds) {
            (Some(l), Some(r)) => format!("({} <= {} AND {} >= {})", l.low, r.high, l.high, r.low),
            (None, Some(outer)) => within(&left.sql, outer),
            _ => format!("{} = {}", left.sql, right.sql),
        },
        BinaryOp::Before => format!("{} < {}", left.high(), right.low()),
        BinaryOp::OnOrBefore => format!("{} <= {}", left.high(), right.low()),
        BinaryOp::After => format!("{} > {}", left.low(), right.high()),
        BinaryOp::OnOrAfter => format!("{} >= {}", left.low(), right.high()),
        BinaryOp::Starts => format!("{} = {}", left.low(), right.low()),
        BinaryOp::Ends => format!("{} = {}", left.high(), right.high()),
        BinaryOp::Union | BinaryOp::Except | BinaryOp::Intersect => {
            let keyword = set_keyword(op).unwrap_or("UNION");
            format!("{} {keyword} {}", left.sql, right.sql)
        }
        BinaryOp::Concatenate => format!("{} || {}", left.sql, right.sql),
        _ => {
            if let Some(symbol) = comparison_symbol(op) {
                format!("{} {symbol} {}", left.sql, right.sql)
            } else {
                let symbol = arithmetic_symbol(op).unwrap_or("+");
                format!("({} {symbol} {})", left.sql, right.sql)
            }
        }
    }
}

/// Duration-bounded comparison: `A 3 days or less before B`
pub fn timing_window(
    left: &Operand,
    right: &Operand,
    amount: &str,
    unit: DurationUnit,
    bound: Option<OffsetBound>,
    direction: TimingDirection,
) -> String {
    let difference = match direction {
        TimingDirection::Before => {
            format!("julianday({}) - julianday({})", right.low(), left.sql)
        }
        TimingDirection::After => {
            format!("julianday({}) - julianday({})", left.sql, right.high())
        }
    };
    let span = match unit {
        DurationUnit::Day => amount.to_string(),
        unit => format!("{amount} * {}", unit.days()),
    };
    match bound {
        Some(OffsetBound::OrLess) => format!("{difference} BETWEEN 0 AND {span}"),
        Some(OffsetBound::OrMore) => format!("{difference} >= {span}"),
        None => format!("{difference} = {span}"),
    }
}

/// Calendar arithmetic on a date: `date(x, '-1 years')`
pub fn date_shift(base: &str, op: BinaryOp, amount: &str, unit: DurationUnit) -> String {
    let sign = if op == BinaryOp::Subtract { "-" } else { "+" };
    let (amount, unit) = match unit {
        DurationUnit::Week => match amount.parse::<f64>() {
            Ok(weeks) => ((weeks * 7.0).to_string(), "days"),
            Err(_) => (amount.to_string(), "days"),
        },
        DurationUnit::Day => (amount.to_string(), "days"),
        DurationUnit::Month => (amount.to_string(), "months"),
        DurationUnit::Year => (amount.to_string(), "years"),
    };
    format!("date({base}, '{sign}{amount} {unit}')")
}

pub fn not(operand: &str) -> String {
    format!("NOT ({operand})")
}

pub fn is_null(operand: &str) -> String {
    format!("{operand} IS NULL")
}

pub fn is_not_null(operand: &str) -> String {
    format!("{operand} IS NOT NULL")
}

pub fn negate(operand: &str) -> String {
    if operand.starts_with('-') {
        format!("-({operand})")
    } else {
        format!("-{operand}")
    }
}

/// `EXISTS` over a set expression
pub fn exists(set: &str) -> String {
    if set.starts_with("SELECT") {
        format!("EXISTS ({set})")
    } else {
        format!("EXISTS (SELECT {set})")
    }
}

/// Membership of the current patient in a set
pub fn patient_in(patient: &str, set: &str) -> String {
    format!("{patient} IN ({set})")
}
