//! Single-expression comparator and exact-match filtering.
//!
//! A condition is one `field <op> literal` comparison with `op` one of `>`,
//! `<` or `=`, each surrounded by single spaces. The operator is chosen by
//! priority (`>` then `<` then `=`), not by position in the text. Anything
//! that does not parse as a single comparison matches every record.

use crate::types::record::{display_value, Record};
use serde_json::Value;
use std::fmt;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    Less,
    Equal,
}

impl Comparison {
    /// Operators in matching priority, with the exact text searched for.
    const PRIORITY: [(Comparison, &'static str); 3] = [
        (Comparison::Greater, " > "),
        (Comparison::Less, " < "),
        (Comparison::Equal, " = "),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::Less => "<",
            Self::Equal => "=",
        }
    }
}

/// Parsed condition expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Empty text, no operator, or an ambiguous split: matches everything.
    Always,
    Compare {
        field: String,
        op: Comparison,
        literal: String,
    },
}

impl Condition {
    /// Parse condition text. Never fails.
    pub fn parse(expression: &str) -> Self {
        let Some((op, needle)) = Comparison::PRIORITY
            .iter()
            .find(|(_, needle)| expression.contains(needle))
        else {
            return Self::Always;
        };

        let mut parts = expression.split(needle);
        let (Some(field), Some(literal), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Self::Always;
        };

        Self::Compare {
            field: field.trim().to_string(),
            op: *op,
            literal: strip_quotes(literal.trim()).to_string(),
        }
    }

    /// Evaluate against one record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::Always => true,
            Self::Compare { field, op, literal } => match op {
                Comparison::Equal => display_value(record.get(field)) == *literal,
                Comparison::Greater => match numeric_operand(record.get(field)) {
                    Some(value) => value > lower_bound(literal),
                    None => true,
                },
                Comparison::Less => match numeric_operand(record.get(field)) {
                    Some(value) => value < upper_bound(literal),
                    None => true,
                },
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "<always>"),
            Self::Compare { field, op, literal } => {
                write!(f, "{} {} {}", field, op.symbol(), literal)
            }
        }
    }
}

/// Evaluate condition text against one record.
pub fn matches(record: &Record, expression: &str) -> bool {
    Condition::parse(expression).matches(record)
}

/// Every key of `conditions` is present in `record` with an equal value.
///
/// An empty condition map matches every record.
pub fn exact_match(record: &Record, conditions: &Record) -> bool {
    conditions
        .iter()
        .all(|(key, expected)| record.get(key) == Some(expected))
}

fn strip_quotes(literal: &str) -> &str {
    literal.trim_matches(|c| c == '\'' || c == '"')
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Non-numeric literals compare against `0`.
fn lower_bound(literal: &str) -> f64 {
    if is_ascii_digits(literal) {
        literal.parse().unwrap_or(0.0)
    } else {
        0.0
    }
}

/// Non-numeric literals compare against infinity.
fn upper_bound(literal: &str) -> f64 {
    if is_ascii_digits(literal) {
        literal.parse().unwrap_or(f64::INFINITY)
    } else {
        f64::INFINITY
    }
}

/// Record side of an ordering comparison.
///
/// Missing fields count as `0` and booleans as `0`/`1`. Strings, nulls and
/// nested values are not comparable with a number; `None` makes the
/// comparison pass.
fn numeric_operand(value: Option<&Value>) -> Option<f64> {
    match value {
        None => Some(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::Bool(b)) => Some(if *b { 1.0 } else { 0.0 }),
        Some(_) => None,
    }
}
