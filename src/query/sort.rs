//! ORDER BY stage.

use crate::types::record::{compare_values, Record};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction for one ORDER BY item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub field: String,
    pub direction: Direction,
}

impl OrderItem {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }
}

/// Sort key for one field: missing fields become `""` and numeric-looking
/// strings become numbers.
fn key_value(record: &Record, field: &str) -> Value {
    match record.get(field) {
        None => Value::String(String::new()),
        Some(Value::String(s)) => numeric_string(s)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(s.clone())),
        Some(other) => other.clone(),
    }
}

/// A string whose digits remain after dropping `.` and `-` is read as a float.
fn numeric_string(s: &str) -> Option<f64> {
    let digits: String = s.chars().filter(|c| *c != '.' && *c != '-').collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| compare_values(x, y))
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Stable sort by the concatenated keys of `items`.
///
/// Direction is a single flag for the whole sort: if any item asks for
/// `Desc`, the complete multi-key order is reversed. Records with equal keys
/// keep their input order either way.
pub fn sort(records: Vec<Record>, items: &[OrderItem]) -> Vec<Record> {
    if items.is_empty() {
        return records;
    }
    let descending = items.iter().any(|item| item.direction == Direction::Desc);

    let mut keyed: Vec<(Vec<Value>, Record)> = records
        .into_iter()
        .map(|record| {
            let key = items
                .iter()
                .map(|item| key_value(&record, &item.field))
                .collect();
            (key, record)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| {
        let ord = compare_keys(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    keyed.into_iter().map(|(_, record)| record).collect()
}
