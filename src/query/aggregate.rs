//! GROUP BY bucketing and aggregate columns.

use crate::types::record::{compare_values, display_value, Record};
use serde_json::{json, Value};
use std::collections::HashMap;

/// Aggregate function kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateKind {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Self::Sum),
            "avg" => Some(Self::Avg),
            "max" => Some(Self::Max),
            "min" => Some(Self::Min),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Max => "max",
            Self::Min => "min",
        }
    }
}

/// One aggregate column requested in the select list, e.g. `avg(price)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub field: String,
}

impl Aggregate {
    /// Parse a select item of the form `fn(field)`.
    pub fn parse(item: &str) -> Option<Self> {
        let item = item.trim();
        let open = item.find('(')?;
        let inner = item.strip_suffix(')')?.get(open + 1..)?;
        let kind = AggregateKind::from_name(item[..open].trim())?;
        let field = inner.trim();
        if field.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            field: field.to_string(),
        })
    }

    /// Output column name, e.g. `avg_price`.
    pub fn column(&self) -> String {
        format!("{}_{}", self.kind.name(), self.field)
    }

    fn compute(&self, bucket: &[&Record]) -> Value {
        match self.kind {
            AggregateKind::Sum => {
                let total: f64 = bucket
                    .iter()
                    .filter_map(|r| numeric_value(r.get(&self.field)))
                    .sum();
                float_value(total)
            }
            AggregateKind::Avg => {
                let values: Vec<f64> = bucket
                    .iter()
                    .filter_map(|r| numeric_value(r.get(&self.field)))
                    .collect();
                if values.is_empty() {
                    json!(0)
                } else {
                    float_value(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            AggregateKind::Max => self
                .raw_values(bucket)
                .into_iter()
                .max_by(|a, b| compare_values(a, b))
                .unwrap_or(Value::Null),
            AggregateKind::Min => self
                .raw_values(bucket)
                .into_iter()
                .min_by(|a, b| compare_values(a, b))
                .unwrap_or(Value::Null),
        }
    }

    /// Field values with missing fields counted as `0`.
    fn raw_values(&self, bucket: &[&Record]) -> Vec<Value> {
        bucket
            .iter()
            .map(|r| r.get(&self.field).cloned().unwrap_or_else(|| json!(0)))
            .collect()
    }
}

/// Numeric value of a field for `sum`/`avg`.
///
/// The value's text form qualifies when removing at most one `.` leaves only
/// digits. Signs, exponents, booleans and missing fields never qualify.
pub fn numeric_value(value: Option<&Value>) -> Option<f64> {
    let text = display_value(value);
    let digits = text.replacen('.', "", 1);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn float_value(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Collapse records into one row per distinct key over `fields`.
///
/// Each output row holds the key fields as strings, `count`, and one column
/// per aggregate. Rows come out in order of each key's first appearance.
pub fn group(records: &[Record], fields: &[String], aggregates: &[Aggregate]) -> Vec<Record> {
    let mut order: Vec<Vec<String>> = Vec::new();
    let mut buckets: HashMap<Vec<String>, Vec<&Record>> = HashMap::new();

    for record in records {
        let key: Vec<String> = fields
            .iter()
            .map(|field| display_value(record.get(field)))
            .collect();
        buckets
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let bucket = buckets.remove(&key)?;
            let mut row = Record::new();
            for (field, value) in fields.iter().zip(key) {
                row.insert(field.clone(), Value::String(value));
            }
            row.insert("count".to_string(), json!(bucket.len()));
            for aggregate in aggregates {
                row.insert(aggregate.column(), aggregate.compute(&bucket));
            }
            Some(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn sales() -> Vec<Record> {
        vec![
            rec(json!({"region": "east", "amount": 10, "note": "a"})),
            rec(json!({"region": "west", "amount": "5.5"})),
            rec(json!({"region": "east", "amount": -3})),
            rec(json!({"region": "east", "amount": "n/a"})),
            rec(json!({"region": "east", "amount": 2.5})),
        ]
    }

    #[test]
    fn test_parse_aggregate() {
        assert_eq!(
            Aggregate::parse("SUM(amount)"),
            Some(Aggregate {
                kind: AggregateKind::Sum,
                field: "amount".to_string()
            })
        );
        assert_eq!(Aggregate::parse("avg( price )").unwrap().column(), "avg_price");
        assert!(Aggregate::parse("amount").is_none());
        assert!(Aggregate::parse("count(x)").is_none());
        assert!(Aggregate::parse("max()").is_none());
    }

    #[test]
    fn test_numeric_inclusion_rule() {
        assert_eq!(numeric_value(Some(&json!(10))), Some(10.0));
        assert_eq!(numeric_value(Some(&json!("5.5"))), Some(5.5));
        assert_eq!(numeric_value(Some(&json!(-3))), None);
        assert_eq!(numeric_value(Some(&json!("1.2.3"))), None);
        assert_eq!(numeric_value(Some(&json!(true))), None);
        assert_eq!(numeric_value(None), None);
    }

    #[test]
    fn test_group_counts_and_aggregates() {
        let aggregates = vec![
            Aggregate::parse("sum(amount)").unwrap(),
            Aggregate::parse("avg(amount)").unwrap(),
            Aggregate::parse("max(amount)").unwrap(),
            Aggregate::parse("min(note)").unwrap(),
        ];
        let rows = group(&sales(), &["region".to_string()], &aggregates);

        assert_eq!(rows.len(), 2);
        let east = &rows[0];
        assert_eq!(east["region"], json!("east"));
        assert_eq!(east["count"], json!(4));
        assert_eq!(east["sum_amount"], json!(12.5));
        assert_eq!(east["avg_amount"], json!(6.25));
        // strings order after numbers
        assert_eq!(east["max_amount"], json!("n/a"));
        // missing fields count as 0, which orders before any string
        assert_eq!(east["min_note"], json!(0));

        let west = &rows[1];
        assert_eq!(west["count"], json!(1));
        assert_eq!(west["sum_amount"], json!(5.5));
    }

    #[test]
    fn test_avg_with_no_numeric_values_is_zero() {
        let records = vec![rec(json!({"k": 1, "v": "x"}))];
        let rows = group(&records, &["k".to_string()], &[Aggregate::parse("avg(v)").unwrap()]);
        assert_eq!(rows[0]["k"], json!("1"));
        assert_eq!(rows[0]["avg_v"], json!(0));
    }

    proptest! {
        #[test]
        fn prop_regrouping_keeps_key_set(keys in proptest::collection::vec(0u8..5, 0..40)) {
            let records: Vec<Record> = keys.iter().map(|k| rec(json!({"k": k}))).collect();
            let fields = vec!["k".to_string()];

            let once = group(&records, &fields, &[]);
            let twice = group(&once, &fields, &[]);

            let once_keys: Vec<_> = once.iter().map(|r| r["k"].clone()).collect();
            let twice_keys: Vec<_> = twice.iter().map(|r| r["k"].clone()).collect();
            prop_assert_eq!(once_keys, twice_keys);

            let total: u64 = once.iter().map(|r| r["count"].as_u64().unwrap()).sum();
            prop_assert_eq!(total as usize, records.len());
        }
    }
}
