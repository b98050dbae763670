//! Record and table addressing types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// One row: field name to JSON value, in stored field order.
pub type Record = Map<String, Value>;

/// Fully qualified table identity: tenant / database / table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableAddress {
    pub tenant: String,
    pub database: String,
    pub table: String,
}

impl TableAddress {
    pub fn new(
        tenant: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.database, self.table)
    }
}

/// String form of a field value used by comparisons and group keys.
///
/// Missing fields render as the empty string, strings render unquoted and
/// every other value renders as its compact JSON text (`30`, `2.5`, `true`,
/// `null`).
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Convert a JSON object value into a `Record`.
///
/// Returns `None` for anything that is not an object.
pub fn as_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values.
///
/// Values of the same type compare naturally (numbers numerically, strings
/// lexicographically, arrays element-wise). Values of different types order
/// by type: null < bool < number < string < array < object.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(None), "");
        assert_eq!(display_value(Some(&json!("Alice"))), "Alice");
        assert_eq!(display_value(Some(&json!(30))), "30");
        assert_eq!(display_value(Some(&json!(true))), "true");
        assert_eq!(display_value(Some(&Value::Null)), "null");
    }

    #[test]
    fn test_compare_values_mixed_types() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
        assert_eq!(compare_values(&json!(100), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&Value::Null, &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
    }

    #[test]
    fn test_table_address_display() {
        let addr = TableAddress::new("acme", "crm", "users");
        assert_eq!(addr.to_string(), "acme/crm/users");
    }
}
