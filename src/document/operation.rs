//! Document-style verbs over the record store.

use super::crud;
use crate::storage::TableStore;
use crate::types::error::{EngineError, Result};
use crate::types::record::{as_record, Record, TableAddress};
use crate::types::response::OperationResult;
use serde_json::Value;
use tracing::warn;

/// One document operation, parsed from a descriptor like `{"find": {...}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOperation {
    Find(Record),
    InsertOne(Record),
    /// Documents as given; non-object entries fail individually
    InsertMany(Vec<Value>),
    UpdateOne { filter: Record, update: Record },
    UpdateMany { filter: Record, update: Record },
    DeleteOne(Record),
    DeleteMany(Record),
    /// Pipeline stages, echoed back but not interpreted
    Aggregate(Value),
}

/// Verbs in the order a descriptor is checked for them.
const VERBS: [&str; 8] = [
    "find",
    "insertOne",
    "insertMany",
    "updateOne",
    "updateMany",
    "deleteOne",
    "deleteMany",
    "aggregate",
];

impl DocumentOperation {
    /// Parse a descriptor.
    ///
    /// When several verb keys are present the first in check order wins.
    pub fn from_value(descriptor: &Value) -> Result<Self> {
        let map = descriptor
            .as_object()
            .ok_or_else(|| EngineError::malformed("Document operation must be an object"))?;

        let (verb, payload) = VERBS
            .iter()
            .find_map(|verb| map.get(*verb).map(|payload| (*verb, payload)))
            .ok_or_else(|| {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                EngineError::unsupported(format!("document operation {:?}", keys))
            })?;

        let op = match verb {
            "find" => Self::Find(object_or_empty(verb, payload)?),
            "insertOne" => Self::InsertOne(object(verb, payload)?),
            "insertMany" => Self::InsertMany(
                payload
                    .as_array()
                    .cloned()
                    .ok_or_else(|| EngineError::malformed("insertMany expects an array"))?,
            ),
            "updateOne" => {
                let (filter, update) = filter_and_update(verb, payload)?;
                Self::UpdateOne { filter, update }
            }
            "updateMany" => {
                let (filter, update) = filter_and_update(verb, payload)?;
                Self::UpdateMany { filter, update }
            }
            "deleteOne" => Self::DeleteOne(object_or_empty(verb, payload)?),
            "deleteMany" => Self::DeleteMany(object_or_empty(verb, payload)?),
            _ => Self::Aggregate(payload.clone()),
        };
        Ok(op)
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Find(_) => "find",
            Self::InsertOne(_) => "insertOne",
            Self::InsertMany(_) => "insertMany",
            Self::UpdateOne { .. } => "updateOne",
            Self::UpdateMany { .. } => "updateMany",
            Self::DeleteOne(_) => "deleteOne",
            Self::DeleteMany(_) => "deleteMany",
            Self::Aggregate(_) => "aggregate",
        }
    }
}

fn object(verb: &str, payload: &Value) -> Result<Record> {
    as_record(payload.clone())
        .ok_or_else(|| EngineError::malformed(format!("{} expects an object", verb)))
}

fn object_or_empty(verb: &str, payload: &Value) -> Result<Record> {
    if payload.is_null() {
        Ok(Record::new())
    } else {
        object(verb, payload)
    }
}

fn filter_and_update(verb: &str, payload: &Value) -> Result<(Record, Record)> {
    let body = object(verb, payload)?;
    let null = Value::Null;
    let filter = object_or_empty(verb, body.get("filter").unwrap_or(&null))?;
    let update = object_or_empty(verb, body.get("update").unwrap_or(&null))?;
    Ok((filter, update))
}

/// Runs document operations against one table.
pub struct DocumentAdapter<'a> {
    store: &'a TableStore,
}

impl<'a> DocumentAdapter<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self { store }
    }

    pub fn execute(&self, addr: &TableAddress, op: DocumentOperation) -> Result<OperationResult> {
        let mut result = OperationResult::ok().with_query_type(op.verb());

        match op {
            DocumentOperation::Find(filter) => {
                let documents = to_values(crud::find(self.store, addr, &filter)?);
                result.count = Some(documents.len());
                result.documents = Some(documents);
            }
            DocumentOperation::InsertOne(doc) => {
                crud::insert(self.store, addr, &doc)?;
                result.inserted_count = Some(1);
            }
            DocumentOperation::InsertMany(docs) => {
                result.inserted_count = Some(self.insert_many(addr, docs));
            }
            DocumentOperation::UpdateOne { filter, update } => {
                let n = crud::update(self.store, addr, &filter, &update, false)?;
                result.modified_count = Some(n.min(1));
            }
            DocumentOperation::UpdateMany { filter, update } => {
                let n = crud::update(self.store, addr, &filter, &update, false)?;
                result.modified_count = Some(n);
            }
            DocumentOperation::DeleteOne(filter) | DocumentOperation::DeleteMany(filter) => {
                result.deleted_count = Some(crud::delete(self.store, addr, &filter)?);
            }
            DocumentOperation::Aggregate(pipeline) => {
                let documents = to_values(self.store.load_all(addr)?);
                result.count = Some(documents.len());
                result.documents = Some(documents);
                result.pipeline = Some(pipeline);
            }
        }
        Ok(result)
    }

    /// Insert each document independently; returns how many succeeded.
    fn insert_many(&self, addr: &TableAddress, docs: Vec<Value>) -> usize {
        let mut inserted = 0;
        for (i, doc) in docs.into_iter().enumerate() {
            let outcome = as_record(doc)
                .ok_or_else(|| EngineError::malformed("document is not an object"))
                .and_then(|record| crud::insert(self.store, addr, &record));
            match outcome {
                Ok(()) => inserted += 1,
                Err(e) => warn!("insertMany into {} skipped document {}: {}", addr, i, e),
            }
        }
        inserted
    }
}

fn to_values(records: Vec<Record>) -> Vec<Value> {
    records.into_iter().map(Value::Object).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_verbs() {
        let op = DocumentOperation::from_value(&json!({"find": {"age": 25}})).unwrap();
        assert_eq!(op.verb(), "find");

        let op = DocumentOperation::from_value(&json!({
            "updateOne": {"filter": {"name": "a"}, "update": {"age": 2}}
        }))
        .unwrap();
        assert_eq!(
            op,
            DocumentOperation::UpdateOne {
                filter: json!({"name": "a"}).as_object().cloned().unwrap(),
                update: json!({"age": 2}).as_object().cloned().unwrap(),
            }
        );

        let op = DocumentOperation::from_value(&json!({"find": null})).unwrap();
        assert_eq!(op, DocumentOperation::Find(Record::new()));
    }

    #[test]
    fn test_check_order_wins() {
        let op = DocumentOperation::from_value(&json!({
            "aggregate": [],
            "deleteMany": {"x": 1}
        }))
        .unwrap();
        assert_eq!(op.verb(), "deleteMany");
    }

    #[test]
    fn test_bad_descriptors() {
        let err = DocumentOperation::from_value(&json!({"replaceOne": {}})).unwrap_err();
        assert_eq!(err.kind(), "unsupported");

        let err = DocumentOperation::from_value(&json!([1])).unwrap_err();
        assert_eq!(err.kind(), "malformed");

        let err = DocumentOperation::from_value(&json!({"insertMany": {"a": 1}})).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}
