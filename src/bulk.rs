//! Batched bulk insert / update / delete.
//!
//! Items are applied one at a time through the single-record primitives, in
//! consecutive chunks of `batch_size`. A failing item is logged and skipped;
//! nothing already applied is rolled back.

use crate::document::crud;
use crate::types::error::{EngineError, Result};
use crate::types::record::{as_record, Record, TableAddress};
use crate::types::response::OperationResult;
use crate::storage::TableStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Bulk operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkKind {
    Insert,
    Update,
    Delete,
}

impl FromStr for BulkKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(Self::Insert),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(EngineError::unsupported(format!("bulk operation '{}'", other))),
        }
    }
}

impl fmt::Display for BulkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// A bulk request.
///
/// Item shapes by kind:
/// - insert: the record to append
/// - update: `{"conditions": {...}, "updates": {...}}`
/// - delete: the condition map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub operation: BulkKind,
    #[serde(alias = "data")]
    pub items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
}

impl BulkRequest {
    pub fn new(operation: BulkKind, items: Vec<Value>) -> Self {
        Self {
            operation,
            items,
            batch_size: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Parse `{"operation": ..., "data"|"items": [...], "batch_size": n}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| EngineError::malformed("Bulk request must be an object"))?;
        let operation: BulkKind = map
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::malformed("Bulk request requires 'operation'"))?
            .parse()?;
        let items = map
            .get("data")
            .or_else(|| map.get("items"))
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| EngineError::malformed("Bulk request requires a 'data' array"))?;
        let batch_size = match map.get("batch_size") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let size = v.as_u64().ok_or_else(|| {
                    EngineError::malformed("batch_size must be a non-negative integer")
                })?;
                let size = usize::try_from(size).map_err(|_| {
                    EngineError::malformed(format!("batch_size {} is too large", size))
                })?;
                Some(size)
            }
        };
        Ok(Self {
            operation,
            items,
            batch_size,
        })
    }
}

/// Reported batch count: one more than the number of full batches.
pub fn total_batches(items: usize, batch_size: usize) -> usize {
    items / batch_size + 1
}

/// Drives bulk requests through the CRUD primitives.
pub struct BulkExecutor<'a> {
    store: &'a TableStore,
    default_batch_size: usize,
}

impl<'a> BulkExecutor<'a> {
    pub fn new(store: &'a TableStore, default_batch_size: usize) -> Self {
        Self {
            store,
            default_batch_size,
        }
    }

    pub fn run(&self, addr: &TableAddress, request: &BulkRequest) -> Result<OperationResult> {
        let batch_size = request.batch_size.unwrap_or(self.default_batch_size);
        if batch_size == 0 {
            return Err(EngineError::malformed("batch_size must be greater than zero"));
        }

        let mut total = 0;
        for (n, batch) in request.items.chunks(batch_size).enumerate() {
            let before = total;
            for item in batch {
                match self.apply(addr, request.operation, item) {
                    Ok(count) => total += count,
                    Err(e) => warn!("Bulk {} on {} skipped an item: {}", request.operation, addr, e),
                }
            }
            debug!("Batch {} of {} on {}: {} affected", n + 1, request.operation, addr, total - before);
        }

        let mut result = OperationResult::ok().with_query_type(format!("bulk_{}", request.operation));
        result.total_batches = Some(total_batches(request.items.len(), batch_size));
        match request.operation {
            BulkKind::Insert => result.inserted_count = Some(total),
            BulkKind::Update => result.updated_count = Some(total),
            BulkKind::Delete => result.deleted_count = Some(total),
        }
        info!(
            "Bulk {} on {}: {} of {} items affected",
            request.operation,
            addr,
            total,
            request.items.len()
        );
        Ok(result)
    }

    fn apply(&self, addr: &TableAddress, kind: BulkKind, item: &Value) -> Result<usize> {
        match kind {
            BulkKind::Insert => {
                crud::insert(self.store, addr, &item_record(item)?)?;
                Ok(1)
            }
            BulkKind::Update => {
                let body = item_record(item)?;
                let conditions = field_record(&body, "conditions")?;
                let updates = field_record(&body, "updates")?;
                crud::update(self.store, addr, &conditions, &updates, false)
            }
            BulkKind::Delete => crud::delete(self.store, addr, &item_record(item)?),
        }
    }
}

fn item_record(item: &Value) -> Result<Record> {
    as_record(item.clone()).ok_or_else(|| EngineError::malformed("bulk item is not an object"))
}

fn field_record(body: &Record, key: &str) -> Result<Record> {
    match body.get(key) {
        None | Some(Value::Null) => Ok(Record::new()),
        Some(value) => as_record(value.clone())
            .ok_or_else(|| EngineError::malformed(format!("'{}' must be an object", key))),
    }
}
