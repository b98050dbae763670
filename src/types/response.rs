//! Uniform result object returned across the operation boundary.

use crate::query::plan::ExecutionPlan;
use crate::types::error::EngineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of one engine operation.
///
/// Only the fields relevant to the operation are populated; the rest are
/// omitted from the serialized form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,

    /// Rows produced by the SQL path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Value>>,

    /// Documents produced by the document path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_returned: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub affected_rows: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_count: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_batches: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<Value>,

    /// Statement or verb that produced this result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<String>,

    /// Aggregation pipeline echoed back by `aggregate`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlan>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

impl OperationResult {
    /// Successful result with no payload yet.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Failed result carrying the error message and its classification.
    pub fn failure(err: &EngineError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind().to_string()),
            ..Self::default()
        }
    }

    pub fn with_query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    /// Rows for whichever path produced them.
    pub fn rows(&self) -> &[Value] {
        self.data
            .as_deref()
            .or(self.documents.as_deref())
            .unwrap_or(&[])
    }
}
