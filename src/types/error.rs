//! Error types for tabulon operations.
//!
//! Uses `thiserror` for ergonomic error definitions with automatic `From` implementations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Error type for all engine operations.
///
/// Every variant is caught at the outer operation boundary and turned into a
/// failed `OperationResult`; none of them terminate the process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Table absent on a read/update/delete path
    #[error("Table {table} not found in database {database} (tenant {tenant})")]
    TableNotFound {
        tenant: String,
        database: String,
        table: String,
    },

    /// Database directory absent
    #[error("Database {database} not found (tenant {tenant})")]
    DatabaseNotFound { tenant: String, database: String },

    /// Query text is missing a required clause value
    #[error("Malformed query: {0}")]
    Malformed(String),

    /// Statement or verb kind not recognized
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Tenant, database or table name cannot be mapped onto the filesystem
    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O failure reading or writing a backing file
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Create a malformed-query error with context.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Create an unsupported-operation error with context.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Short, stable classification carried in failed results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TableNotFound { .. } | Self::DatabaseNotFound { .. } => "not_found",
            Self::Malformed(_) | Self::InvalidName(_) => "malformed",
            Self::Unsupported(_) => "unsupported",
            Self::Config(_) => "config",
            Self::Storage(_) | Self::Json(_) => "storage",
        }
    }

    /// `true` for the NotFound family.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TableNotFound { .. } | Self::DatabaseNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_not_found_message_names_table() {
        let err = EngineError::TableNotFound {
            tenant: "acme".into(),
            database: "crm".into(),
            table: "users".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("users"));
        assert!(msg.contains("crm"));
        assert_eq!(err.kind(), "not_found");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_io_error_converts_to_storage() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: EngineError = io.into();
        assert_eq!(err.kind(), "storage");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(EngineError::malformed("x").kind(), "malformed");
        assert_eq!(EngineError::unsupported("merge").kind(), "unsupported");
    }
}
