//! Tabulon - embedded multi-tenant tabular store with SQL-subset and
//! document-style query paths over one set of JSON table files.

pub mod admin;
pub mod bulk;
pub mod config;
pub mod document;
pub mod engine;
pub mod query;
pub mod storage;
pub mod types;

// Re-export main types
pub use bulk::{BulkKind, BulkRequest};
pub use config::{EngineConfig, StorageLayout};
pub use engine::Engine;
pub use types::{EngineError, OperationResult, Record, Result, TableAddress};
