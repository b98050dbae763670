//! Core types for tabulon.
//!
//! - `Record`: field-value row, the engine's unit of storage
//! - `TableAddress`: tenant / database / table identity
//! - `EngineError`: error taxonomy for all operations
//! - `OperationResult`: uniform boundary result

pub mod error;
pub mod record;
pub mod response;

pub use error::{EngineError, Result};
pub use record::{Record, TableAddress};
pub use response::OperationResult;
