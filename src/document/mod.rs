//! Document-store interface over the same tables the SQL path uses.
//!
//! Matching here is always exact: a filter `{"age": 25}` selects records
//! whose `age` field equals `25`, with no operator parsing.

pub mod crud;
pub mod operation;

pub use operation::{DocumentAdapter, DocumentOperation};
