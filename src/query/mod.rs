//! SQL-subset parsing and execution.
//!
//! - `lexer`: quote-aware tokens with source spans
//! - `condition`: single-expression comparator and exact-match filter
//! - `clause`: SELECT clause extraction
//! - `statement`: INSERT / UPDATE / DELETE / CREATE TABLE and dispatch
//! - `aggregate`, `sort`: GROUP BY and ORDER BY stages
//! - `plan`: execution plan description
//! - `executor`: runs statements against the record store

pub mod aggregate;
pub mod clause;
pub mod condition;
pub mod executor;
pub mod lexer;
pub mod plan;
pub mod sort;
pub mod statement;

pub use clause::SelectQuery;
pub use condition::{exact_match, matches, Condition};
pub use executor::QueryExecutor;
pub use plan::ExecutionPlan;
pub use statement::Statement;
