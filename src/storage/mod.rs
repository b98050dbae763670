//! File-backed table storage.

pub mod files;
pub mod layout;
pub mod locks;
pub mod table;

pub use files::{FileIo, PlainFiles};
pub use layout::{validate_name, PathLayout};
pub use table::{TableSchema, TableStats, TableStore};
