//! Record store: append, whole-table load and atomic rewrite.

use super::files::FileIo;
use super::layout::PathLayout;
use super::locks::{acquire, TableLocks};
use crate::config::StorageLayout;
use crate::types::error::{EngineError, Result};
use crate::types::record::{Record, TableAddress};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Declared columns for a table, written by `CREATE TABLE`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<String>,
    pub created_at: String,
}

/// Size summary for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub records: usize,
    pub bytes: u64,
}

/// Table storage shared by every query path.
#[derive(Debug)]
pub struct TableStore {
    layout: PathLayout,
    files: Arc<dyn FileIo>,
    locks: TableLocks,
}

impl TableStore {
    pub fn new(layout: PathLayout, files: Arc<dyn FileIo>) -> Self {
        Self {
            layout,
            files,
            locks: TableLocks::new(),
        }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    pub fn files(&self) -> &dyn FileIo {
        self.files.as_ref()
    }

    /// Create the tenant directory if missing.
    pub fn create_tenant(&self, tenant: &str) -> Result<PathBuf> {
        let dir = self.layout.tenant_dir(tenant)?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created tenant {}", tenant);
        }
        Ok(dir)
    }

    /// Create the database directory (and its tenant) if missing.
    pub fn create_database(&self, tenant: &str, database: &str) -> Result<PathBuf> {
        let dir = self.layout.database_dir(tenant, database)?;
        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!("Created database {}/{}", tenant, database);
        }
        Ok(dir)
    }

    pub fn database_exists(&self, tenant: &str, database: &str) -> Result<bool> {
        Ok(self.layout.database_dir(tenant, database)?.is_dir())
    }

    /// Create an empty table. Returns `false` if it already existed.
    ///
    /// Existing data is never truncated.
    pub fn create_table(&self, addr: &TableAddress) -> Result<bool> {
        self.create_database(&addr.tenant, &addr.database)?;
        let path = self.layout.table_path(addr)?;
        let handle = self.locks.handle(&path);
        let _guard = acquire(&handle);

        if path.exists() {
            return Ok(false);
        }
        self.files.replace(&path, &self.encode(&[])?)?;
        info!("Created table {}", addr);
        Ok(true)
    }

    pub fn exists(&self, addr: &TableAddress) -> Result<bool> {
        Ok(self.layout.table_path(addr)?.is_file())
    }

    /// Add one record at the end of the table, creating the table if needed.
    ///
    /// In the line layout this writes one line without reading the table.
    pub fn append(&self, addr: &TableAddress, record: &Record) -> Result<()> {
        self.create_database(&addr.tenant, &addr.database)?;
        let path = self.layout.table_path(addr)?;
        let handle = self.locks.handle(&path);
        let _guard = acquire(&handle);

        match self.layout.format() {
            StorageLayout::JsonLines => {
                let mut line = serde_json::to_string(record)?;
                line.push('\n');
                self.files.append(&path, &line)
            }
            StorageLayout::JsonArray => {
                let mut records = if path.exists() {
                    self.read_records(addr, &path)?
                } else {
                    Vec::new()
                };
                records.push(record.clone());
                self.files.replace(&path, &self.encode(&records)?)
            }
        }
    }

    /// Every stored record in storage order.
    ///
    /// Lines (or array elements) that do not decode to an object are skipped.
    pub fn load_all(&self, addr: &TableAddress) -> Result<Vec<Record>> {
        let path = self.existing_path(addr)?;
        self.read_records(addr, &path)
    }

    /// Replace the table's contents with `records`.
    ///
    /// Readers see either the old or the new table, never a partial write.
    pub fn rewrite(&self, addr: &TableAddress, records: &[Record]) -> Result<()> {
        let path = self.existing_path(addr)?;
        let handle = self.locks.handle(&path);
        let _guard = acquire(&handle);
        self.write_records(addr, &path, records)
    }

    /// Run one load-mutate-rewrite cycle while holding the table lock.
    ///
    /// `mutate` receives the full record sequence and returns the sequence to
    /// persist plus a value handed back to the caller.
    pub fn modify<T, F>(&self, addr: &TableAddress, mutate: F) -> Result<T>
    where
        F: FnOnce(Vec<Record>) -> Result<(Vec<Record>, T)>,
    {
        let path = self.existing_path(addr)?;
        let handle = self.locks.handle(&path);
        let _guard = acquire(&handle);

        let records = self.read_records(addr, &path)?;
        let (records, outcome) = mutate(records)?;
        self.write_records(addr, &path, &records)?;
        Ok(outcome)
    }

    /// Up to `limit` stored records after skipping `offset`.
    pub fn load_page(&self, addr: &TableAddress, limit: usize, offset: usize) -> Result<Vec<Record>> {
        Ok(self
            .load_all(addr)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    pub fn stats(&self, addr: &TableAddress) -> Result<TableStats> {
        let path = self.existing_path(addr)?;
        let bytes = fs::metadata(&path)?.len();
        let records = self.read_records(addr, &path)?.len();
        Ok(TableStats { records, bytes })
    }

    /// Persist declared columns for a table.
    pub fn save_schema(&self, addr: &TableAddress, columns: &[String]) -> Result<()> {
        let path = self.layout.schema_path(addr)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let schema = TableSchema {
            table: addr.table.clone(),
            columns: columns.to_vec(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.files
            .replace(&path, &serde_json::to_string_pretty(&schema)?)
    }

    /// Declared columns, or `None` if the table was never declared.
    pub fn load_schema(&self, addr: &TableAddress) -> Result<Option<TableSchema>> {
        let path = self.layout.schema_path(addr)?;
        if !path.is_file() {
            return Ok(None);
        }
        let content = self.files.read(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn existing_path(&self, addr: &TableAddress) -> Result<PathBuf> {
        let path = self.layout.table_path(addr)?;
        if path.is_file() {
            Ok(path)
        } else {
            Err(EngineError::TableNotFound {
                tenant: addr.tenant.clone(),
                database: addr.database.clone(),
                table: addr.table.clone(),
            })
        }
    }

    fn read_records(&self, addr: &TableAddress, path: &Path) -> Result<Vec<Record>> {
        let content = self.files.read(path)?;
        let records = match self.layout.format() {
            StorageLayout::JsonLines => decode_lines(addr, &content),
            StorageLayout::JsonArray => decode_array(addr, &content),
        };
        Ok(records)
    }

    /// Caller holds the table lock.
    fn write_records(&self, addr: &TableAddress, path: &Path, records: &[Record]) -> Result<()> {
        self.files.replace(path, &self.encode(records)?)?;
        debug!("Rewrote {} with {} records", addr, records.len());
        Ok(())
    }

    fn encode(&self, records: &[Record]) -> Result<String> {
        match self.layout.format() {
            StorageLayout::JsonLines => {
                let mut out = String::new();
                for record in records {
                    out.push_str(&serde_json::to_string(record)?);
                    out.push('\n');
                }
                Ok(out)
            }
            StorageLayout::JsonArray => Ok(serde_json::to_string_pretty(records)?),
        }
    }
}

fn decode_lines(addr: &TableAddress, content: &str) -> Vec<Record> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(record)) => Some(record),
            Ok(_) => {
                debug!("Skipping non-object line {} in {}", n + 1, addr);
                None
            }
            Err(e) => {
                debug!("Skipping malformed line {} in {}: {}", n + 1, addr, e);
                None
            }
        })
        .collect()
}

fn decode_array(addr: &TableAddress, content: &str) -> Vec<Record> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(record) => Some(record),
                _ => {
                    debug!("Skipping non-object element in {}", addr);
                    None
                }
            })
            .collect(),
        Ok(_) | Err(_) => {
            warn!("Table file for {} is not a JSON array, treating as empty", addr);
            Vec::new()
        }
    }
}
