//! Table and database maintenance: archives, index descriptors, backups.
//!
//! Index and backup files are descriptors only. The executor never reads an
//! index, and a backup holds no rows, so it cannot restore table contents.
//! Since neither carries table data, both are plain JSON written with
//! `std::fs` rather than through [`FileIo`](crate::storage::FileIo). Archives
//! copy table data and go through the store's `FileIo`.

use crate::storage::TableStore;
use crate::types::error::{EngineError, Result};
use crate::types::record::TableAddress;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

fn timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// `<ts>_<8 hex>`: two snapshots taken in the same millisecond still get
/// distinct file names.
fn snapshot_stem(ts: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{}", ts, &id[..8])
}

/// Where an archive was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub path: PathBuf,
    pub timestamp: String,
    pub compressed: bool,
}

/// Index descriptor request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default = "default_index_type")]
    pub index_type: String,
    #[serde(default)]
    pub unique: bool,
}

fn default_index_type() -> String {
    "btree".to_string()
}

impl IndexRequest {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            index_type: default_index_type(),
            unique: false,
        }
    }
}

/// Index descriptor as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    #[serde(rename = "type")]
    pub index_type: String,
    pub unique: bool,
    pub created: String,
}

/// Backup request flags. Every flag is recorded, none changes what is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupRequest {
    pub backup_type: String,
    pub compression: bool,
    pub encryption: bool,
    pub include_data: bool,
}

impl Default for BackupRequest {
    fn default() -> Self {
        Self {
            backup_type: "full".to_string(),
            compression: true,
            encryption: true,
            include_data: true,
        }
    }
}

/// Backup descriptor as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDescriptor {
    pub database: String,
    #[serde(rename = "type")]
    pub backup_type: String,
    pub timestamp: String,
    pub compression: bool,
    pub encryption: bool,
    pub include_data: bool,
}

/// Maintenance operations over a store.
pub struct Admin<'a> {
    store: &'a TableStore,
}

impl<'a> Admin<'a> {
    pub fn new(store: &'a TableStore) -> Self {
        Self { store }
    }

    /// Copy a table file into the tenant's archive directory.
    ///
    /// With `compress` the copy is prefixed by a `# COMPRESSED ARCHIVE <ts>`
    /// marker line; the content itself is stored as is. The archive is written
    /// through the store's [`FileIo`](crate::storage::FileIo), so it is
    /// encoded the same way as the table it copies.
    pub fn archive_table(&self, addr: &TableAddress, compress: bool) -> Result<ArchiveInfo> {
        if !self.store.exists(addr)? {
            return Err(not_found(addr));
        }
        let layout = self.store.layout();
        let source = layout.table_path(addr)?;
        let dir = layout.archives_dir(&addr.tenant)?;
        fs::create_dir_all(&dir)?;

        let ts = timestamp();
        let path = dir.join(format!(
            "{}_{}_{}.archive",
            addr.database,
            addr.table,
            snapshot_stem(&ts)
        ));
        let mut contents = String::new();
        if compress {
            contents.push_str(&format!("# COMPRESSED ARCHIVE {}\n", ts));
        }
        contents.push_str(&self.store.files().read(&source)?);
        self.store.files().replace(&path, &contents)?;

        info!("Archived {} to {}", addr, path.display());
        Ok(ArchiveInfo {
            path,
            timestamp: ts,
            compressed: compress,
        })
    }

    /// Write an index descriptor for a table.
    ///
    /// The file is keyed by index name; creating the same index again
    /// replaces its descriptor.
    pub fn create_index(&self, addr: &TableAddress, request: &IndexRequest) -> Result<PathBuf> {
        if request.columns.is_empty() {
            return Err(EngineError::malformed("Index requires at least one column"));
        }
        let path = self.store.layout().index_path(addr, &request.name)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let descriptor = IndexDescriptor {
            table: addr.table.clone(),
            name: request.name.clone(),
            columns: request.columns.clone(),
            index_type: request.index_type.clone(),
            unique: request.unique,
            created: Utc::now().to_rfc3339(),
        };
        fs::write(&path, serde_json::to_string_pretty(&descriptor)?)?;
        info!("Created index {} on {}", request.name, addr);
        Ok(path)
    }

    /// Write a metadata-only backup descriptor for a database.
    pub fn backup_database(
        &self,
        tenant: &str,
        database: &str,
        request: &BackupRequest,
    ) -> Result<(PathBuf, BackupDescriptor)> {
        if !self.store.database_exists(tenant, database)? {
            return Err(EngineError::DatabaseNotFound {
                tenant: tenant.to_string(),
                database: database.to_string(),
            });
        }
        crate::storage::validate_name("backup type", &request.backup_type)?;

        let dir = self.store.layout().backups_dir(tenant)?;
        fs::create_dir_all(&dir)?;
        let descriptor = BackupDescriptor {
            database: database.to_string(),
            backup_type: request.backup_type.clone(),
            timestamp: timestamp(),
            compression: request.compression,
            encryption: request.encryption,
            include_data: request.include_data,
        };
        let path = dir.join(format!(
            "{}_{}_{}.backup",
            database,
            descriptor.backup_type,
            snapshot_stem(&descriptor.timestamp)
        ));
        fs::write(&path, serde_json::to_string_pretty(&descriptor)?)?;
        info!("Wrote backup descriptor {}", path.display());
        Ok((path, descriptor))
    }
}

/// Parse a backup descriptor file.
pub fn read_backup(path: &Path) -> Result<BackupDescriptor> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn not_found(addr: &TableAddress) -> EngineError {
    EngineError::TableNotFound {
        tenant: addr.tenant.clone(),
        database: addr.database.clone(),
        table: addr.table.clone(),
    }
}
