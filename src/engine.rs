//! Engine facade and outer operation boundary.
//!
//! The `execute_*` and `bulk` entry points never return `Err`: every failure
//! is folded into a failed [`OperationResult`] carrying the message and its
//! error kind. The remaining methods are typed and return `Result`.

use crate::admin::{Admin, ArchiveInfo, BackupDescriptor, BackupRequest, IndexRequest};
use crate::bulk::{BulkExecutor, BulkRequest};
use crate::config::EngineConfig;
use crate::document::{crud, DocumentAdapter, DocumentOperation};
use crate::query::condition::exact_match;
use crate::query::QueryExecutor;
use crate::storage::{FileIo, PathLayout, PlainFiles, TableSchema, TableStats, TableStore};
use crate::types::error::{EngineError, Result};
use crate::types::record::{Record, TableAddress};
use crate::types::response::OperationResult;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Embedded tabular engine rooted at one data directory.
pub struct Engine {
    config: EngineConfig,
    store: TableStore,
}

impl Engine {
    /// Open an engine over plain files, creating the data directory.
    pub fn open(config: EngineConfig) -> Result<Self> {
        Self::open_with_files(config, Arc::new(PlainFiles))
    }

    /// Open an engine whose table files go through `files`.
    pub fn open_with_files(config: EngineConfig, files: Arc<dyn FileIo>) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        let layout = PathLayout::new(&config.data_dir, config.layout);
        debug!("Opened engine at {}", config.data_dir.display());
        Ok(Self {
            store: TableStore::new(layout, files),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    // Boundary operations

    /// Run one SQL statement.
    pub fn execute_sql(
        &self,
        tenant: &str,
        database: &str,
        sql: &str,
        parameters: Option<&Record>,
        explain: bool,
    ) -> OperationResult {
        let outcome =
            QueryExecutor::new(&self.store, tenant, database).execute(sql, parameters, explain);
        boundary("sql", outcome)
    }

    /// Run one document operation descriptor against a table.
    pub fn execute_document(&self, addr: &TableAddress, descriptor: &Value) -> OperationResult {
        let outcome = DocumentOperation::from_value(descriptor)
            .and_then(|op| DocumentAdapter::new(&self.store).execute(addr, op));
        boundary("document", outcome)
    }

    /// Concatenate the rows of an SQL query and a document operation.
    ///
    /// Either half may be absent. A half that fails contributes no rows and
    /// does not fail the whole call.
    pub fn execute_hybrid(
        &self,
        tenant: &str,
        database: &str,
        sql: Option<&str>,
        table: Option<&str>,
        operation: Option<&Value>,
        parameters: Option<&Record>,
    ) -> OperationResult {
        let mut rows = Vec::new();

        if let Some(sql) = sql {
            let result = self.execute_sql(tenant, database, sql, parameters, false);
            if result.success {
                rows.extend(result.data.unwrap_or_default());
            }
        }
        if let (Some(table), Some(operation)) = (table, operation) {
            let addr = TableAddress::new(tenant, database, table);
            let result = self.execute_document(&addr, operation);
            if result.success {
                rows.extend(result.documents.unwrap_or_default());
            }
        }

        let mut result = OperationResult::ok().with_query_type("hybrid");
        result.count = Some(rows.len());
        result.data = Some(rows);
        result
    }

    /// Run a bulk request.
    pub fn bulk(&self, addr: &TableAddress, request: &BulkRequest) -> OperationResult {
        let outcome =
            BulkExecutor::new(&self.store, self.config.default_batch_size).run(addr, request);
        boundary("bulk", outcome)
    }

    // Tenants and databases

    pub fn create_tenant(&self, tenant: &str) -> Result<PathBuf> {
        self.store.create_tenant(tenant)
    }

    pub fn create_database(&self, tenant: &str, database: &str) -> Result<PathBuf> {
        self.store.create_database(tenant, database)
    }

    /// Databases of a tenant; empty if the tenant does not exist.
    pub fn list_databases(&self, tenant: &str) -> Result<Vec<String>> {
        self.store.layout().database_names(tenant)
    }

    /// Tables of a database; empty if the database does not exist.
    pub fn list_tables(&self, tenant: &str, database: &str) -> Result<Vec<String>> {
        self.store.layout().table_names(tenant, database)
    }

    /// Table names of an existing database.
    pub fn database_schema(&self, tenant: &str, database: &str) -> Result<Vec<String>> {
        if !self.store.database_exists(tenant, database)? {
            return Err(EngineError::DatabaseNotFound {
                tenant: tenant.to_string(),
                database: database.to_string(),
            });
        }
        self.list_tables(tenant, database)
    }

    /// Declared columns of an existing table; empty if never declared.
    pub fn table_schema(&self, addr: &TableAddress) -> Result<TableSchema> {
        if !self.store.exists(addr)? {
            return Err(EngineError::TableNotFound {
                tenant: addr.tenant.clone(),
                database: addr.database.clone(),
                table: addr.table.clone(),
            });
        }
        Ok(self.store.load_schema(addr)?.unwrap_or_else(|| TableSchema {
            table: addr.table.clone(),
            ..TableSchema::default()
        }))
    }

    // Tables and records

    /// Create an empty table. Returns `false` if it already existed.
    pub fn create_table(&self, addr: &TableAddress) -> Result<bool> {
        self.store.create_table(addr)
    }

    /// Page of stored records, then exact-match filtered.
    ///
    /// The page is taken before filtering, so fewer than `limit` records can
    /// come back even when more matches exist further on. `limit` defaults to
    /// the configured baseline limit.
    pub fn query_data(
        &self,
        addr: &TableAddress,
        conditions: &Record,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Record>> {
        let limit = limit.unwrap_or(self.config.baseline_limit);
        Ok(self
            .store
            .load_page(addr, limit, offset)?
            .into_iter()
            .filter(|record| exact_match(record, conditions))
            .collect())
    }

    pub fn insert(&self, addr: &TableAddress, record: &Record) -> Result<()> {
        crud::insert(&self.store, addr, record)
    }

    pub fn update(
        &self,
        addr: &TableAddress,
        conditions: &Record,
        updates: &Record,
        upsert: bool,
    ) -> Result<usize> {
        crud::update(&self.store, addr, conditions, updates, upsert)
    }

    pub fn delete(&self, addr: &TableAddress, conditions: &Record) -> Result<usize> {
        crud::delete(&self.store, addr, conditions)
    }

    pub fn table_stats(&self, addr: &TableAddress) -> Result<TableStats> {
        self.store.stats(addr)
    }

    // Maintenance

    pub fn archive_table(&self, addr: &TableAddress, compress: bool) -> Result<ArchiveInfo> {
        Admin::new(&self.store).archive_table(addr, compress)
    }

    pub fn create_index(&self, addr: &TableAddress, request: &IndexRequest) -> Result<PathBuf> {
        Admin::new(&self.store).create_index(addr, request)
    }

    pub fn backup_database(
        &self,
        tenant: &str,
        database: &str,
        request: &BackupRequest,
    ) -> Result<(PathBuf, BackupDescriptor)> {
        Admin::new(&self.store).backup_database(tenant, database, request)
    }
}

fn boundary(operation: &str, outcome: Result<OperationResult>) -> OperationResult {
    outcome.unwrap_or_else(|e| {
        warn!("{} operation failed: {}", operation, e);
        OperationResult::failure(&e)
    })
}
