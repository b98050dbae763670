//! Directory hierarchy for tenants, databases and tables.
//!
//! ```text
//! <data_dir>/
//!   tenant_<id>/
//!     <db>.db/
//!       <table>.jsonl          (or <table>.json for the array layout)
//!       schemas/<table>.json
//!       indexes/<table>_<name>.idx
//!     backups/
//!     archives/
//! ```

use crate::config::StorageLayout;
use crate::types::error::{EngineError, Result};
use crate::types::record::TableAddress;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const TENANT_PREFIX: &str = "tenant_";
const DATABASE_SUFFIX: &str = ".db";

fn name_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-]+$").ok())
        .as_ref()
}

/// Reject names that cannot be mapped onto a single path segment.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if matches!(name_pattern(), Some(pattern) if pattern.is_match(name)) {
        Ok(())
    } else {
        Err(EngineError::InvalidName(format!("{} '{}'", kind, name)))
    }
}

/// Maps tenant / database / table identities onto paths.
#[derive(Debug, Clone)]
pub struct PathLayout {
    root: PathBuf,
    format: StorageLayout,
}

impl PathLayout {
    pub fn new<P: AsRef<Path>>(root: P, format: StorageLayout) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn format(&self) -> StorageLayout {
        self.format
    }

    pub fn tenant_dir(&self, tenant: &str) -> Result<PathBuf> {
        validate_name("tenant", tenant)?;
        Ok(self.root.join(format!("{}{}", TENANT_PREFIX, tenant)))
    }

    pub fn database_dir(&self, tenant: &str, database: &str) -> Result<PathBuf> {
        validate_name("database", database)?;
        Ok(self
            .tenant_dir(tenant)?
            .join(format!("{}{}", database, DATABASE_SUFFIX)))
    }

    pub fn table_path(&self, addr: &TableAddress) -> Result<PathBuf> {
        validate_name("table", &addr.table)?;
        Ok(self
            .database_dir(&addr.tenant, &addr.database)?
            .join(format!("{}.{}", addr.table, self.format.extension())))
    }

    pub fn schema_path(&self, addr: &TableAddress) -> Result<PathBuf> {
        validate_name("table", &addr.table)?;
        Ok(self
            .database_dir(&addr.tenant, &addr.database)?
            .join("schemas")
            .join(format!("{}.json", addr.table)))
    }

    pub fn index_path(&self, addr: &TableAddress, index: &str) -> Result<PathBuf> {
        validate_name("table", &addr.table)?;
        validate_name("index", index)?;
        Ok(self
            .database_dir(&addr.tenant, &addr.database)?
            .join("indexes")
            .join(format!("{}_{}.idx", addr.table, index)))
    }

    pub fn backups_dir(&self, tenant: &str) -> Result<PathBuf> {
        Ok(self.tenant_dir(tenant)?.join("backups"))
    }

    pub fn archives_dir(&self, tenant: &str) -> Result<PathBuf> {
        Ok(self.tenant_dir(tenant)?.join("archives"))
    }

    /// Database names under a tenant, sorted.
    pub fn database_names(&self, tenant: &str) -> Result<Vec<String>> {
        let dir = self.tenant_dir(tenant)?;
        list_entries(&dir, |path| {
            if !path.is_dir() {
                return None;
            }
            let name = path.file_name()?.to_str()?;
            name.strip_suffix(DATABASE_SUFFIX).map(str::to_string)
        })
    }

    /// Table names in a database, sorted.
    pub fn table_names(&self, tenant: &str, database: &str) -> Result<Vec<String>> {
        let dir = self.database_dir(tenant, database)?;
        let extension = self.format.extension();
        list_entries(&dir, |path| {
            if !path.is_file() || path.extension()?.to_str()? != extension {
                return None;
            }
            path.file_stem()?.to_str().map(str::to_string)
        })
    }
}

fn list_entries<F>(dir: &Path, select: F) -> Result<Vec<String>>
where
    F: Fn(&Path) -> Option<String>,
{
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(name) = select(&path) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
