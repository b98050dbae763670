//! Engine configuration and data directory resolution.

use crate::types::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// How a table's records are laid out on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageLayout {
    /// One JSON record per line; appends never read the table.
    #[default]
    JsonLines,
    /// A single JSON array per table, rewritten wholesale on every write.
    JsonArray,
}

impl StorageLayout {
    /// File extension used for table files in this layout.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::JsonLines => "jsonl",
            Self::JsonArray => "json",
        }
    }
}

impl FromStr for StorageLayout {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json_lines" | "jsonl" | "lines" => Ok(Self::JsonLines),
            "json_array" | "json" | "array" => Ok(Self::JsonArray),
            other => Err(EngineError::Config(format!("Unknown storage layout: {}", other))),
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the tenant directory hierarchy.
    pub data_dir: PathBuf,
    /// Table file layout.
    pub layout: StorageLayout,
    /// Bulk batch size used when a request does not name one.
    pub default_batch_size: usize,
    /// Page size for the baseline paged load.
    pub baseline_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let data_dir = Self::config_dir()
            .map(|dir| dir.join("data"))
            .unwrap_or_else(|_| PathBuf::from("tabulon-data"));
        Self {
            data_dir,
            layout: StorageLayout::default(),
            default_batch_size: 1000,
            baseline_limit: 100,
        }
    }
}

impl EngineConfig {
    /// Config rooted at an explicit data directory, other fields defaulted.
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Get default config directory (~/.tabulon/).
    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| EngineError::Config("HOME not set".to_string()))?;
        Ok(PathBuf::from(home).join(".tabulon"))
    }

    /// Get config file path (~/.tabulon/config.json).
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load configuration from the default file, then apply env overrides.
    pub fn load() -> Result<Self> {
        Self::resolve(Self::config_file(), None, |key| std::env::var(key).ok())
    }

    /// Like [`load`](Self::load), with `data_dir` taking precedence over the
    /// file and the environment.
    ///
    /// When an explicit data directory is given, an unresolvable config
    /// directory (no `$HOME`) falls back to defaults instead of failing.
    pub fn load_with_data_dir(data_dir: Option<PathBuf>) -> Result<Self> {
        Self::resolve(Self::config_file(), data_dir, |key| std::env::var(key).ok())
    }

    fn resolve<F>(config_file: Result<PathBuf>, data_dir: Option<PathBuf>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base = match config_file {
            Ok(path) if path.exists() => Self::read_file(&path)?,
            Ok(_) => Self::default(),
            Err(e) if data_dir.is_some() => {
                debug!("No config directory ({}), using defaults", e);
                Self::default()
            }
            Err(e) => return Err(e),
        };
        let mut config = base.apply_overrides(lookup)?;
        if let Some(dir) = data_dir {
            config.data_dir = dir;
        }
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply env overrides.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_file(path.as_ref())?.apply_env()
    }

    fn read_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default file.
    pub fn save(&self) -> Result<()> {
        let config_file = Self::config_file()?;
        self.save_to(config_file)
    }

    /// Save configuration as pretty JSON.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("Serialize error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Apply `TABULON_*` environment overrides.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("TABULON_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(layout) = lookup("TABULON_LAYOUT") {
            self.layout = layout.parse()?;
        }
        if let Some(size) = lookup("TABULON_BATCH_SIZE") {
            self.default_batch_size = size.trim().parse().map_err(|_| {
                EngineError::Config(format!("TABULON_BATCH_SIZE is not a number: {}", size))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.default_batch_size == 0 {
            return Err(EngineError::Config(
                "default_batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = EngineConfig::with_data_dir(dir.path().join("data"));
        config.layout = StorageLayout::JsonArray;
        config.default_batch_size = 250;
        config.save_to(&path).unwrap();

        let loaded = EngineConfig::read_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"layout": "json_array"}"#).unwrap();

        let loaded = EngineConfig::read_file(&path).unwrap();
        assert_eq!(loaded.layout, StorageLayout::JsonArray);
        assert_eq!(loaded.default_batch_size, 1000);
        assert_eq!(loaded.baseline_limit, 100);
    }

    #[test]
    fn test_env_overrides() {
        let config = EngineConfig::with_data_dir("/tmp/a")
            .apply_overrides(|key| match key {
                "TABULON_DATA_DIR" => Some("/tmp/b".to_string()),
                "TABULON_LAYOUT" => Some("array".to_string()),
                "TABULON_BATCH_SIZE" => Some("10".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/b"));
        assert_eq!(config.layout, StorageLayout::JsonArray);
        assert_eq!(config.default_batch_size, 10);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = EngineConfig::with_data_dir("/tmp/a").apply_overrides(|key| {
            (key == "TABULON_BATCH_SIZE").then(|| "0".to_string())
        });
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_missing_home_with_explicit_data_dir() {
        let no_home = || Err(EngineError::Config("HOME not set".to_string()));

        let config =
            EngineConfig::resolve(no_home(), Some(PathBuf::from("/srv/data")), |_| None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.default_batch_size, 1000);

        let err = EngineConfig::resolve(no_home(), None, |_| None).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_explicit_data_dir_wins_over_file_and_env() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        EngineConfig::with_data_dir("/from/file").save_to(&path).unwrap();

        let config = EngineConfig::resolve(Ok(path.clone()), Some(PathBuf::from("/from/flag")), |key| {
            (key == "TABULON_DATA_DIR").then(|| "/from/env".to_string())
        })
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/from/flag"));

        let config = EngineConfig::resolve(Ok(path), None, |_| None).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/from/file"));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        assert!("parquet".parse::<StorageLayout>().is_err());
        assert_eq!("JSONL".parse::<StorageLayout>().unwrap(), StorageLayout::JsonLines);
    }
}
