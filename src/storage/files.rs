//! File read/write abstraction.
//!
//! Table files are only touched through [`FileIo`], so a deployment that keeps
//! data encrypted at rest can swap in an implementation that transforms bytes
//! on the way in and out.

use crate::types::error::Result;
use std::fmt::Debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Whole-file and append access to table files.
pub trait FileIo: Send + Sync + Debug {
    /// Read a file as UTF-8 text.
    fn read(&self, path: &Path) -> Result<String>;

    /// Append text to the end of a file, creating it if missing.
    fn append(&self, path: &Path, contents: &str) -> Result<()>;

    /// Replace a file's contents so readers see either the old or the new file.
    fn replace(&self, path: &Path, contents: &str) -> Result<()>;
}

/// Unencrypted files on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFiles;

impl FileIo for PlainFiles {
    fn read(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }

    fn append(&self, path: &Path, contents: &str) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(contents.as_bytes())?;
        Ok(())
    }

    fn replace(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = temp_sibling(path);
        if let Err(e) = write_and_sync(&tmp, contents) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

fn write_and_sync(path: &Path, contents: &str) -> Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

/// Temp file next to `path`, so the final rename stays on one filesystem.
fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("table");
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}
