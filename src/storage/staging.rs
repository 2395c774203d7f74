//! Staging directory for intermediate artifacts

use crate::codec::{self, Format};
use crate::error::EtlError;
use crate::table::Table;
use eyre::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// A table persisted in the staging directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedFile {
    pub name: String,
    pub format: Format,
    pub path: PathBuf,
}

impl fmt::Display for StagedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Filesystem directory holding staged tables by filename.
///
/// The directory is created lazily on the first write. Writes with an existing
/// name replace the previous file.
#[derive(Clone, Debug)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location a staged name maps to
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    /// Create the staging directory if it does not exist yet
    pub fn ensure_root(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)
            .map_err(EtlError::from)
            .with_context(|| format!("Failed to create staging directory {}", self.root.display()))
    }

    /// Encode `table` with the codec named by `name`'s extension and store it
    pub fn put(&self, name: &str, table: &Table) -> Result<StagedFile> {
        // Reject unsupported names before the directory is created
        Format::from_path(name)?;

        self.ensure_root()?;
        let path = self.path(name);
        if path.exists() {
            log::debug!("Overwriting staged file {}", path.display());
        }
        let format = codec::write_path(&path, table)
            .with_context(|| format!("Failed to stage {}", name))?;

        log::debug!(
            "Staged {} rows x {} columns as {}",
            table.num_rows(),
            table.num_columns(),
            path.display()
        );

        Ok(StagedFile {
            name: name.to_string(),
            format,
            path,
        })
    }

    /// Decode a staged file by name
    pub fn get(&self, name: &str) -> Result<Table> {
        let path = self.path(name);
        if !path.is_file() {
            return Err(EtlError::NotFound(path).into());
        }
        codec::read_path(&path)
    }

    /// Staged files with a supported extension, sorted by name
    pub fn list(&self) -> Result<Vec<StagedFile>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut staged = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .map_err(EtlError::from)
            .with_context(|| format!("Failed to list {}", self.root.display()))?;
        for entry in entries {
            let path = entry.map_err(EtlError::from)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(format) = Format::from_path(&path) {
                staged.push(StagedFile {
                    name: name.to_string(),
                    format,
                    path: path.clone(),
                });
            }
        }

        staged.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(staged)
    }
}
