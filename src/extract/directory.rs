//! Directory extractor

use super::file::stage_file;
use crate::error::{EtlError, classify};
use crate::etl::Extractor;
use crate::storage::{StagedFile, StagingStore};
use eyre::{Context, Result};
use std::path::{Path, PathBuf};

/// Extractor that stages every supported file directly inside a directory.
///
/// Subdirectories are not visited. Files that are not CSV, JSON or Parquet,
/// or that fail to decode, are skipped with a warning.
pub struct DirectoryExtractor {
    store: StagingStore,
    path: PathBuf,
}

impl DirectoryExtractor {
    pub fn new(store: StagingStore, path: impl AsRef<Path>) -> Self {
        Self {
            store,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Regular files in the directory, sorted by name
    fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.path.is_dir() {
            return Err(EtlError::NotFound(self.path.clone()).into());
        }

        let entries = std::fs::read_dir(&self.path)
            .map_err(EtlError::from)
            .with_context(|| format!("Failed to read directory: {}", self.path.display()))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(EtlError::from)?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Stage each file, skipping the ones with format problems
    pub fn stage_all(&self) -> Result<Vec<StagedFile>> {
        let files = self.files()?;
        log::debug!("Found {} file(s) in {}", files.len(), self.path.display());

        let mut staged = Vec::new();
        for path in files {
            match stage_file(&self.store, &path) {
                Ok(file) => staged.push(file),
                Err(e) if classify(&e).is_some_and(EtlError::is_skippable) => {
                    log::warn!("Skipping {}: {:#}", path.display(), e);
                }
                Err(e) => return Err(e),
            }
        }

        log::info!(
            "Extracted {} file(s) from {}",
            staged.len(),
            self.path.display()
        );
        Ok(staged)
    }
}

impl Extractor for DirectoryExtractor {
    type Item = StagedFile;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        self.stage_all()
    }
}
