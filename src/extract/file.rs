//! Local file extractor

use crate::codec;
use crate::error::EtlError;
use crate::etl::Extractor;
use crate::storage::{StagedFile, StagingStore};
use eyre::Result;
use std::path::{Path, PathBuf};

/// Extractor that stages one CSV, JSON or Parquet file under its base name
///
/// # Example
/// ```no_run
/// use stagehand::extract::FileExtractor;
/// use stagehand::etl::Extractor;
/// use stagehand::storage::StagingStore;
///
/// # async fn example() -> eyre::Result<()> {
/// let store = StagingStore::new("temp_data");
/// let staged = FileExtractor::new(store, "sales.csv").extract().await?;
/// # Ok(())
/// # }
/// ```
pub struct FileExtractor {
    store: StagingStore,
    path: PathBuf,
}

impl FileExtractor {
    pub fn new(store: StagingStore, path: impl AsRef<Path>) -> Self {
        Self {
            store,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Decode the file and stage it
    pub fn stage(&self) -> Result<StagedFile> {
        stage_file(&self.store, &self.path)
    }
}

impl Extractor for FileExtractor {
    type Item = StagedFile;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        Ok(vec![self.stage()?])
    }
}

/// Decode `path` and stage it under its file name
pub(crate) fn stage_file(store: &StagingStore, path: &Path) -> Result<StagedFile> {
    if !path.exists() {
        return Err(EtlError::NotFound(path.to_path_buf()).into());
    }
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| EtlError::InvalidArgument(format!("no file name in {}", path.display())))?;

    log::debug!("Extracting {}", path.display());
    let table = codec::read_path(path)?;
    let staged = store.put(name, &table)?;
    log::info!(
        "Extracted {} rows from {} to {}",
        table.num_rows(),
        path.display(),
        staged
    );
    Ok(staged)
}
