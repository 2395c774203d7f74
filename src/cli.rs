//! CLI helper functions
//!
//! One function per subcommand. Each runs a single pipeline stage against the
//! staging store and returns what it produced; printing is left to the binary.

use crate::{
    client::parse_header,
    codec::Format,
    credentials::CredentialSource,
    error::EtlError,
    etl::Extractor,
    extract::{ApiExtractor, DirectoryExtractor, FileExtractor},
    load::{self, LoadReport, LoadRequest},
    storage::{StagedFile, StagingStore},
    transform::{TransformOptions, transform_staged},
};
use eyre::Result;
use std::path::Path;
use url::Url;

/// Stage a single CSV, JSON or Parquet file
pub async fn extract_file(store: &StagingStore, path: impl AsRef<Path>) -> Result<StagedFile> {
    let path = path.as_ref();
    log::info!("Extracting {}", path.display());
    let mut staged = FileExtractor::new(store.clone(), path).extract().await?;
    staged
        .pop()
        .ok_or_else(|| EtlError::NotFound(path.to_path_buf()).into())
}

/// Stage every supported file in a directory
pub async fn extract_directory(
    store: &StagingStore,
    dir: impl AsRef<Path>,
) -> Result<Vec<StagedFile>> {
    let dir = dir.as_ref();
    log::info!("Extracting files from {}", dir.display());
    DirectoryExtractor::new(store.clone(), dir).extract().await
}

/// Fetch a URL and stage the response body
///
/// `headers` are `Name: value` strings sent with the request.
pub async fn extract_api(
    store: &StagingStore,
    url: &str,
    format: Format,
    headers: &[String],
) -> Result<StagedFile> {
    let url = Url::parse(url)
        .map_err(|e| EtlError::InvalidArgument(format!("invalid URL '{}': {}", url, e)))?;
    let headers = headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()?;

    log::info!("Fetching {} as {}", url, format);
    ApiExtractor::with_headers(store.clone(), url, format, &headers)?
        .stage()
        .await
}

/// Transform a staged file and stage the result
pub fn transform(store: &StagingStore, name: &str, options: &TransformOptions) -> Result<StagedFile> {
    transform_staged(store, name, options)
}

/// Load a file, or a staged file of that name, into a backend
pub async fn load_data(
    store: &StagingStore,
    request: LoadRequest<'_>,
    source: &CredentialSource,
) -> Result<LoadReport> {
    load::load(store, request, source).await
}

/// Staged files, sorted by name
pub fn list_staged(store: &StagingStore) -> Result<Vec<StagedFile>> {
    store.list()
}
