//! Extractor trait for data extraction from various sources

use eyre::Result;

/// Extractor trait for extracting data from a source
///
/// Implementors define how to pull tables out of sources like:
/// - Local files
/// - Directories of files
/// - HTTP APIs
///
/// # Example
/// ```no_run
/// use stagehand::etl::Extractor;
/// use eyre::Result;
/// use std::path::PathBuf;
///
/// struct ListingExtractor {
///     path: PathBuf,
/// }
///
/// impl Extractor for ListingExtractor {
///     type Item = PathBuf;
///
///     async fn extract(&self) -> Result<Vec<Self::Item>> {
///         Ok(vec![self.path.clone()])
///     }
/// }
/// ```
pub trait Extractor: Send + Sync {
    /// The type of items extracted
    type Item: Send;

    /// Extract items from the source
    ///
    /// # Errors
    /// Returns an error if extraction fails (network, I/O, parsing, etc.)
    fn extract(&self) -> impl std::future::Future<Output = Result<Vec<Self::Item>>> + Send;
}
