//! HTTP API extractor
//!
//! Fetches a URL with GET and stages the body as `api_data.<format>`.

use crate::client::{Auth, HttpClient};
use crate::codec::Format;
use crate::error::EtlError;
use crate::etl::Extractor;
use crate::storage::{StagedFile, StagingStore};
use eyre::{Context, Result};
use reqwest::Method;
use url::Url;

/// Base name API responses are staged under
pub const API_STAGE_NAME: &str = "api_data";

/// Extractor for tabular HTTP responses
///
/// The response body is decoded with the configured format regardless of the
/// URL's extension; JSON bodies must be records or columns.
///
/// # Example
/// ```no_run
/// use stagehand::codec::Format;
/// use stagehand::extract::ApiExtractor;
/// use stagehand::storage::StagingStore;
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("https://api.example.com/rows")?;
/// let extractor = ApiExtractor::try_new(StagingStore::new("temp_data"), url, Format::Json)?;
/// let staged = extractor.stage().await?;
/// # Ok(())
/// # }
/// ```
pub struct ApiExtractor {
    store: StagingStore,
    client: HttpClient,
    format: Format,
}

impl ApiExtractor {
    pub fn try_new(store: StagingStore, url: Url, format: Format) -> Result<Self> {
        Self::with_headers(store, url, format, &[])
    }

    /// Create an extractor that sends extra request headers
    pub fn with_headers(
        store: StagingStore,
        url: Url,
        format: Format,
        headers: &[(String, String)],
    ) -> Result<Self> {
        let client = HttpClient::try_new(url, Auth::None, headers)?;
        Ok(Self {
            store,
            client,
            format,
        })
    }

    /// Staged name for this extractor's format
    pub fn stage_name(&self) -> String {
        format!("{}.{}", API_STAGE_NAME, self.format)
    }

    /// Fetch the URL, decode the body and stage it
    pub async fn stage(&self) -> Result<StagedFile> {
        let url = self.client.url().clone();
        log::debug!("Fetching {}", url);

        let response = self
            .client
            .request(Method::GET, url.clone(), None, None)
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        let status = response.status();
        if !status.is_success() {
            log::debug!("{} answered {}", url, status);
            return Err(EtlError::RemoteFetchFailure {
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read response body from {}", url))?;
        let table = self.format.decode(&body)?;

        let staged = self.store.put(&self.stage_name(), &table)?;
        log::info!(
            "Extracted {} rows from {} to {}",
            table.num_rows(),
            url,
            staged
        );
        Ok(staged)
    }
}

impl Extractor for ApiExtractor {
    type Item = StagedFile;

    async fn extract(&self) -> Result<Vec<Self::Item>> {
        Ok(vec![self.stage().await?])
    }
}
