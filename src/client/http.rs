//! HTTP client module
//!
//! Provides `HttpClient`, a thin wrapper over `reqwest` bound to a base URL
//! and an authentication scheme.

use super::Auth;
use eyre::{Result, eyre};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, Method, Response};
use url::Url;

/// User agent sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!("stagehand/", env!("CARGO_PKG_VERSION"));

/// HTTP client for one remote service.
///
/// Relative paths passed to the helpers are joined onto the base URL.
///
/// # Example
/// ```no_run
/// use stagehand::client::{Auth, HttpClient};
/// use url::Url;
///
/// # async fn example() -> eyre::Result<()> {
/// let url = Url::parse("https://bigquery.googleapis.com/")?;
/// let client = HttpClient::try_new(url, Auth::Bearer("token".into()), &[])?;
/// let response = client.get("bigquery/v2/projects/demo/jobs/abc").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: Client,
    url: Url,
}

impl HttpClient {
    /// Create a client from a base URL, an auth scheme and extra default
    /// headers (`Name: value` pairs).
    ///
    /// # Errors
    /// Returns an error if a header is invalid or the client cannot be built
    pub fn try_new(url: Url, auth: Auth, extra_headers: &[(String, String)]) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        auth.apply(&mut headers)?;
        for (name, value) in extra_headers {
            let name: HeaderName = name
                .parse()
                .map_err(|e| eyre!("Invalid header name '{}': {}", name, e))?;
            let value: HeaderValue = value
                .parse()
                .map_err(|e| eyre!("Invalid value for header '{}': {}", name, e))?;
            headers.insert(name, value);
        }
        let client = Client::builder().default_headers(headers).build()?;
        log::debug!("HTTP client for {} using {} auth", url, auth);
        Ok(Self { client, url })
    }

    /// Get the base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolve a path against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.url.join(path)?)
    }

    /// Send a request to an absolute URL.
    pub async fn request(
        &self,
        method: Method,
        url: Url,
        content_type: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> Result<Response> {
        log::trace!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(body) = body {
            request = request.body(body);
        }
        request
            .send()
            .await
            .map_err(|e| eyre!("Failed to send request: {}", e))
    }

    /// Helper for GET requests.
    pub async fn get(&self, path: &str) -> Result<Response> {
        self.request(Method::GET, self.endpoint(path)?, None, None)
            .await
    }

    /// Helper for POST requests with a raw body.
    pub async fn post_bytes(
        &self,
        path: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> Result<Response> {
        self.request(Method::POST, self.endpoint(path)?, Some(content_type), Some(body))
            .await
    }
}

/// Split a `Name: value` header argument
pub fn parse_header(arg: &str) -> Result<(String, String)> {
    arg.split_once(':')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| eyre!("Header '{}' must look like 'Name: value'", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base() {
        let url = Url::parse("https://example.com/api/").unwrap();
        let client = HttpClient::try_new(url, Auth::None, &[]).unwrap();
        assert_eq!(
            client.endpoint("jobs/1").unwrap().as_str(),
            "https://example.com/api/jobs/1"
        );
    }

    #[test]
    fn test_invalid_header_rejected() {
        let url = Url::parse("https://example.com").unwrap();
        let headers = vec![("bad header".to_string(), "x".to_string())];
        assert!(HttpClient::try_new(url, Auth::None, &headers).is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Api-Key: abc:def").unwrap(),
            ("X-Api-Key".to_string(), "abc:def".to_string())
        );
        assert!(parse_header("novalue").is_err());
        assert!(parse_header(": v").is_err());
    }
}
