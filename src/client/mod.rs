//! HTTP client and authentication.
//!
//! This module provides the [`HttpClient`] used by the API extractor and the
//! warehouse backends, along with the [`Auth`] schemes they authenticate with.

mod auth;
mod http;

pub use auth::Auth;
pub use http::HttpClient;
pub use http::parse_header;

#[cfg(test)]
pub(crate) mod fake;
