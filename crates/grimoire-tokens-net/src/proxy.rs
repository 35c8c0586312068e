//! CORS mirroring proxy endpoint.
//!
//! Externally hosted art often refuses cross-origin reads. The proxy
//! re-serves the same bytes with permissive headers; it is only consulted
//! after a direct download has failed.
//!
//! The contract is `GET <base>?<urlencoded original URL>`: the whole query
//! string is the encoded URL, not a `key=value` pair.

use crate::error::{NetworkError, Result};

/// A validated proxy base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyEndpoint {
    base: String,
}

impl ProxyEndpoint {
    /// Create an endpoint from its base URL.
    ///
    /// The base must be an absolute `http(s)` URL without a query string.
    pub fn new(base: impl Into<String>) -> Result<Self> {
        let base = base.into();
        let trimmed = base.trim_end_matches('?');
        let parsed = url::Url::parse(trimmed)?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(NetworkError::Proxy(format!(
                "unsupported proxy scheme '{}'",
                parsed.scheme()
            )));
        }
        if parsed.query().is_some() {
            return Err(NetworkError::Proxy(
                "proxy base must not carry a query string".to_string(),
            ));
        }

        Ok(Self {
            base: trimmed.to_string(),
        })
    }

    /// The base URL, without the trailing `?`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Build the URL that mirrors `original` through this proxy.
    pub fn mirror_url(&self, original: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(original.as_bytes()).collect();
        format!("{}?{}", self.base, encoded)
    }
}

impl std::fmt::Display for ProxyEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.base)
    }
}
