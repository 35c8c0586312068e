//! HTTP client implementation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;

use crate::error::{NetworkError, Result};

/// `tracing` target for downloads.
pub const LOG_TARGET: &str = "grimoire_tokens_net::http";

/// `Accept` header sent with every download. WebP first, since that is
/// what the bundled and synced art uses.
pub const IMAGE_ACCEPT: &str = "image/webp,image/png,image/*;q=0.8";

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// Largest response body accepted, in bytes.
    ///
    /// Token art is rarely more than a few megabytes; anything past this
    /// limit is treated as a failed download rather than decoded.
    pub max_body_bytes: u64,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: Some(format!(
                "GrimoireTokens/{} (Rust)",
                env!("CARGO_PKG_VERSION")
            )),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Builder for creating an HTTP client with custom configuration.
pub struct HttpClientBuilder {
    config: HttpClientConfig,
    default_headers: http::HeaderMap,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            default_headers: http::HeaderMap::new(),
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set the largest accepted response body.
    pub fn max_body_bytes(mut self, bytes: u64) -> Self {
        self.config.max_body_bytes = bytes;
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Result<Self> {
        let name = name
            .try_into()
            .map_err(|_| NetworkError::InvalidHeader("Invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| NetworkError::InvalidHeader("Invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Build the HTTP client.
    pub fn build(self) -> Result<HttpClient> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if self.config.follow_redirects {
            builder = builder.redirect(Policy::limited(self.config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }

        builder = builder.default_headers(self.default_headers);

        let client = builder.build()?;

        Ok(HttpClient {
            inner: Arc::new(HttpClientInner {
                client,
                config: self.config,
            }),
        })
    }
}

/// Internal state for the HTTP client.
struct HttpClientInner {
    client: reqwest::Client,
    config: HttpClientConfig,
}

/// A high-level HTTP client for downloading token art.
///
/// The client is cheaply cloneable and thread-safe. Clones share the same
/// underlying connection pool and configuration.
///
/// # Example
///
/// ```ignore
/// use grimoire_tokens_net::http::HttpClient;
///
/// let client = HttpClient::new();
/// let bytes = client.fetch_bytes("https://example.com/imp.webp").await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<HttpClientInner>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialised. Use
    /// [`HttpClient::builder`] to handle that case.
    pub fn new() -> Self {
        HttpClientBuilder::new()
            .build()
            .expect("Failed to create HTTP client with default configuration")
    }

    /// Create a builder for configuring a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Get the client's configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    /// Download a resource and return its body.
    ///
    /// Non-2xx statuses and bodies over the configured size limit are
    /// reported as errors so callers can fall back to another source.
    pub async fn fetch_bytes(&self, url: &str) -> Result<bytes::Bytes> {
        tracing::debug!(target: LOG_TARGET, url, "fetching");
        let parsed = url::Url::parse(url)?;
        let response = self
            .inner
            .client
            .get(parsed)
            .header(ACCEPT, IMAGE_ACCEPT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        if let Some(len) = response.content_length()
            && len > self.inner.config.max_body_bytes
        {
            return Err(NetworkError::InvalidBody(format!(
                "body of {len} bytes exceeds limit of {}",
                self.inner.config.max_body_bytes
            )));
        }

        let body = response.bytes().await?;
        if body.len() as u64 > self.inner.config.max_body_bytes {
            return Err(NetworkError::InvalidBody(format!(
                "body of {} bytes exceeds limit of {}",
                body.len(),
                self.inner.config.max_body_bytes
            )));
        }
        Ok(body)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
