//! Error types for the networking module.

use std::fmt;

/// Network-specific errors.
#[derive(Debug, Clone)]
pub enum NetworkError {
    /// HTTP request failed.
    Request(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Request timed out.
    Timeout,
    /// Connection refused or failed.
    Connection(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// Reading the response body failed part way through.
    InvalidBody(String),
    /// HTTP error status (4xx or 5xx).
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The URL that produced the status.
        url: String,
    },
    /// Redirect limit exceeded.
    TooManyRedirects,
    /// The proxy endpoint is not a usable base URL.
    Proxy(String),
}

impl NetworkError {
    /// Whether a retry through the mirroring proxy could plausibly succeed.
    ///
    /// Malformed URLs fail identically through the proxy, everything else
    /// (refused connections, CORS-style rejections, 4xx/5xx) might not.
    pub fn is_retryable_via_proxy(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_) | Self::Proxy(_))
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(msg) => write!(f, "HTTP request error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Connection(msg) => write!(f, "Connection error: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::InvalidBody(msg) => write!(f, "Invalid response body: {msg}"),
            Self::HttpStatus { status, url } => write!(f, "HTTP {status} from {url}"),
            Self::TooManyRedirects => write!(f, "Too many redirects"),
            Self::Proxy(msg) => write!(f, "Proxy error: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if err.is_redirect() {
            Self::TooManyRedirects
        } else if err.is_body() || err.is_decode() {
            Self::InvalidBody(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for NetworkError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;
