//! Networking module for Grimoire Tokens.
//!
//! This crate provides the network side of image resolution:
//!
//! - **HTTP Client**: downloads externally hosted token art
//! - **Proxy Endpoint**: builds CORS-mirroring URLs used after a direct
//!   download fails
//!
//! # HTTP Client
//!
//! ```ignore
//! use grimoire_tokens_net::{HttpClient, ProxyEndpoint};
//!
//! let client = HttpClient::builder()
//!     .timeout(Duration::from_secs(15))
//!     .build()?;
//! let proxy = ProxyEndpoint::new("https://proxy.example.com/fetch")?;
//!
//! let url = "https://art.example.com/imp.png";
//! let bytes = match client.fetch_bytes(url).await {
//!     Ok(bytes) => bytes,
//!     Err(_) => client.fetch_bytes(&proxy.mirror_url(url)).await?,
//! };
//! ```

mod error;
pub mod http;
mod proxy;

pub use error::{NetworkError, Result};
pub use proxy::ProxyEndpoint;

// Re-export commonly used types at the crate root
pub use http::{HttpClient, HttpClientBuilder, HttpClientConfig, IMAGE_ACCEPT, LOG_TARGET};
