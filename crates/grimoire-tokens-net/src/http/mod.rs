//! HTTP client for Grimoire Tokens.
//!
//! A thin wrapper over `reqwest` that downloads image bytes. Failures are
//! reported as [`NetworkError`](crate::NetworkError) values so the image
//! loader can decide whether to retry through the proxy.
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens_net::http::HttpClient;
//!
//! let client = HttpClient::new();
//! let body = client.fetch_bytes("https://example.com/imp.png").await?;
//! println!("{} bytes", body.len());
//! ```

mod client;

pub use client::{HttpClient, HttpClientBuilder, HttpClientConfig, IMAGE_ACCEPT, LOG_TARGET};
