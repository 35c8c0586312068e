//! Error types for configuration and token generation.

use std::path::PathBuf;

use grimoire_tokens_net::NetworkError;
use grimoire_tokens_render::{MeasurementError, RenderError, StoreError};
use thiserror::Error;

/// Errors raised while reading or validating a [`TokenConfig`](crate::TokenConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML text is malformed or has values of the wrong type.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be written back out as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is out of range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors that abort token generation.
///
/// Broken art references are not among them: those degrade to a
/// placeholder and are reported on the [`TokenRender`](crate::TokenRender).
#[derive(Error, Debug)]
pub enum TokenError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),

    #[error("invalid token size: {0}")]
    Measurement(#[from] MeasurementError),

    #[error("asset store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("network setup failed: {0}")]
    Network(#[from] NetworkError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type for token generation.
pub type TokenResult<T> = std::result::Result<T, TokenError>;
