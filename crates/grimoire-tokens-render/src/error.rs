//! Error types for the render crate.

use thiserror::Error;

/// Errors raised while producing or exporting a token surface.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Invalid surface dimensions (zero width or height).
    #[error("invalid surface dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Raw pixel data did not match the stated dimensions.
    #[error("invalid pixel data: expected {expected} bytes, got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Bytes could not be decoded as an image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Encoding the finished bitmap failed.
    #[error("failed to encode image: {0}")]
    Encode(String),

    /// A physical measurement could not be converted.
    #[error(transparent)]
    Measurement(#[from] MeasurementError),
}

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Reasons an asset reference could not be turned into pixels.
///
/// Every variant degrades to a placeholder at render time; none of them
/// aborts a render. The type is `Clone` because one shared in-flight load
/// hands the same outcome to every waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// A user-uploaded asset is not present in the local library.
    #[error("user asset '{uuid}' not found in the local asset library")]
    AssetNotFound { uuid: String },

    /// Both the direct download and the proxy retry failed.
    #[error("failed to load '{direct_url}' (proxy '{proxy_url}' also failed: {reason})")]
    LoadFailed {
        direct_url: String,
        proxy_url: String,
        reason: String,
    },

    /// Bytes were obtained but are not a decodable image.
    #[error("failed to decode image from '{source_id}': {reason}")]
    DecodeFailed { source_id: String, reason: String },

    /// A bundled built-in file could not be read.
    #[error("built-in asset '{path}' could not be read: {reason}")]
    BuiltInMissing { path: String, reason: String },

    /// The local asset library itself failed.
    #[error("asset store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

/// Result type for asset resolution.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors from unit conversion.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MeasurementError {
    /// The value to convert was NaN or infinite.
    #[error("measurement value must be finite, got {0}")]
    NonFiniteValue(f64),

    /// The DPI was not a positive finite number.
    #[error("dpi must be positive and finite, got {0}")]
    InvalidDpi(f64),
}

/// Errors from the local asset library and the synced image store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem access failed.
    #[error("store I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A key cannot be used to address the store.
    #[error("invalid store key '{0}'")]
    InvalidKey(String),

    /// The backing store reported an error of its own.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<std::path::PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StoreError> for AssetError {
    fn from(err: StoreError) -> Self {
        AssetError::StoreUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
