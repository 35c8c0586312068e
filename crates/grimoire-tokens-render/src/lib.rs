//! Asset resolution, image caching and token compositing for Grimoire Tokens.
//!
//! The pieces, leaves first:
//!
//! - [`measurement`]: physical units to pixels at a DPI.
//! - [`AssetResolver`]: classifies reference strings into built-in art,
//!   user uploads or direct URLs.
//! - [`ImageLoader`]: turns a [`FetchTarget`] into a decoded [`Bitmap`],
//!   with proxy fallback and in-flight de-duplication.
//! - [`ImageCache`]: bounded LRU of decoded bitmaps.
//! - [`CompositingEngine`]: draws the token disc from a [`BackgroundStyle`].
//!
//! # Rendering a token background
//!
//! ```ignore
//! use grimoire_tokens_render::{
//!     AssetResolver, AssetType, BackgroundSlot, BackgroundStyle, CompositingEngine,
//!     ImageCache, ImageCacheConfig, ImageLoader,
//! };
//!
//! let cache = ImageCache::shared(ImageCacheConfig::default());
//! let loader = ImageLoader::builder().cache(cache).static_root("assets").build();
//! let resolver = AssetResolver::bundled();
//! let engine = CompositingEngine::default();
//!
//! let style = BackgroundStyle::image("parchment");
//! let slot = match resolver.resolve(&style.image_url, AssetType::TokenBackground) {
//!     Some(target) => match loader.load(&target).await {
//!         Ok(bitmap) => BackgroundSlot::Ready(bitmap),
//!         Err(_) => BackgroundSlot::Failed,
//!     },
//!     None => BackgroundSlot::Failed,
//! };
//! let surface = engine.render(&style, 525, &slot)?;
//! ```

pub mod asset_resolver;
pub mod asset_store;
pub mod compositor;
pub mod effects;
mod error;
pub mod gradient;
mod image_buffer;
pub mod image_cache;
pub mod image_loader;
pub mod logging;
pub mod measurement;
pub mod preload;
pub mod style;
pub mod synced_store;
pub mod texture;
mod types;

pub use asset_resolver::{
    AssetReference, AssetResolver, AssetType, BuiltInCatalog, FetchTarget, USER_ASSET_PREFIX,
};
pub use asset_store::{AssetMetadata, InMemoryAssetStore, StoredAsset, UserAssetStore};
pub use compositor::{
    BackgroundSlot, CompositingEngine, CompositorConfig, MAX_ICON_SCALE, TokenSurface,
};
pub use error::{
    AssetError, AssetResult, MeasurementError, RenderError, RenderResult, StoreError, StoreResult,
};
pub use gradient::{GradientStop, sample_gradient};
pub use image_buffer::{ImageBlendMode, ImageBuffer, OutputFormat, ResizeFilter};
pub use image_cache::{
    Bitmap, CacheKey, ImageCache, ImageCacheConfig, ImageCacheStats, SharedImageCache,
};
pub use image_loader::{ImageFetcher, ImageLoader, ImageLoaderBuilder, LoaderStats, decode_bitmap};
pub use measurement::{
    DEFAULT_DPI, Measurement, MeasurementUnit, to_pixels, to_unit, token_diameter_px,
};
pub use preload::{DEFAULT_PRELOAD_CAPACITY, PreloadQueue, PreloadTick};
pub use style::{
    BackgroundStyle, EffectSettings, FillMode, GradientSettings, GradientType, IconSettings,
    LightSettings, SourceType, TextureSettings, TextureType,
};
pub use synced_store::{
    DiskSyncedStore, InMemorySyncedStore, SyncedImageStore, synced_key_for_url,
};
pub use types::{Color, Point};

// Re-exported so fetcher implementations can name the error type.
pub use grimoire_tokens_net::{NetworkError, ProxyEndpoint};
