//! Tiered loading of image references into decoded bitmaps.
//!
//! [`ImageLoader::load`] turns a [`FetchTarget`] into a [`Bitmap`]:
//!
//! 1. The shared cache is consulted first.
//! 2. Built-in art is read from the static asset root. No network.
//! 3. User assets come from the local asset library.
//! 4. Direct URLs: `data:` URIs decode inline; character icons whose file
//!    name is a character id are served from the synced store when
//!    present; otherwise the URL is fetched directly, then once more
//!    through the CORS proxy if that fails.
//!
//! Concurrent loads of the same key share one in-flight operation.
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens_render::{AssetResolver, AssetType, ImageCache, ImageCacheConfig, ImageLoader};
//!
//! let cache = ImageCache::shared(ImageCacheConfig::default());
//! let loader = ImageLoader::builder()
//!     .cache(cache)
//!     .static_root("/usr/share/grimoire/assets")
//!     .proxy_base("https://proxy.example.com/fetch")?
//!     .build();
//!
//! let target = AssetResolver::bundled()
//!     .resolve("https://example.com/imp.png", AssetType::CharacterIcon)
//!     .unwrap();
//! let bitmap = loader.load(&target).await?;
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use base64::Engine as _;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use grimoire_tokens_net::{HttpClient, NetworkError, ProxyEndpoint};
use parking_lot::Mutex;

use crate::asset_resolver::{AssetType, FetchTarget};
use crate::asset_store::{InMemoryAssetStore, UserAssetStore};
use crate::error::{AssetError, AssetResult, RenderError, RenderResult};
use crate::image_buffer::ImageBuffer;
use crate::image_cache::{Bitmap, CacheKey, ImageCache, ImageCacheConfig, SharedImageCache};
use crate::logging::targets::LOADER as TARGET;
use crate::synced_store::{SyncedImageStore, synced_key_for_url};

/// Network seam of the loader.
pub trait ImageFetcher: Send + Sync {
    /// Download the body at `url`.
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, NetworkError>>;
}

impl ImageFetcher for HttpClient {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, NetworkError>> {
        async move { self.fetch_bytes(url).await.map(|body| body.to_vec()) }.boxed()
    }
}

/// Decode encoded image bytes off the async executor.
pub async fn decode_bitmap(bytes: Vec<u8>) -> RenderResult<Bitmap> {
    tokio::task::spawn_blocking(move || ImageBuffer::from_bytes(&bytes).map(Arc::new))
        .await
        .map_err(|e| RenderError::Decode(format!("decode task failed: {e}")))?
}

type SharedLoad = Shared<BoxFuture<'static, AssetResult<Bitmap>>>;

/// Counters describing where loads were served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderStats {
    /// Loads answered by the cache without any I/O.
    pub cache_hits: u64,
    /// Loads that joined an identical load already in flight.
    pub dedup_joins: u64,
    /// Direct network fetches attempted.
    pub network_attempts: u64,
    /// Proxy fetches attempted.
    pub proxy_attempts: u64,
    /// Character icons served from the synced store.
    pub synced_hits: u64,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    dedup_joins: AtomicU64,
    network_attempts: AtomicU64,
    proxy_attempts: AtomicU64,
    synced_hits: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> LoaderStats {
        LoaderStats {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            dedup_joins: self.dedup_joins.load(Ordering::Relaxed),
            network_attempts: self.network_attempts.load(Ordering::Relaxed),
            proxy_attempts: self.proxy_attempts.load(Ordering::Relaxed),
            synced_hits: self.synced_hits.load(Ordering::Relaxed),
        }
    }
}

struct LoaderInner {
    cache: SharedImageCache,
    fetcher: Arc<dyn ImageFetcher>,
    user_assets: Arc<dyn UserAssetStore>,
    synced: Option<Arc<dyn SyncedImageStore>>,
    static_root: PathBuf,
    proxy: Option<ProxyEndpoint>,
    /// In-flight loads, tagged with a load id so a finished load only
    /// removes its own entry.
    pending: Mutex<HashMap<CacheKey, (u64, SharedLoad)>>,
    next_load: AtomicU64,
    counters: Counters,
}

/// Resolves fetch targets to decoded bitmaps. Cheap to clone.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

impl ImageLoader {
    /// Start building a loader.
    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::default()
    }

    /// The cache this loader fills.
    pub fn cache(&self) -> &SharedImageCache {
        &self.inner.cache
    }

    /// The proxy used after a direct download fails, if any.
    pub fn proxy(&self) -> Option<&ProxyEndpoint> {
        self.inner.proxy.as_ref()
    }

    /// Current load statistics.
    pub fn stats(&self) -> LoaderStats {
        self.inner.counters.snapshot()
    }

    /// Number of distinct loads currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Empty the cache and forget in-flight loads.
    ///
    /// Loads already running still resolve for their callers, but their
    /// results are not stored, and the next request for the same key
    /// starts a fresh load.
    pub fn clear_cache(&self) {
        let forgotten = {
            let mut pending = self.inner.pending.lock();
            let n = pending.len();
            pending.clear();
            n
        };
        self.inner.cache.lock().clear();
        tracing::debug!(target: TARGET, forgotten, "loader cache cleared");
    }

    /// Return the cached bitmap for `target`, if any, without doing I/O.
    pub fn peek(&self, target: &FetchTarget) -> Option<Bitmap> {
        self.inner.cache.lock().get(&target.cache_key())
    }

    /// Load a bitmap, from cache if possible.
    pub async fn load(&self, target: &FetchTarget) -> AssetResult<Bitmap> {
        let key = target.cache_key();

        if let Some(bitmap) = self.inner.cache.lock().get(&key) {
            Counters::bump(&self.inner.counters.cache_hits);
            return Ok(bitmap);
        }

        let shared = {
            let mut pending = self.inner.pending.lock();
            if let Some(existing) = pending.get(&key).map(|(_, load)| load.clone()) {
                Counters::bump(&self.inner.counters.dedup_joins);
                tracing::trace!(target: TARGET, key = %key, "joining in-flight load");
                existing
            } else {
                let id = self.inner.next_load.fetch_add(1, Ordering::Relaxed);
                let load = Self::shared_load(self.inner.clone(), target.clone(), key.clone(), id);
                pending.insert(key, (id, load.clone()));
                load
            }
        };

        shared.await
    }

    fn shared_load(inner: Arc<LoaderInner>, target: FetchTarget, key: CacheKey, id: u64) -> SharedLoad {
        async move {
            let result = inner.load_uncached(&target, &key).await;
            let mut pending = inner.pending.lock();
            if pending.get(&key).is_some_and(|(current, _)| *current == id) {
                pending.remove(&key);
            }
            result
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("static_root", &self.inner.static_root)
            .field("proxy", &self.inner.proxy)
            .field("synced_store", &self.inner.synced.is_some())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl LoaderInner {
    async fn load_uncached(&self, target: &FetchTarget, key: &CacheKey) -> AssetResult<Bitmap> {
        let generation = {
            let cache = self.cache.lock();
            // Another load may have finished between the caller's miss and now.
            if let Some(bitmap) = cache.peek(key) {
                return Ok(bitmap);
            }
            cache.generation()
        };

        let bitmap = match target {
            FetchTarget::BuiltIn { path, .. } => self.load_builtin(path).await?,
            FetchTarget::UserAsset { uuid, .. } => self.load_user_asset(uuid).await?,
            FetchTarget::DirectUrl { url, asset_type } => self.load_url(url, *asset_type).await?,
        };

        {
            let mut cache = self.cache.lock();
            if cache.generation() != generation {
                tracing::debug!(target: TARGET, key = %key, "cache cleared during load, not storing");
                return Ok(bitmap);
            }
            cache.put(key.clone(), bitmap.clone());
        }
        tracing::debug!(
            target: TARGET,
            key = %key,
            width = bitmap.width(),
            height = bitmap.height(),
            "loaded image"
        );
        Ok(bitmap)
    }

    async fn load_builtin(&self, path: &str) -> AssetResult<Bitmap> {
        let full = self.static_root.join(path);
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|e| AssetError::BuiltInMissing {
                path: path.to_string(),
                reason: e.to_string(),
            })?;
        decode_as(bytes, path).await
    }

    async fn load_user_asset(&self, uuid: &str) -> AssetResult<Bitmap> {
        let asset = self
            .user_assets
            .get(uuid)
            .await?
            .ok_or_else(|| AssetError::AssetNotFound {
                uuid: uuid.to_string(),
            })?;
        decode_as(asset.blob.to_vec(), &format!("asset:{uuid}")).await
    }

    async fn load_url(&self, url: &str, asset_type: AssetType) -> AssetResult<Bitmap> {
        if url.starts_with("data:") {
            let bytes = decode_data_uri(url).ok_or_else(|| AssetError::DecodeFailed {
                source_id: "data: URI".to_string(),
                reason: "malformed data URI".to_string(),
            })?;
            return decode_as(bytes, "data: URI").await;
        }

        if asset_type == AssetType::CharacterIcon
            && let Some(bitmap) = self.load_synced(url).await
        {
            return Ok(bitmap);
        }

        Counters::bump(&self.counters.network_attempts);
        let direct_failure = match self.fetcher.fetch(url).await {
            Ok(bytes) => match decode_bitmap(bytes).await {
                Ok(bitmap) => return Ok(bitmap),
                Err(e) => {
                    tracing::debug!(target: TARGET, url, error = %e, "direct download did not decode");
                    e.to_string()
                }
            },
            Err(e) if !e.is_retryable_via_proxy() => {
                return Err(AssetError::LoadFailed {
                    direct_url: url.to_string(),
                    proxy_url: String::new(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                tracing::debug!(target: TARGET, url, error = %e, "direct download failed");
                e.to_string()
            }
        };

        let Some(proxy) = &self.proxy else {
            return Err(AssetError::LoadFailed {
                direct_url: url.to_string(),
                proxy_url: String::new(),
                reason: format!("{direct_failure}; no proxy configured"),
            });
        };

        let proxy_url = proxy.mirror_url(url);
        Counters::bump(&self.counters.proxy_attempts);
        tracing::debug!(target: TARGET, url, proxy_url, "retrying through proxy");

        let bytes = self.fetcher.fetch(&proxy_url).await.map_err(|e| {
            tracing::warn!(target: TARGET, url, error = %e, "direct and proxy downloads failed");
            AssetError::LoadFailed {
                direct_url: url.to_string(),
                proxy_url: proxy_url.clone(),
                reason: e.to_string(),
            }
        })?;
        decode_as(bytes, &proxy_url).await
    }

    /// Serve character art from the synced store. Store errors and
    /// undecodable entries fall through to the network.
    async fn load_synced(&self, url: &str) -> Option<Bitmap> {
        let store = self.synced.as_ref()?;
        let id = synced_key_for_url(url)?;

        let bytes = match store.get(&id).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(target: TARGET, id, error = %e, "synced store lookup failed");
                return None;
            }
        };

        match decode_bitmap(bytes).await {
            Ok(bitmap) => {
                Counters::bump(&self.counters.synced_hits);
                tracing::trace!(target: TARGET, id, "served from synced store");
                Some(bitmap)
            }
            Err(e) => {
                tracing::warn!(target: TARGET, id, error = %e, "synced art did not decode");
                None
            }
        }
    }
}

async fn decode_as(bytes: Vec<u8>, source_id: &str) -> AssetResult<Bitmap> {
    decode_bitmap(bytes)
        .await
        .map_err(|e| AssetError::DecodeFailed {
            source_id: source_id.to_string(),
            reason: e.to_string(),
        })
}

/// Payload of a `data:` URI, base64 or percent-encoded.
fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;

    if meta
        .rsplit(';')
        .next()
        .is_some_and(|param| param.eq_ignore_ascii_case("base64"))
    {
        let cleaned: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        base64::engine::general_purpose::STANDARD
            .decode(cleaned)
            .ok()
    } else {
        percent_decode(payload)
    }
}

fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

// ============================================================================
// BUILDER
// ============================================================================

/// Builder for [`ImageLoader`].
#[derive(Default)]
pub struct ImageLoaderBuilder {
    cache: Option<SharedImageCache>,
    fetcher: Option<Arc<dyn ImageFetcher>>,
    user_assets: Option<Arc<dyn UserAssetStore>>,
    synced: Option<Arc<dyn SyncedImageStore>>,
    static_root: PathBuf,
    proxy: Option<ProxyEndpoint>,
}

impl ImageLoaderBuilder {
    /// Cache to read from and fill. Defaults to a fresh default-sized cache.
    #[must_use]
    pub fn cache(mut self, cache: SharedImageCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Network fetcher. Defaults to an [`HttpClient`].
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Local asset library. Defaults to an empty in-memory store.
    #[must_use]
    pub fn user_assets(mut self, store: Arc<dyn UserAssetStore>) -> Self {
        self.user_assets = Some(store);
        self
    }

    /// Store of pre-synchronised character art.
    #[must_use]
    pub fn synced_store(mut self, store: Arc<dyn SyncedImageStore>) -> Self {
        self.synced = Some(store);
        self
    }

    /// Directory built-in paths are relative to.
    #[must_use]
    pub fn static_root(mut self, root: impl AsRef<Path>) -> Self {
        self.static_root = root.as_ref().to_path_buf();
        self
    }

    /// Proxy used after a direct download fails.
    #[must_use]
    pub fn proxy(mut self, proxy: ProxyEndpoint) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Parse and set the proxy base URL.
    pub fn proxy_base(self, base: &str) -> Result<Self, NetworkError> {
        Ok(self.proxy(ProxyEndpoint::new(base)?))
    }

    /// Build the loader.
    pub fn build(self) -> ImageLoader {
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(HttpClient::new()) as Arc<dyn ImageFetcher>);

        ImageLoader {
            inner: Arc::new(LoaderInner {
                cache: self
                    .cache
                    .unwrap_or_else(|| ImageCache::shared(ImageCacheConfig::default())),
                fetcher,
                user_assets: self
                    .user_assets
                    .unwrap_or_else(|| Arc::new(InMemoryAssetStore::new())),
                synced: self.synced,
                static_root: self.static_root,
                proxy: self.proxy,
                pending: Mutex::new(HashMap::new()),
                next_load: AtomicU64::new(0),
                counters: Counters::default(),
            }),
        }
    }
}
