//! Integration tests for asset resolution and loading.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use grimoire_tokens_render::{
    AssetError, AssetMetadata, AssetReference, AssetResolver, AssetType, Color, FetchTarget,
    ImageBuffer, ImageCache, ImageCacheConfig, ImageFetcher, ImageLoader, InMemoryAssetStore,
    InMemorySyncedStore, NetworkError, PreloadQueue, ProxyEndpoint,
};
use parking_lot::Mutex;

/// Fetcher serving canned bodies, counting every request.
#[derive(Default)]
struct MockFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl MockFetcher {
    fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ImageFetcher for MockFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, NetworkError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().push(url.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.bodies.get(url).cloned().ok_or(NetworkError::HttpStatus {
                status: 403,
                url: url.to_string(),
            })
        }
        .boxed()
    }
}

fn png(color: Color) -> Vec<u8> {
    ImageBuffer::from_color(4, 4, color).to_png().unwrap()
}

fn centre(bitmap: &ImageBuffer) -> [u8; 4] {
    bitmap.get_pixel(2, 2).unwrap().to_rgba8()
}

const PROXY: &str = "https://proxy.example.com/fetch";

/// Show loader logs for failing tests (`cargo test -- --nocapture`).
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
async fn test_builtins_load_from_static_root_without_network() {
    let root = tempfile::tempdir().unwrap();
    let resolver = AssetResolver::bundled();

    for asset_type in AssetType::ALL {
        for id in resolver.catalog().ids(asset_type) {
            let path = root.path().join(resolver.catalog().path(asset_type, id).unwrap());
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, png(Color::WHITE)).unwrap();
        }
    }

    let fetcher = Arc::new(MockFetcher::default());
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .static_root(root.path())
        .proxy(ProxyEndpoint::new(PROXY).unwrap())
        .build();

    let mut loaded = 0;
    for asset_type in AssetType::ALL {
        for id in resolver.catalog().ids(asset_type) {
            let reference = resolver.classify(id, asset_type);
            assert!(matches!(reference, AssetReference::BuiltIn { .. }), "{id}");
            let target = reference.into_target().unwrap();
            loader.load(&target).await.unwrap();
            loaded += 1;
        }
    }

    assert!(loaded > 0);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(loader.stats().network_attempts, 0);
}

#[tokio::test]
async fn test_missing_builtin_file() {
    let root = tempfile::tempdir().unwrap();
    let loader = ImageLoader::builder()
        .fetcher(Arc::new(MockFetcher::default()))
        .static_root(root.path())
        .build();

    let target = AssetResolver::bundled()
        .resolve("imp", AssetType::CharacterIcon)
        .unwrap();
    assert!(matches!(
        loader.load(&target).await,
        Err(AssetError::BuiltInMissing { .. })
    ));
}

#[tokio::test]
async fn test_user_asset_is_decoded_from_store() {
    let store = Arc::new(InMemoryAssetStore::new());
    let uuid = "6f1c1c1e-3a55-4d2e-9d0b-0c7b1b1e2f3a";
    store.insert(
        uuid,
        png(Color::from_rgba8(10, 20, 30, 255)),
        AssetMetadata::new(AssetType::TokenBackground).with_mime_type("image/png"),
    );

    let fetcher = Arc::new(MockFetcher::default());
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .user_assets(store.clone())
        .build();

    let target = AssetResolver::bundled()
        .resolve(&format!("asset:{uuid}"), AssetType::TokenBackground)
        .unwrap();
    let bitmap = loader.load(&target).await.unwrap();
    assert_eq!(centre(&bitmap), [10, 20, 30, 255]);

    // Second load is a cache hit; the store is not asked again.
    loader.load(&target).await.unwrap();
    assert_eq!(store.lookups(), 1);
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_loads_share_one_fetch() {
    init_tracing();
    let url = "https://art.example.com/imp.png";
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body(url, png(Color::BLACK))
            .with_delay(Duration::from_millis(20)),
    );
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).build();
    let target = FetchTarget::url(url, AssetType::CharacterIcon);

    let (a, b, c) = tokio::join!(loader.load(&target), loader.load(&target), loader.load(&target));
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(fetcher.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(loader.stats().dedup_joins, 2);
    assert_eq!(loader.in_flight(), 0);
    assert!(loader.cache().lock().contains(&target.cache_key()));
}

#[tokio::test]
async fn test_concurrent_loads_from_spawned_tasks() {
    let url = "https://art.example.com/baron.png";
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body(url, png(Color::WHITE))
            .with_delay(Duration::from_millis(20)),
    );
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).build();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let loader = loader.clone();
            tokio::spawn(async move {
                loader
                    .load(&FetchTarget::url(url, AssetType::CharacterIcon))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_clear_cache_discards_in_flight_results() {
    init_tracing();
    let url = "https://art.example.com/vortox.png";
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body(url, png(Color::WHITE))
            .with_delay(Duration::from_millis(60)),
    );
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).build();
    let target = FetchTarget::url(url, AssetType::CharacterIcon);
    let spawn_load = || {
        let loader = loader.clone();
        let target = target.clone();
        tokio::spawn(async move { loader.load(&target).await })
    };

    let stale = spawn_load();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(loader.in_flight(), 1);

    loader.clear_cache();
    assert_eq!(loader.in_flight(), 0);

    // A request after the clear starts its own fetch instead of joining.
    let fresh = spawn_load();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fetcher.calls(), 2);

    // The stale load still answers its caller but is not cached, and does
    // not unregister the fresh load.
    stale.await.unwrap().unwrap();
    assert!(!loader.cache().lock().contains(&target.cache_key()));
    assert_eq!(loader.in_flight(), 1);

    fresh.await.unwrap().unwrap();
    assert!(loader.cache().lock().contains(&target.cache_key()));
    assert_eq!(loader.in_flight(), 0);
    assert_eq!(loader.stats().dedup_joins, 0);
}

#[tokio::test]
async fn test_synced_store_short_circuits_network() {
    let synced = Arc::new(InMemorySyncedStore::new());
    synced.insert("washerwoman", png(Color::from_rgba8(200, 100, 50, 255)));

    let fetcher = Arc::new(MockFetcher::default());
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .synced_store(synced.clone())
        .proxy(ProxyEndpoint::new(PROXY).unwrap())
        .build();

    let target = AssetResolver::bundled()
        .resolve("washerwoman.webp", AssetType::CharacterIcon)
        .unwrap();
    assert!(matches!(target, FetchTarget::DirectUrl { .. }));

    let bitmap = loader.load(&target).await.unwrap();
    assert_eq!(centre(&bitmap), [200, 100, 50, 255]);
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(loader.stats().synced_hits, 1);
    assert_eq!(synced.hits(), 1);
}

#[tokio::test]
async fn test_synced_store_only_applies_to_character_icons() {
    let synced = Arc::new(InMemorySyncedStore::new());
    synced.insert("washerwoman", png(Color::WHITE));

    let fetcher = Arc::new(MockFetcher::default());
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .synced_store(synced)
        .build();

    let target = FetchTarget::url("washerwoman.webp", AssetType::TokenBackground);
    assert!(loader.load(&target).await.is_err());
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn test_proxy_fallback_after_direct_failure() {
    init_tracing();
    let url = "https://art.example.com/no-cors/spy.png";
    let proxy = ProxyEndpoint::new(PROXY).unwrap();
    let fetcher = Arc::new(MockFetcher::default().with_body(&proxy.mirror_url(url), png(Color::WHITE)));
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .proxy(proxy.clone())
        .build();

    let bitmap = loader
        .load(&FetchTarget::url(url, AssetType::CharacterIcon))
        .await
        .unwrap();
    assert_eq!(centre(&bitmap), [255, 255, 255, 255]);

    assert_eq!(*fetcher.requested.lock(), vec![url.to_string(), proxy.mirror_url(url)]);
    let stats = loader.stats();
    assert_eq!(stats.network_attempts, 1);
    assert_eq!(stats.proxy_attempts, 1);
}

#[tokio::test]
async fn test_undecodable_direct_body_retries_via_proxy() {
    let url = "https://art.example.com/html-error-page.png";
    let proxy = ProxyEndpoint::new(PROXY).unwrap();
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body(url, b"<html>denied</html>".to_vec())
            .with_body(&proxy.mirror_url(url), png(Color::BLACK)),
    );
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).proxy(proxy).build();

    assert!(loader.load(&FetchTarget::url(url, AssetType::Logo)).await.is_ok());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_both_attempts_failing_reports_both_urls() {
    init_tracing();
    let url = "https://art.example.com/gone.png";
    let proxy = ProxyEndpoint::new(PROXY).unwrap();
    let loader = ImageLoader::builder()
        .fetcher(Arc::new(MockFetcher::default()))
        .proxy(proxy.clone())
        .build();

    match loader.load(&FetchTarget::url(url, AssetType::CharacterIcon)).await {
        Err(AssetError::LoadFailed {
            direct_url,
            proxy_url,
            reason,
        }) => {
            assert_eq!(direct_url, url);
            assert_eq!(proxy_url, proxy.mirror_url(url));
            assert!(reason.contains("403"), "{reason}");
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
    assert!(loader.cache().lock().is_empty());
}

#[tokio::test]
async fn test_undecodable_proxy_body_is_decode_failure() {
    let url = "https://art.example.com/corrupt.png";
    let proxy = ProxyEndpoint::new(PROXY).unwrap();
    let fetcher = Arc::new(MockFetcher::default().with_body(&proxy.mirror_url(url), vec![0u8; 16]));
    let loader = ImageLoader::builder().fetcher(fetcher).proxy(proxy).build();

    assert!(matches!(
        loader.load(&FetchTarget::url(url, AssetType::Accent)).await,
        Err(AssetError::DecodeFailed { .. })
    ));
}

#[tokio::test]
async fn test_failed_load_is_retried_on_next_request() {
    let url = "https://art.example.com/flaky.png";
    let fetcher = Arc::new(MockFetcher::default());
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).build();
    let target = FetchTarget::url(url, AssetType::CharacterIcon);

    assert!(loader.load(&target).await.is_err());
    assert!(loader.load(&target).await.is_err());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn test_loads_respect_small_cache() {
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body("https://a/1.png", png(Color::WHITE))
            .with_body("https://a/2.png", png(Color::WHITE)),
    );
    let cache = ImageCache::shared(ImageCacheConfig::default().with_max_entries(1));
    let loader = ImageLoader::builder()
        .fetcher(fetcher.clone())
        .cache(cache.clone())
        .build();

    let one = FetchTarget::url("https://a/1.png", AssetType::Logo);
    let two = FetchTarget::url("https://a/2.png", AssetType::Logo);
    loader.load(&one).await.unwrap();
    loader.load(&two).await.unwrap();
    assert_eq!(cache.lock().len(), 1);

    loader.load(&one).await.unwrap();
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn test_preload_tick_warms_cache() {
    init_tracing();
    let fetcher = Arc::new(
        MockFetcher::default()
            .with_body("https://a/1.png", png(Color::WHITE))
            .with_body("https://a/2.png", png(Color::BLACK)),
    );
    let loader = ImageLoader::builder().fetcher(fetcher.clone()).build();

    let mut queue = PreloadQueue::new(8);
    queue.push(FetchTarget::url("https://a/1.png", AssetType::CharacterIcon));
    queue.push(FetchTarget::url("https://a/2.png", AssetType::CharacterIcon));
    queue.push(FetchTarget::url("https://a/missing.png", AssetType::CharacterIcon));

    let tick = queue.tick(&loader, Duration::from_secs(10)).await;
    assert_eq!(tick.loaded, 2);
    assert_eq!(tick.failed, 1);
    assert_eq!(tick.remaining, 0);

    // Already cached targets are skipped without I/O.
    queue.push(FetchTarget::url("https://a/1.png", AssetType::CharacterIcon));
    let tick = queue.tick(&loader, Duration::from_secs(10)).await;
    assert_eq!(tick.skipped, 1);
    assert_eq!(fetcher.calls(), 3);
}
