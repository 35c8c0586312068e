//! The local library of user-uploaded assets.
//!
//! Uploads are stored as raw encoded blobs plus a little metadata, keyed by
//! uuid. The persistent backend lives outside this crate; it plugs in
//! through [`UserAssetStore`]. [`InMemoryAssetStore`] backs tests and
//! short-lived sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;

use crate::asset_resolver::AssetType;
use crate::error::StoreResult;

/// Descriptive data saved alongside an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMetadata {
    /// What the upload was made for.
    pub asset_type: AssetType,
    /// Original file name, if known.
    pub name: Option<String>,
    /// MIME type reported at upload time.
    pub mime_type: Option<String>,
}

impl AssetMetadata {
    /// Metadata with only a type.
    pub fn new(asset_type: AssetType) -> Self {
        Self {
            asset_type,
            name: None,
            mime_type: None,
        }
    }

    /// Set the original file name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// An uploaded blob and its metadata.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    /// Encoded image bytes as uploaded.
    pub blob: Arc<[u8]>,
    pub metadata: AssetMetadata,
}

/// Lookup of user uploads by uuid.
pub trait UserAssetStore: Send + Sync {
    /// Fetch an asset. `Ok(None)` means the uuid is unknown.
    fn get<'a>(&'a self, uuid: &'a str) -> BoxFuture<'a, StoreResult<Option<StoredAsset>>>;
}

/// A process-local asset library.
#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    assets: RwLock<HashMap<String, StoredAsset>>,
    lookups: AtomicU64,
}

impl InMemoryAssetStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an upload.
    pub fn insert(&self, uuid: impl Into<String>, blob: impl Into<Arc<[u8]>>, metadata: AssetMetadata) {
        self.assets.write().insert(
            uuid.into(),
            StoredAsset {
                blob: blob.into(),
                metadata,
            },
        );
    }

    /// Remove an upload, returning it if present.
    pub fn remove(&self, uuid: &str) -> Option<StoredAsset> {
        self.assets.write().remove(uuid)
    }

    /// Number of stored uploads.
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    /// How many lookups have been served.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl UserAssetStore for InMemoryAssetStore {
    fn get<'a>(&'a self, uuid: &'a str) -> BoxFuture<'a, StoreResult<Option<StoredAsset>>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let found = self.assets.read().get(uuid).cloned();
        futures_util::future::ready(Ok(found)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryAssetStore::new();
        store.insert(
            "u-1",
            vec![1u8, 2, 3],
            AssetMetadata::new(AssetType::Logo).with_name("logo.png"),
        );

        let asset = store.get("u-1").await.unwrap().unwrap();
        assert_eq!(&*asset.blob, &[1, 2, 3]);
        assert_eq!(asset.metadata.name.as_deref(), Some("logo.png"));
        assert!(store.get("u-2").await.unwrap().is_none());
        assert_eq!(store.lookups(), 2);
    }

    #[test]
    fn test_remove() {
        let store = InMemoryAssetStore::new();
        store.insert("u", vec![0u8], AssetMetadata::new(AssetType::Accent));
        assert_eq!(store.len(), 1);
        assert!(store.remove("u").is_some());
        assert!(store.is_empty());
    }
}
