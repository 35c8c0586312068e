//! Persistent store of official character art, keyed by character id.
//!
//! Art for official characters is synchronised ahead of time so renders
//! can skip the network. When a character icon URL ends in
//! `<character-id>.<image extension>`, the loader looks the id up here
//! first; see [`synced_key_for_url`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::logging::targets::SYNCED_STORE as TARGET;

const IMAGE_EXTENSIONS: [&str; 5] = ["webp", "png", "jpg", "jpeg", "gif"];

/// Extract the synced-store key from a URL or file name.
///
/// Takes the last path segment (query and fragment ignored), strips a known
/// image extension case-insensitively and lower-cases the rest. Returns
/// `None` when there is no such extension or the remaining id is empty.
pub fn synced_key_for_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let path = without_fragment.split('?').next().unwrap_or(without_fragment);
    let segment = path.rsplit('/').next().unwrap_or(path);

    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty()
        || !IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    {
        return None;
    }
    Some(stem.to_ascii_lowercase())
}

/// Lookup of pre-synchronised character art.
pub trait SyncedImageStore: Send + Sync {
    /// Encoded image bytes for a character id, or `Ok(None)` if not synced.
    fn get<'a>(&'a self, character_id: &'a str) -> BoxFuture<'a, StoreResult<Option<Vec<u8>>>>;

    /// Store encoded image bytes for a character id.
    fn put<'a>(&'a self, character_id: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, StoreResult<()>>;
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// A process-local synced store.
#[derive(Debug, Default)]
pub struct InMemorySyncedStore {
    images: RwLock<HashMap<String, Vec<u8>>>,
    hits: AtomicU64,
}

impl InMemorySyncedStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert art synchronously.
    pub fn insert(&self, character_id: impl Into<String>, bytes: Vec<u8>) {
        self.images.write().insert(character_id.into(), bytes);
    }

    /// How many lookups found art.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

impl SyncedImageStore for InMemorySyncedStore {
    fn get<'a>(&'a self, character_id: &'a str) -> BoxFuture<'a, StoreResult<Option<Vec<u8>>>> {
        let found = self.images.read().get(character_id).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        futures_util::future::ready(Ok(found)).boxed()
    }

    fn put<'a>(&'a self, character_id: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
        self.insert(character_id, bytes.to_vec());
        futures_util::future::ready(Ok(())).boxed()
    }
}

// ============================================================================
// ON DISK
// ============================================================================

/// A synced store backed by one file per character in a directory.
#[derive(Debug, Clone)]
pub struct DiskSyncedStore {
    dir: PathBuf,
}

impl DiskSyncedStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;
        tracing::debug!(target: TARGET, dir = %dir.display(), "opened synced image store");
        Ok(Self { dir })
    }

    /// The store directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the art for an id. Ids are restricted to
    /// `[a-z0-9_-]` so they cannot escape the store directory.
    fn path_for(&self, character_id: &str) -> StoreResult<PathBuf> {
        let valid = !character_id.is_empty()
            && character_id
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
        if !valid {
            return Err(StoreError::InvalidKey(character_id.to_string()));
        }
        Ok(self.dir.join(format!("{character_id}.img")))
    }
}

impl SyncedImageStore for DiskSyncedStore {
    fn get<'a>(&'a self, character_id: &'a str) -> BoxFuture<'a, StoreResult<Option<Vec<u8>>>> {
        async move {
            let path = self.path_for(character_id)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::io(path, e)),
            }
        }
        .boxed()
    }

    fn put<'a>(&'a self, character_id: &'a str, bytes: &'a [u8]) -> BoxFuture<'a, StoreResult<()>> {
        async move {
            let path = self.path_for(character_id)?;
            // Write then rename so readers never see a partial file.
            let tmp = path.with_extension("img.tmp");
            tokio::fs::write(&tmp, bytes)
                .await
                .map_err(|e| StoreError::io(&tmp, e))?;
            tokio::fs::rename(&tmp, &path)
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            tracing::trace!(target: TARGET, character_id, size = bytes.len(), "stored synced art");
            Ok(())
        }
        .boxed()
    }
}
