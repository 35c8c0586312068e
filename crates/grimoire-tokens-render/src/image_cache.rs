//! Bounded in-memory cache of decoded bitmaps with LRU eviction.
//!
//! The cache is bounded both by total pixel bytes and by entry count. On
//! every insert the least recently accessed entries are evicted until the
//! new bitmap fits under both limits.
//!
//! # Example
//!
//! ```ignore
//! use grimoire_tokens_render::{CacheKey, ImageCache, ImageCacheConfig, ImageBuffer};
//! use std::sync::Arc;
//!
//! let mut cache = ImageCache::new(ImageCacheConfig::default().with_max_size_mb(64));
//! cache.put(CacheKey::url("https://example.com/imp.png"), Arc::new(ImageBuffer::new(64, 64)));
//!
//! // Hits refresh recency.
//! if let Some(bitmap) = cache.get(&CacheKey::url("https://example.com/imp.png")) {
//!     println!("cached {}x{}", bitmap.width(), bitmap.height());
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::image_buffer::ImageBuffer;
use crate::logging::targets::CACHE as TARGET;

/// A decoded image shared between the cache and its readers.
pub type Bitmap = Arc<ImageBuffer>;

/// A cache shared between the loader and the render pipeline.
///
/// The lock must never be held across an `.await`.
pub type SharedImageCache = Arc<Mutex<ImageCache>>;

/// Configuration for the image cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCacheConfig {
    /// Maximum total size in bytes. Default: 100 MB.
    pub max_size_bytes: usize,
    /// Maximum number of entries. Default: 500.
    pub max_entries: usize,
    /// Keep built-in art resident: it is never chosen for eviction.
    /// Default: false.
    pub pin_builtin: bool,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 100 * 1024 * 1024,
            max_entries: 500,
            pin_builtin: false,
        }
    }
}

impl ImageCacheConfig {
    /// Set the maximum cache size in megabytes.
    #[must_use]
    pub fn with_max_size_mb(mut self, mb: usize) -> Self {
        self.max_size_bytes = mb * 1024 * 1024;
        self
    }

    /// Set the maximum cache size in bytes.
    #[must_use]
    pub fn with_max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    /// Set the maximum number of entries.
    #[must_use]
    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    /// Exempt built-in art from eviction.
    #[must_use]
    pub fn with_pin_builtin(mut self, pin: bool) -> Self {
        self.pin_builtin = pin;
        self
    }
}

/// The final resolved identifier of a load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheKey {
    /// Bundled art, keyed by its static path.
    BuiltIn(String),
    /// A user-uploaded asset, keyed by uuid.
    UserAsset(String),
    /// A direct URL (including `data:` URIs).
    Url(String),
}

impl CacheKey {
    /// Key for bundled art.
    pub fn builtin(path: impl Into<String>) -> Self {
        CacheKey::BuiltIn(path.into())
    }

    /// Key for a user asset.
    pub fn user_asset(uuid: impl Into<String>) -> Self {
        CacheKey::UserAsset(uuid.into())
    }

    /// Key for a URL.
    pub fn url(url: impl Into<String>) -> Self {
        CacheKey::Url(url.into())
    }

    fn is_builtin(&self) -> bool {
        matches!(self, CacheKey::BuiltIn(_))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::BuiltIn(path) => write!(f, "builtin:{path}"),
            CacheKey::UserAsset(uuid) => write!(f, "asset:{uuid}"),
            // data: URIs can be megabytes long
            CacheKey::Url(url) if url.len() > 96 => {
                let head: String = url.chars().take(96).collect();
                write!(f, "{head}...")
            }
            CacheKey::Url(url) => f.write_str(url),
        }
    }
}

struct CacheEntry {
    bitmap: Bitmap,
    last_accessed: u64,
    size_bytes: usize,
}

/// An LRU cache for decoded bitmaps.
///
/// Recency is a monotonically increasing access tick. `by_access` maps each
/// entry's tick back to its key so the oldest entry is found in O(log n).
pub struct ImageCache {
    config: ImageCacheConfig,
    entries: HashMap<CacheKey, CacheEntry>,
    by_access: BTreeMap<u64, CacheKey>,
    clock: u64,
    current_size: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    rejected: u64,
    generation: u64,
}

impl ImageCache {
    /// Create a new image cache with the given configuration.
    pub fn new(config: ImageCacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            by_access: BTreeMap::new(),
            clock: 0,
            current_size: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            rejected: 0,
            generation: 0,
        }
    }

    /// Create a new image cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ImageCacheConfig::default())
    }

    /// Wrap a new cache for sharing.
    pub fn shared(config: ImageCacheConfig) -> SharedImageCache {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// The active configuration.
    pub fn config(&self) -> &ImageCacheConfig {
        &self.config
    }

    /// Current total size in bytes.
    #[inline]
    pub fn size_bytes(&self) -> usize {
        self.current_size
    }

    /// Number of cached entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert a bitmap, evicting least recently used entries as needed.
    ///
    /// Returns `false` when the bitmap was not cached: either it is larger
    /// than the whole cache, or every remaining entry is pinned.
    pub fn put(&mut self, key: CacheKey, bitmap: Bitmap) -> bool {
        let size_bytes = bitmap.size_bytes();

        if size_bytes > self.config.max_size_bytes || self.config.max_entries == 0 {
            self.rejected += 1;
            tracing::debug!(
                target: TARGET,
                key = %key,
                size_bytes,
                max_size_bytes = self.config.max_size_bytes,
                "bitmap larger than cache; not caching"
            );
            return false;
        }

        // Replacing an entry frees its slot first.
        self.remove_entry(&key);

        while self.current_size + size_bytes > self.config.max_size_bytes
            || self.entries.len() >= self.config.max_entries
        {
            if !self.evict_one() {
                self.rejected += 1;
                tracing::warn!(
                    target: TARGET,
                    key = %key,
                    size_bytes,
                    "cache full of pinned entries; not caching"
                );
                return false;
            }
        }

        let tick = self.next_tick();
        self.by_access.insert(tick, key.clone());
        self.entries.insert(
            key,
            CacheEntry {
                bitmap,
                last_accessed: tick,
                size_bytes,
            },
        );
        self.current_size += size_bytes;
        self.check_invariants();
        true
    }

    /// Look up a bitmap, refreshing its recency on a hit.
    pub fn get(&mut self, key: &CacheKey) -> Option<Bitmap> {
        if self.touch(key) {
            self.hits += 1;
            self.entries.get(key).map(|entry| entry.bitmap.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    /// Look up a bitmap without counting a hit or changing recency.
    pub fn peek(&self, key: &CacheKey) -> Option<Bitmap> {
        self.entries.get(key).map(|entry| entry.bitmap.clone())
    }

    /// Refresh an entry's recency. Returns whether the key was present.
    pub fn touch(&mut self, key: &CacheKey) -> bool {
        let tick = self.clock + 1;
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        self.clock = tick;
        self.by_access.remove(&entry.last_accessed);
        entry.last_accessed = tick;
        self.by_access.insert(tick, key.clone());
        true
    }

    /// Whether a key is cached. Does not affect recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove an entry, returning its bitmap.
    pub fn remove(&mut self, key: &CacheKey) -> Option<Bitmap> {
        let bitmap = self.remove_entry(key);
        self.check_invariants();
        bitmap
    }

    /// Drop every entry and reset the byte counter. Bumps the generation.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.by_access.clear();
        self.current_size = 0;
        self.generation += 1;
        tracing::debug!(target: TARGET, dropped, generation = self.generation, "cache cleared");
    }

    /// Number of times the cache has been cleared.
    ///
    /// A loader reads this before starting I/O and only stores its result
    /// if the value is unchanged, so loads that straddle a clear cannot
    /// repopulate it with stale art.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Reset hit/miss statistics.
    pub fn reset_stats(&mut self) {
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
        self.rejected = 0;
    }

    /// Get cache statistics.
    pub fn stats(&self) -> ImageCacheStats {
        ImageCacheStats {
            entry_count: self.entries.len(),
            size_bytes: self.current_size,
            max_size_bytes: self.config.max_size_bytes,
            max_entries: self.config.max_entries,
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            rejected: self.rejected,
        }
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove_entry(&mut self, key: &CacheKey) -> Option<Bitmap> {
        let entry = self.entries.remove(key)?;
        self.by_access.remove(&entry.last_accessed);
        self.current_size -= entry.size_bytes;
        Some(entry.bitmap)
    }

    /// Evict the least recently accessed evictable entry.
    fn evict_one(&mut self) -> bool {
        let pin = self.config.pin_builtin;
        let victim = self
            .by_access
            .values()
            .find(|key| !(pin && key.is_builtin()))
            .cloned();

        let Some(key) = victim else {
            return false;
        };
        if let Some(bitmap) = self.remove_entry(&key) {
            self.evictions += 1;
            tracing::trace!(
                target: TARGET,
                key = %key,
                size_bytes = bitmap.size_bytes(),
                "evicted least recently used bitmap"
            );
        }
        true
    }

    fn check_invariants(&self) {
        let sum: usize = self.entries.values().map(|e| e.size_bytes).sum();
        let consistent = sum == self.current_size && self.by_access.len() == self.entries.len();
        debug_assert!(
            consistent,
            "cache accounting drifted: total {} vs sum {}, {} index vs {} entries",
            self.current_size,
            sum,
            self.by_access.len(),
            self.entries.len()
        );
        if !consistent {
            tracing::error!(
                target: TARGET,
                total = self.current_size,
                sum,
                "cache accounting drifted"
            );
        }
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCache")
            .field("entries", &self.entries.len())
            .field("size_bytes", &self.current_size)
            .field("max_size_bytes", &self.config.max_size_bytes)
            .field("max_entries", &self.config.max_entries)
            .finish()
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageCacheStats {
    /// Number of entries in the cache.
    pub entry_count: usize,
    /// Current size in bytes.
    pub size_bytes: usize,
    /// Maximum size in bytes.
    pub max_size_bytes: usize,
    /// Maximum number of entries.
    pub max_entries: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Entries dropped to make room.
    pub evictions: u64,
    /// Bitmaps refused because they could not fit.
    pub rejected: u64,
}

impl ImageCacheStats {
    /// Hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Current size in megabytes.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Usage as a percentage of the byte limit.
    pub fn usage_percent(&self) -> f64 {
        if self.max_size_bytes == 0 {
            0.0
        } else {
            (self.size_bytes as f64 / self.max_size_bytes as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bitmap of exactly `px` pixels (`px * 4` bytes).
    fn bitmap(px: u32) -> Bitmap {
        Arc::new(ImageBuffer::new(px, 1))
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = ImageCache::with_defaults();
        let key = CacheKey::url("https://example.com/a.png");
        assert!(cache.put(key.clone(), bitmap(10)));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 40);
        assert!(cache.get(&key).is_some());
        assert!(cache.get(&CacheKey::url("missing")).is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_evicts_least_recently_used_by_bytes() {
        let mut cache = ImageCache::new(ImageCacheConfig::default().with_max_size_bytes(120));
        let a = CacheKey::builtin("a");
        let b = CacheKey::builtin("b");
        let c = CacheKey::builtin("c");

        cache.put(a.clone(), bitmap(10));
        cache.put(b.clone(), bitmap(10));
        cache.put(c.clone(), bitmap(10));
        cache.touch(&a);

        cache.put(CacheKey::builtin("d"), bitmap(10));
        assert!(cache.contains(&a));
        assert!(!cache.contains(&b));
        assert!(cache.contains(&c));
        assert!(cache.size_bytes() <= 120);
    }

    #[test]
    fn test_evicts_by_entry_count() {
        let mut cache = ImageCache::new(ImageCacheConfig::default().with_max_entries(2));
        cache.put(CacheKey::url("1"), bitmap(1));
        cache.put(CacheKey::url("2"), bitmap(1));
        cache.get(&CacheKey::url("1"));
        cache.put(CacheKey::url("3"), bitmap(1));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&CacheKey::url("1")));
        assert!(!cache.contains(&CacheKey::url("2")));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_oversized_bitmap_is_not_inserted() {
        let mut cache = ImageCache::new(ImageCacheConfig::default().with_max_size_bytes(100));
        cache.put(CacheKey::url("small"), bitmap(5));
        assert!(!cache.put(CacheKey::url("huge"), bitmap(26)));

        assert!(cache.contains(&CacheKey::url("small")));
        assert!(!cache.contains(&CacheKey::url("huge")));
        assert_eq!(cache.stats().rejected, 1);
    }

    #[test]
    fn test_replacing_key_updates_size() {
        let mut cache = ImageCache::with_defaults();
        let key = CacheKey::user_asset("u1");
        cache.put(key.clone(), bitmap(10));
        cache.put(key.clone(), bitmap(3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 12);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = ImageCache::with_defaults();
        cache.put(CacheKey::url("a"), bitmap(2));
        cache.put(CacheKey::url("b"), bitmap(2));

        assert!(cache.remove(&CacheKey::url("a")).is_some());
        assert_eq!(cache.size_bytes(), 8);

        assert_eq!(cache.generation(), 0);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
        assert_eq!(cache.generation(), 1);
    }

    #[test]
    fn test_pinned_builtins_survive_eviction() {
        let mut cache = ImageCache::new(
            ImageCacheConfig::default()
                .with_max_entries(2)
                .with_pin_builtin(true),
        );
        cache.put(CacheKey::builtin("icons/imp.webp"), bitmap(1));
        cache.put(CacheKey::url("x"), bitmap(1));
        cache.put(CacheKey::url("y"), bitmap(1));

        assert!(cache.contains(&CacheKey::builtin("icons/imp.webp")));
        assert!(cache.contains(&CacheKey::url("y")));
        assert!(!cache.contains(&CacheKey::url("x")));
    }

    #[test]
    fn test_all_pinned_rejects_new_entry() {
        let mut cache = ImageCache::new(
            ImageCacheConfig::default()
                .with_max_entries(1)
                .with_pin_builtin(true),
        );
        cache.put(CacheKey::builtin("a"), bitmap(1));
        assert!(!cache.put(CacheKey::url("b"), bitmap(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peek_does_not_touch() {
        let mut cache = ImageCache::new(ImageCacheConfig::default().with_max_entries(2));
        cache.put(CacheKey::url("old"), bitmap(1));
        cache.put(CacheKey::url("new"), bitmap(1));
        assert!(cache.peek(&CacheKey::url("old")).is_some());
        cache.put(CacheKey::url("newest"), bitmap(1));
        assert!(!cache.contains(&CacheKey::url("old")));
        assert_eq!(cache.stats().hits, 0);
    }
}
