//! Background cache warming.
//!
//! Art that will probably be needed soon (every character of a loaded
//! script, say) is queued here and loaded a little at a time from idle
//! moments. Each [`PreloadQueue::tick`] gets an explicit time budget; work
//! that does not fit waits for the next tick.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use crate::asset_resolver::FetchTarget;
use crate::image_cache::CacheKey;
use crate::image_loader::ImageLoader;
use crate::logging::targets::PRELOAD as TARGET;

/// Default number of queued targets.
pub const DEFAULT_PRELOAD_CAPACITY: usize = 256;

/// Outcome of one [`PreloadQueue::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PreloadTick {
    /// Targets loaded into the cache.
    pub loaded: usize,
    /// Targets that failed to load. They are not retried.
    pub failed: usize,
    /// Targets skipped because they were already cached.
    pub skipped: usize,
    /// Targets still queued for a later tick.
    pub remaining: usize,
}

/// A bounded FIFO of targets to warm.
#[derive(Debug)]
pub struct PreloadQueue {
    queue: VecDeque<FetchTarget>,
    queued: HashSet<CacheKey>,
    capacity: usize,
    dropped: u64,
}

impl PreloadQueue {
    /// Create a queue holding at most `capacity` targets.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(DEFAULT_PRELOAD_CAPACITY)),
            queued: HashSet::new(),
            capacity,
            dropped: 0,
        }
    }

    /// Maximum number of queued targets.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued targets.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Targets refused because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue a target. Returns `false` if it was already queued or the
    /// queue is full.
    pub fn push(&mut self, target: FetchTarget) -> bool {
        let key = target.cache_key();
        if self.queued.contains(&key) {
            return false;
        }
        if self.queue.len() >= self.capacity {
            self.dropped += 1;
            tracing::debug!(target: TARGET, key = %key, capacity = self.capacity, "preload queue full");
            return false;
        }
        self.queued.insert(key);
        self.queue.push_back(target);
        true
    }

    /// Queue several targets; returns how many were accepted.
    pub fn extend<I: IntoIterator<Item = FetchTarget>>(&mut self, targets: I) -> usize {
        let mut accepted = 0;
        for target in targets {
            if self.push(target) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Forget every queued target.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.queued.clear();
    }

    /// Load queued targets until the queue is empty or `budget` has
    /// elapsed. The budget is checked before each load, so a load that
    /// has started always completes.
    pub async fn tick(&mut self, loader: &ImageLoader, budget: Duration) -> PreloadTick {
        let started = Instant::now();
        let mut tick = PreloadTick::default();

        while started.elapsed() < budget {
            let Some(target) = self.queue.pop_front() else {
                break;
            };
            let key = target.cache_key();
            self.queued.remove(&key);

            if loader.cache().lock().contains(&key) {
                tick.skipped += 1;
                continue;
            }

            match loader.load(&target).await {
                Ok(_) => tick.loaded += 1,
                Err(e) => {
                    tick.failed += 1;
                    tracing::debug!(target: TARGET, key = %key, error = %e, "preload failed");
                }
            }
        }

        tick.remaining = self.queue.len();
        if tick.loaded + tick.failed > 0 {
            tracing::trace!(
                target: TARGET,
                loaded = tick.loaded,
                failed = tick.failed,
                remaining = tick.remaining,
                "preload tick"
            );
        }
        tick
    }
}

impl Default for PreloadQueue {
    fn default() -> Self {
        Self::new(DEFAULT_PRELOAD_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset_resolver::AssetType;

    fn target(n: usize) -> FetchTarget {
        FetchTarget::url(format!("https://example.com/{n}.png"), AssetType::CharacterIcon)
    }

    #[test]
    fn test_push_is_bounded_and_deduplicated() {
        let mut queue = PreloadQueue::new(2);
        assert!(queue.push(target(1)));
        assert!(!queue.push(target(1)));
        assert!(queue.push(target(2)));
        assert!(!queue.push(target(3)));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn test_extend_counts_accepted() {
        let mut queue = PreloadQueue::new(3);
        assert_eq!(queue.extend((0..5).map(target)), 3);
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.push(target(0)));
    }

    #[tokio::test]
    async fn test_zero_budget_defers_everything() {
        let loader = ImageLoader::builder().build();
        let mut queue = PreloadQueue::new(4);
        queue.extend((0..3).map(target));

        let tick = queue.tick(&loader, Duration::ZERO).await;
        assert_eq!(tick, PreloadTick { remaining: 3, ..PreloadTick::default() });
        assert_eq!(loader.stats().network_attempts, 0);
    }
}
