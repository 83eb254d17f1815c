//! Memory tier
//!
//! Volatile, bounded by the total decoded size of its entries. Uses Moka with
//! a byte weigher and strict LRU eviction.

use std::sync::Arc;

use moka::future::Cache;
use moka::policy::EvictionPolicy;

use super::payload::DecodedImage;
use crate::metrics::{CACHE_SIZE_BYTES, observe_cache_lookup};

const CACHE_NAME: &str = "image_memory";

/// In-memory image cache keyed by content key
pub struct MemoryCache {
    images: Cache<String, Arc<DecodedImage>>,
    capacity_bytes: u64,
}

impl MemoryCache {
    /// Create new memory tier
    ///
    /// # Arguments
    /// * `capacity_bytes` - Total decoded bytes to keep
    pub fn new(capacity_bytes: u64) -> Self {
        let images = Cache::builder()
            .max_capacity(capacity_bytes)
            .weigher(|_key: &String, image: &Arc<DecodedImage>| -> u32 {
                image.cost().try_into().unwrap_or(u32::MAX)
            })
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            images,
            capacity_bytes,
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub async fn get(&self, key: &str) -> Option<Arc<DecodedImage>> {
        let result = self.images.get(key).await;
        observe_cache_lookup(CACHE_NAME, result.is_some());
        result
    }

    /// Insert image, evicting least recently used entries once over budget
    pub async fn insert(&self, key: String, image: Arc<DecodedImage>) {
        self.images.insert(key, image).await;
        CACHE_SIZE_BYTES
            .with_label_values(&[CACHE_NAME])
            .set(self.images.weighted_size() as i64);
    }

    pub async fn remove(&self, key: &str) {
        self.images.invalidate(key).await;
    }

    pub async fn clear(&self) {
        self.images.invalidate_all();
        self.images.run_pending_tasks().await;
        CACHE_SIZE_BYTES.with_label_values(&[CACHE_NAME]).set(0);
    }

    /// Apply pending evictions now instead of on the next maintenance cycle
    pub async fn sync(&self) {
        self.images.run_pending_tasks().await;
    }

    /// Sum of entry costs, as of the last maintenance cycle
    pub fn weighted_size(&self) -> u64 {
        self.images.weighted_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::png_fixture;

    /// Square RGBA image costing `side * side * 4` bytes
    fn image_of(side: u32) -> Arc<DecodedImage> {
        Arc::new(DecodedImage::decode(png_fixture(side, side)).unwrap())
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted_first() {
        let cache = MemoryCache::new(300);

        cache.insert("a".into(), image_of(5)).await;
        cache.insert("b".into(), image_of(5)).await;
        cache.insert("c".into(), image_of(5)).await;
        cache.sync().await;

        // Touch "a" so that "b" becomes the oldest entry.
        assert!(cache.get("a").await.is_some());
        cache.sync().await;

        cache.insert("d".into(), image_of(5)).await;
        cache.sync().await;

        assert!(cache.get("b").await.is_none());
        assert!(cache.get("a").await.is_some());
        assert!(cache.get("c").await.is_some());
        assert!(cache.get("d").await.is_some());
        assert!(cache.weighted_size() <= 300);
    }

    #[tokio::test]
    async fn budget_is_weighed_in_decoded_bytes() {
        let first = image_of(80);
        let second = image_of(80);
        assert!(first.data.len() + second.data.len() < 40_000);
        let cache = MemoryCache::new(40_000);

        cache.insert("first".into(), first).await;
        cache.sync().await;
        assert_eq!(cache.weighted_size(), 80 * 80 * 4);

        cache.insert("second".into(), second).await;
        cache.sync().await;

        assert!(cache.get("first").await.is_none());
        assert!(cache.get("second").await.is_some());
        assert!(cache.weighted_size() <= 40_000);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = MemoryCache::new(1024);
        cache.insert("a".into(), image_of(4)).await;

        cache.clear().await;

        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.weighted_size(), 0);
    }
}
