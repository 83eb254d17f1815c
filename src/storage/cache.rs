//! Two-tier image cache
//!
//! Lookup order is memory, then disk (promoting the hit into memory), then
//! the network. Every failure along the way is logged and reported to the
//! caller as "no image"; the cache never raises.

use std::sync::Arc;

use super::disk::DiskCache;
use super::fetcher::ImageFetcher;
use super::payload::{DecodedImage, cache_key, is_cache_key};
use super::memory::MemoryCache;
use crate::config::CacheConfig;
use crate::error::AppError;
use crate::metrics::BLOB_FETCHES_TOTAL;

/// Memory + disk image cache in front of an `ImageFetcher`
pub struct ImageCache {
    memory: MemoryCache,
    /// `None` when the disk tier could not be opened
    disk: Option<DiskCache>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl ImageCache {
    /// Open both tiers from configuration
    ///
    /// If the disk directory is unusable the cache runs memory-only.
    pub async fn open(config: &CacheConfig, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let memory = MemoryCache::new(config.memory_budget());
        let disk = match DiskCache::open(&config.disk_path, config.disk_capacity_bytes).await {
            Ok(disk) => Some(disk),
            Err(e) => {
                let e = e.recorded("image_cache");
                tracing::warn!(
                    path = %config.disk_path.display(),
                    error = %e,
                    "Disk cache unavailable, continuing with memory tier only"
                );
                None
            }
        };

        Self::with_tiers(memory, disk, fetcher)
    }

    pub fn with_tiers(
        memory: MemoryCache,
        disk: Option<DiskCache>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        Self {
            memory,
            disk,
            fetcher,
        }
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Image for a URL, fetching it on a miss in both tiers
    pub async fn get(&self, url: &str) -> Option<Arc<DecodedImage>> {
        let key = cache_key(url);
        if let Some(image) = self.get_cached(&key).await {
            return Some(image);
        }

        let bytes = match self.fetcher.fetch(url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                BLOB_FETCHES_TOTAL.with_label_values(&["error"]).inc();
                let e = e.recorded("image_fetch");
                tracing::warn!(url, error = %e, "Image fetch failed");
                return None;
            }
        };

        let image = match DecodedImage::decode(bytes) {
            Ok(image) => Arc::new(image),
            Err(e) => {
                BLOB_FETCHES_TOTAL.with_label_values(&["undecodable"]).inc();
                let e = e.recorded("image_fetch");
                tracing::warn!(url, error = %e, "Fetched payload is not an image");
                return None;
            }
        };

        BLOB_FETCHES_TOTAL.with_label_values(&["ok"]).inc();
        self.put(&key, Arc::clone(&image)).await;
        Some(image)
    }

    /// Cached image for a content key, never touching the network
    pub async fn get_cached(&self, key: &str) -> Option<Arc<DecodedImage>> {
        if !is_cache_key(key) {
            tracing::debug!(key, "Not a content key, nothing cached");
            return None;
        }
        if let Some(image) = self.memory.get(key).await {
            tracing::trace!(key, "Image memory hit");
            return Some(image);
        }

        let disk = self.disk.as_ref()?;
        let bytes = match disk.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                let e = e.recorded("image_cache");
                tracing::warn!(key, error = %e, "Disk cache read failed");
                return None;
            }
        };

        match DecodedImage::decode(bytes) {
            Ok(image) => {
                tracing::trace!(key, "Image disk hit, promoting to memory");
                let image = Arc::new(image);
                self.memory.insert(key.to_string(), Arc::clone(&image)).await;
                Some(image)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Dropping corrupt disk cache entry");
                if let Err(e) = disk.remove(key).await {
                    tracing::warn!(key, error = %e, "Failed to delete corrupt disk cache entry");
                }
                None
            }
        }
    }

    /// Store an image in both tiers
    ///
    /// Keys other than content keys are refused and logged. A disk write
    /// failure is logged; the memory tier still gets the image.
    pub async fn put(&self, key: &str, image: Arc<DecodedImage>) {
        if !is_cache_key(key) {
            let e = AppError::InvalidKey(key.to_string()).recorded("image_cache");
            tracing::warn!(key, error = %e, "Refusing to cache image");
            return;
        }
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(key, &image.data).await {
                let e = e.recorded("image_cache");
                tracing::warn!(key, error = %e, "Disk cache write failed");
            }
        }
        self.memory.insert(key.to_string(), image).await;
    }

    /// Empty both tiers
    pub async fn clear(&self) -> Result<(), AppError> {
        self.memory.clear().await;
        if let Some(disk) = &self.disk {
            disk.clear().await?;
        }
        tracing::info!("Image cache cleared");
        Ok(())
    }
}
