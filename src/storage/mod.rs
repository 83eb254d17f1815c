//! Image blob cache
//!
//! Handles:
//! - Content keys for blob URLs
//! - Bounded memory tier (Moka, LRU by decoded size)
//! - Bounded disk tier (file per key, LRU by modification time)
//! - Network fetch on a miss in both tiers

mod cache;
mod disk;
mod fetcher;
mod memory;
mod payload;

pub use cache::ImageCache;
pub use disk::DiskCache;
pub use fetcher::{HttpImageFetcher, ImageFetcher};
pub use memory::MemoryCache;
pub use payload::{DecodedImage, ImageFormat, cache_key, is_cache_key};

#[cfg(test)]
pub(crate) use payload::png_fixture;
