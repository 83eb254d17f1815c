//! Disk tier
//!
//! One file per content key inside a dedicated directory, bounded by total
//! bytes. Recency is kept in memory and mirrored into file modification
//! times, so the LRU order survives a restart: opening the cache rebuilds the
//! index from the directory listing, oldest file first.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::sync::Mutex;

use super::payload::is_cache_key;
use crate::error::AppError;
use crate::metrics::{CACHE_SIZE_BYTES, observe_cache_lookup};

const CACHE_NAME: &str = "image_disk";
const TEMP_SUFFIX: &str = ".tmp";

#[derive(Debug, Clone, Copy)]
struct DiskEntry {
    size: u64,
    tick: u64,
}

/// LRU bookkeeping: `order` maps recency tick to key, oldest first
#[derive(Debug, Default)]
struct DiskIndex {
    entries: HashMap<String, DiskEntry>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
    total_bytes: u64,
}

impl DiskIndex {
    fn touch(&mut self, key: &str) {
        let tick = self.next_tick;
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.tick);
            entry.tick = tick;
            self.order.insert(tick, key.to_string());
            self.next_tick += 1;
        }
    }

    fn insert(&mut self, key: String, size: u64) {
        self.remove(&key);
        let tick = self.next_tick;
        self.next_tick += 1;
        self.order.insert(tick, key.clone());
        self.entries.insert(key, DiskEntry { size, tick });
        self.total_bytes += size;
    }

    fn remove(&mut self, key: &str) -> Option<DiskEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        self.total_bytes -= entry.size;
        Some(entry)
    }

    fn oldest(&self) -> Option<String> {
        self.order.values().next().cloned()
    }
}

/// Persistent, byte-bounded image store
pub struct DiskCache {
    dir: PathBuf,
    capacity_bytes: u64,
    index: Mutex<DiskIndex>,
}

impl DiskCache {
    /// Open (or create) the cache directory and rebuild the index
    ///
    /// Leftover temp files are removed. If the directory already holds more
    /// than `capacity_bytes`, the oldest files are evicted.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or listed
    pub async fn open(dir: impl Into<PathBuf>, capacity_bytes: u64) -> Result<Self, AppError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut found: Vec<(SystemTime, String, u64)> = Vec::new();
        let mut listing = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = listing.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            if name.ends_with(TEMP_SUFFIX) {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    tracing::debug!(file = %name, error = %e, "Could not remove leftover temp file");
                }
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, name, metadata.len()));
        }

        found.sort();
        let mut index = DiskIndex::default();
        for (_, key, size) in found {
            index.insert(key, size);
        }

        let cache = Self {
            dir,
            capacity_bytes,
            index: Mutex::new(index),
        };

        {
            let mut index = cache.index.lock().await;
            cache.trim(&mut index).await;
            tracing::info!(
                dir = %cache.dir.display(),
                entries = index.entries.len(),
                bytes = index.total_bytes,
                capacity_bytes,
                "Disk cache opened"
            );
        }

        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    /// Bytes currently stored
    pub async fn size_bytes(&self) -> u64 {
        self.index.lock().await.total_bytes
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.index.lock().await.entries.contains_key(key)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// Read an entry and mark it most recently used
    ///
    /// # Errors
    /// Returns `AppError::InvalidKey` unless `key` is a content key
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        check_key(key)?;
        let mut index = self.index.lock().await;
        if !index.entries.contains_key(key) {
            observe_cache_lookup(CACHE_NAME, false);
            return Ok(None);
        }

        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted behind our back.
                index.remove(key);
                observe_cache_lookup(CACHE_NAME, false);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        index.touch(key);
        observe_cache_lookup(CACHE_NAME, true);
        drop(index);

        if let Err(e) = touch_file(path).await {
            tracing::debug!(key, error = %e, "Could not refresh disk entry timestamp");
        }

        Ok(Some(bytes))
    }

    /// Store an entry, evicting least recently used files to stay in budget
    ///
    /// Entries larger than the whole budget are skipped. Only content keys
    /// are accepted, so every file lands inside the cache directory.
    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), AppError> {
        check_key(key)?;
        let size = bytes.len() as u64;
        if size > self.capacity_bytes {
            tracing::debug!(key, size, "Entry exceeds disk cache budget, not stored");
            return Ok(());
        }

        let mut index = self.index.lock().await;
        let path = self.path_for(key);
        let temp = self.dir.join(format!("{key}{TEMP_SUFFIX}"));
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &path).await?;

        index.insert(key.to_string(), size);
        self.trim(&mut index).await;
        Ok(())
    }

    /// Delete one entry
    pub async fn remove(&self, key: &str) -> Result<bool, AppError> {
        check_key(key)?;
        let mut index = self.index.lock().await;
        if index.remove(key).is_none() {
            return Ok(false);
        }
        remove_if_exists(&self.path_for(key)).await?;
        CACHE_SIZE_BYTES
            .with_label_values(&[CACHE_NAME])
            .set(index.total_bytes as i64);
        Ok(true)
    }

    /// Delete the whole cache directory and start empty
    pub async fn clear(&self) -> Result<(), AppError> {
        let mut index = self.index.lock().await;
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.dir).await?;
        *index = DiskIndex::default();
        CACHE_SIZE_BYTES.with_label_values(&[CACHE_NAME]).set(0);
        tracing::info!(dir = %self.dir.display(), "Disk cache cleared");
        Ok(())
    }

    async fn trim(&self, index: &mut DiskIndex) {
        while index.total_bytes > self.capacity_bytes {
            let Some(key) = index.oldest() else { break };
            index.remove(&key);
            if let Err(e) = remove_if_exists(&self.path_for(&key)).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete evicted disk entry");
            }
            tracing::debug!(key = %key, "Evicted disk entry");
        }
        CACHE_SIZE_BYTES
            .with_label_values(&[CACHE_NAME])
            .set(index.total_bytes as i64);
    }
}

fn check_key(key: &str) -> Result<(), AppError> {
    if is_cache_key(key) {
        Ok(())
    } else {
        Err(AppError::InvalidKey(key.to_string()))
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn touch_file(path: PathBuf) -> std::io::Result<()> {
    tokio::task::spawn_blocking(move || {
        let file = std::fs::OpenOptions::new().write(true).open(path)?;
        file.set_modified(SystemTime::now())
    })
    .await
    .map_err(std::io::Error::other)?
}
