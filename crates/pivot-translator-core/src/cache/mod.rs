mod disk;
mod key;
mod memory;

pub use disk::DiskCache;
pub use key::CacheKey;
pub use memory::MemoryCache;

use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::error::Result;

/// Combined cache of finished unit translations, memory over disk
pub struct TranslationCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TranslationCache {
    /// Create a new translation cache from configuration.
    ///
    /// Returns `None` when both layers are disabled.
    pub fn new(config: &CacheConfig) -> Result<Option<Self>> {
        let memory = config
            .memory_enabled
            .then(|| MemoryCache::new(config.memory_max_entries, config.memory_ttl_seconds));

        let disk = if config.disk_enabled {
            let path = config
                .disk_path
                .clone()
                .unwrap_or_else(crate::util::translation_cache_path);
            Some(DiskCache::open(path)?)
        } else {
            None
        };

        if memory.is_none() && disk.is_none() {
            return Ok(None);
        }

        Ok(Some(Self { memory, disk }))
    }

    /// Look a unit up, memory first. Disk hits are promoted to memory.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        if let Some(memory) = &self.memory
            && let Some(text) = memory.get(key).await
        {
            return Some(text);
        }

        let text = self.disk.as_ref()?.get(key)?;
        if let Some(memory) = &self.memory {
            memory.insert(key.clone(), &text).await;
        }
        Some(text)
    }

    /// Store a finished unit in every enabled layer
    pub async fn insert(&self, key: &CacheKey, text: &str) {
        if let Some(memory) = &self.memory {
            memory.insert(key.clone(), text).await;
        }

        if let Some(disk) = &self.disk
            && let Err(e) = disk.insert(key, text)
        {
            warn!("Failed to write translation to disk cache: {}", e);
        }
    }

    /// Persist disk writes; called once a run finishes
    pub fn flush(&self) {
        if let Some(disk) = &self.disk
            && let Err(e) = disk.flush()
        {
            warn!("Failed to flush disk cache: {}", e);
        }
    }

    pub fn clear(&self) {
        if let Some(memory) = &self.memory {
            memory.clear();
        }

        if let Some(disk) = &self.disk {
            match disk.clear() {
                Ok(count) => debug!("Cleared {} entries from {}", count, disk.path().display()),
                Err(e) => warn!("Failed to clear disk cache: {}", e),
            }
        }
    }
}
