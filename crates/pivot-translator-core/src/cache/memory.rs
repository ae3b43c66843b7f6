use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use super::CacheKey;

/// In-process layer over recent unit translations.
pub struct MemoryCache {
    units: Cache<CacheKey, Arc<str>>,
}

impl MemoryCache {
    /// Capacity is counted in KiB-sized units, so one long unit can take
    /// the room of several short ones.
    pub fn new(max_entries: u64, ttl_seconds: u64) -> Self {
        let builder = Cache::builder()
            .max_capacity(max_entries)
            .weigher(|_key: &CacheKey, text: &Arc<str>| -> u32 {
                u32::try_from(text.len() / 1024 + 1).unwrap_or(u32::MAX)
            });

        let units = match ttl_seconds {
            0 => builder.build(),
            secs => builder.time_to_live(Duration::from_secs(secs)).build(),
        };

        Self { units }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.units.get(key).await.map(|text| text.to_string())
    }

    pub async fn insert(&self, key: CacheKey, text: &str) {
        self.units.insert(key, Arc::from(text)).await;
    }

    pub fn clear(&self) {
        self.units.invalidate_all();
    }
}
