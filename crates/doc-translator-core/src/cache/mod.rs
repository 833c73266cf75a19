mod memory;
mod disk;
mod key;

pub use memory::MemoryCache;
pub use disk::DiskCache;
pub use key::CacheKey;

use crate::config::CacheConfig;
use crate::error::Result;
use tracing::warn;

/// Combined cache of translated chunks with memory and disk layers.
///
/// Only successful translations are stored; placeholders never are.
pub struct TranslationCache {
    memory: Option<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TranslationCache {
    /// Create a new translation cache from configuration
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let memory = if config.memory_enabled {
            Some(MemoryCache::new(
                config.memory_max_entries,
                config.memory_ttl_seconds,
            ))
        } else {
            None
        };

        let disk = if config.disk_enabled {
            let path = config
                .disk_path
                .clone()
                .unwrap_or_else(crate::util::translation_cache_path);
            Some(DiskCache::new(path)?)
        } else {
            None
        };

        Ok(Self { memory, disk })
    }

    /// A cache that stores nothing
    pub const fn disabled() -> Self {
        Self { memory: None, disk: None }
    }

    pub const fn is_enabled(&self) -> bool {
        self.memory.is_some() || self.disk.is_some()
    }

    /// Get a cached translation
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let key_str = key.as_str();

        // Try memory cache first
        if let Some(ref memory) = self.memory
            && let Some(value) = memory.get(key_str).await {
                return Some(value);
            }

        // Try disk cache
        if let Some(ref disk) = self.disk
            && let Some(value) = disk.get(key_str) {
                // Populate memory cache on disk hit
                if let Some(ref memory) = self.memory {
                    memory.insert(key_str.to_string(), value.clone()).await;
                }
                return Some(value);
            }

        None
    }

    /// Store a translation in cache
    pub async fn insert(&self, key: &CacheKey, value: &str) {
        let key_str = key.as_str();

        if let Some(ref memory) = self.memory {
            memory.insert(key_str.to_string(), value.to_string()).await;
        }

        if let Some(ref disk) = self.disk
            && let Err(e) = disk.insert(key_str, value)
        {
            warn!("Failed to persist cache entry: {}", e);
        }
    }

    /// Clear all caches
    pub fn clear(&self) -> Result<()> {
        if let Some(ref memory) = self.memory {
            memory.clear();
        }

        if let Some(ref disk) = self.disk {
            disk.clear()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_only_cache() {
        let config = CacheConfig {
            disk_enabled: false,
            ..CacheConfig::default()
        };
        let cache = TranslationCache::new(&config).unwrap();
        let key = CacheKey::new("m", "hello");
        assert!(cache.get(&key).await.is_none());
        cache.insert(&key, "你好").await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("你好"));
    }

    #[tokio::test]
    async fn test_disk_only_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            memory_enabled: false,
            disk_path: Some(dir.path().join("db")),
            ..CacheConfig::default()
        };
        let key = CacheKey::new("m", "hello");
        let cache = TranslationCache::new(&config).unwrap();
        cache.insert(&key, "你好").await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("你好"));
        cache.clear().unwrap();
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = TranslationCache::disabled();
        assert!(!cache.is_enabled());
        let key = CacheKey::new("m", "x");
        cache.insert(&key, "y").await;
        assert!(cache.get(&key).await.is_none());
    }
}
