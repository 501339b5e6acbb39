//! Fast-tier key-value store.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::errors::Result;

/// Default capacity of the in-process store (entries, one per ticker-day).
pub const DEFAULT_MAX_ENTRIES: u64 = 50_000;

/// One write with its own expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub ttl: Duration,
}

/// Low-latency key-value store with per-key expiration.
///
/// Multi-key calls are a single round trip for networked implementations.
#[async_trait]
pub trait FastCacheStore: Send + Sync {
    /// Values in the same order as `keys`; `None` for absent or expired keys.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    async fn set_many(&self, entries: Vec<CacheEntry>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Clone)]
struct CachedValue {
    json: Arc<str>,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct PerEntryTtl;

impl Expiry<String, CachedValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process fast tier backed by moka.
pub struct MokaCacheStore {
    cache: Cache<String, CachedValue>,
}

impl MokaCacheStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FastCacheStore for MokaCacheStore {
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.cache.get(key).await.map(|v| v.json.to_string()));
        }
        Ok(values)
    }

    async fn set_many(&self, entries: Vec<CacheEntry>) -> Result<()> {
        for entry in entries {
            let value = CachedValue {
                json: Arc::from(entry.value),
                ttl: entry.ttl,
            };
            self.cache.insert(entry.key, value).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, value: &str, ttl: Duration) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            value: value.to_string(),
            ttl,
        }
    }

    #[tokio::test]
    async fn test_get_many_preserves_order() {
        let store = MokaCacheStore::new();
        store
            .set_many(vec![
                entry("a", "1", Duration::from_secs(60)),
                entry("c", "3", Duration::from_secs(60)),
            ])
            .await
            .unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.get_many(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn test_entries_expire_individually() {
        let store = MokaCacheStore::new();
        store
            .set_many(vec![
                entry("short", "1", Duration::from_millis(50)),
                entry("long", "2", Duration::from_secs(60)),
            ])
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let keys = vec!["short".to_string(), "long".to_string()];
        let values = store.get_many(&keys).await.unwrap();
        assert_eq!(values, vec![None, Some("2".to_string())]);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MokaCacheStore::new();
        store
            .set_many(vec![entry("k", "v", Duration::from_secs(60))])
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(
            store.get_many(&["k".to_string()]).await.unwrap(),
            vec![None]
        );
    }
}
