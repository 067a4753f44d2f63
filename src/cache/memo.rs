use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Cache contract for the memoized read paths. Implemented by
/// `RedisManager` for production and `MemoryCache` for tests.
#[async_trait]
pub trait IndexCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Stores with no expiry.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Deletes every key matching the pattern, returns the count.
    async fn scan_delete(&self, pattern: &str) -> Result<usize>;
}

/// All keys of the index domain share this prefix so a rebuild can flush
/// them with one wildcard scan.
const KEY_PREFIX: &str = "index";

/// Cache key for a date-keyed read. The operation name and the date are the
/// whole key: every cached operation must be a pure function of the date.
pub fn cache_key(operation: &str, date: NaiveDate) -> String {
    format!("{}:{}:{}", KEY_PREFIX, operation, date)
}

/// Wildcard matching every key of the index domain.
pub fn flush_pattern() -> String {
    format!("{}:*", KEY_PREFIX)
}

/// Cache-aside read: check the cache under `cache_key(operation, date)`,
/// fall back to `compute` on a miss, populate the cache with any non-empty
/// result. Cache failures degrade to direct computation instead of failing
/// the read; a `None` from `compute` is returned as-is and never cached.
pub async fn cached_fetch<T, F, Fut>(
    cache: &dyn IndexCache,
    operation: &str,
    date: NaiveDate,
    compute: F,
) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let key = cache_key(operation, date);

    match cache.get(&key).await {
        Ok(Some(cached)) => match serde_json::from_str(&cached) {
            Ok(value) => {
                debug!("Cache hit for key: {}", key);
                return Ok(Some(value));
            }
            Err(e) => {
                warn!("Discarding undecodable cache entry {}: {}", key, e);
            }
        },
        Ok(None) => {
            debug!("Cache miss for key: {}", key);
        }
        Err(e) => {
            warn!("Cache read failed for {}, falling back to store: {}", key, e);
        }
    }

    let value = compute().await?;

    if let Some(ref v) = value {
        let serialized = serde_json::to_string(v)?;
        if let Err(e) = cache.set(&key, &serialized).await {
            warn!("Cache write failed for {}: {}", key, e);
        }
    }

    Ok(value)
}

/// In-memory cache with trailing-wildcard scan support. Used by the test
/// suite in place of Redis.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl IndexCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<usize> {
        let prefix = pattern.trim_end_matches('*');
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Cache whose every operation errors, standing in for a Redis outage.
    struct DownCache;

    #[async_trait]
    impl IndexCache for DownCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(anyhow!("connection refused"))
        }
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(anyhow!("connection refused"))
        }
        async fn scan_delete(&self, _pattern: &str) -> Result<usize> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn key_is_operation_and_date_only() {
        assert_eq!(
            cache_key("composition", date("2024-01-02")),
            "index:composition:2024-01-02"
        );
        assert!(cache_key("performance", date("2024-01-02")).starts_with("index:"));
    }

    #[tokio::test]
    async fn miss_computes_and_populates() {
        let cache = MemoryCache::new();
        let result: Option<Vec<String>> =
            cached_fetch(&cache, "composition", date("2024-01-02"), || async {
                Ok(Some(vec!["AAPL".to_string()]))
            })
            .await
            .unwrap();

        assert_eq!(result, Some(vec!["AAPL".to_string()]));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn hit_skips_compute() {
        let cache = MemoryCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Option<i64> =
                cached_fetch(&cache, "performance", date("2024-01-02"), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(7))
                })
                .await
                .unwrap();
            assert_eq!(result, Some(7));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn absent_result_is_not_cached() {
        let cache = MemoryCache::new();
        let result: Option<i64> =
            cached_fetch(&cache, "performance", date("2024-01-02"), || async {
                Ok(None)
            })
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn unavailable_cache_degrades_to_compute() {
        let result: Option<i64> =
            cached_fetch(&DownCache, "performance", date("2024-01-02"), || async {
                Ok(Some(42))
            })
            .await
            .unwrap();

        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn flush_pattern_removes_domain_keys_only() {
        let cache = MemoryCache::new();
        cache.set("index:composition:2024-01-02", "[]").await.unwrap();
        cache.set("index:performance:2024-01-02", "{}").await.unwrap();
        cache.set("other:thing", "1").await.unwrap();

        let removed = cache.scan_delete(&flush_pattern()).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get("other:thing").await.unwrap().as_deref(), Some("1"));
    }
}
