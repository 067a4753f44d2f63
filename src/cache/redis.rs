use crate::cache::memo::IndexCache;
use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use tracing::{info, warn};

pub struct RedisManager {
    pool: Pool,
}

impl RedisManager {
    pub async fn new(url: &str) -> Result<Self> {
        let cfg = Config::from_url(url);
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .context("Failed to create Redis connection pool")?;

        // Probe the connection. A cache that is down must not prevent the
        // service from starting; reads fall back to the store.
        match pool.get().await {
            Ok(mut conn) => match redis::cmd("PING").query_async::<_, ()>(&mut conn).await {
                Ok(()) => info!("Connected to Redis successfully"),
                Err(e) => warn!("Redis ping failed, reads will bypass the cache: {}", e),
            },
            Err(e) => warn!("Redis unavailable, reads will bypass the cache: {}", e),
        }

        Ok(Self { pool })
    }
}

#[async_trait]
impl IndexCache for RedisManager {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await?;
        let result: Option<String> = conn.get(key).await?;
        Ok(result)
    }

    // Derived rows never expire on their own; invalidation is the
    // domain-wide flush after a rebuild.
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.pool.get().await?;
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.pool.get().await?;

        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        for key in &keys {
            conn.del::<_, ()>(key).await?;
        }

        Ok(keys.len())
    }
}
