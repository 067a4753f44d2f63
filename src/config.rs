use crate::cache::memo::IndexCache;
use crate::cache::redis::RedisManager;
use crate::database::postgres::PostgresManager;
use crate::database::store::IndexStore;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Process configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub db_max_connections: usize,
    pub redis_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let db_port = std::env::var("DB_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse::<u16>()
            .context("DB_PORT is not a valid port number")?;

        Ok(Self {
            db_host: std::env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            db_port,
            db_user: std::env::var("DB_USER").unwrap_or_else(|_| "indexuser".to_string()),
            db_password: std::env::var("DB_PASSWORD").unwrap_or_else(|_| "indexpass".to_string()),
            db_name: std::env::var("DB_NAME").unwrap_or_else(|_| "indexdb".to_string()),
            db_max_connections: 10,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
        })
    }
}

/// Explicit store and cache handles, constructed once per process and
/// threaded into each component.
pub struct AppContext {
    pub store: Arc<dyn IndexStore>,
    pub cache: Arc<dyn IndexCache>,
}

impl AppContext {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let store = PostgresManager::new(
            &config.db_host,
            config.db_port,
            &config.db_user,
            &config.db_password,
            &config.db_name,
            config.db_max_connections,
        )
        .await?;

        let cache = RedisManager::new(&config.redis_url).await?;

        Ok(Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
        })
    }
}
