//! Redis cache backend, shared between processes

use std::time::Duration;

use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client as RedisClient};
use async_trait::async_trait;
use tracing::info;

use super::CacheStore;
use crate::error::{Error, Result};

/// Cache backed by a Redis server (plain `GET` / `SET EX`)
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to `redis://` or `rediss://` URL
    pub async fn connect(url: &str) -> Result<Self> {
        let client = RedisClient::open(url)
            .map_err(|e| Error::Config(format!("Invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client).await?;

        info!("Connected to redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            // SET EX rejects 0, round sub-second TTLs up
            Some(ttl) => {
                let secs = ttl.as_secs().max(1);
                conn.set_ex::<_, _, ()>(key, value, secs).await?;
            }
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
