use async_trait::async_trait;
use redis::aio::ConnectionManager as RedisConnectionManager;
use redis::AsyncCommands;

use crate::cache::CacheStore;
use crate::error::AppResult;

/// Redis keys structure:
/// - mockable:cache:{operation}:{endpoint_id}:{sha256}   - String with generated payload (JSON), SET EX
const CACHE_PREFIX: &str = "mockable:cache:";

/// Redis-backed cache store
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: RedisConnectionManager,
}

impl RedisCacheStore {
    pub fn new(conn: RedisConnectionManager) -> Self {
        Self { conn }
    }

    fn cache_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(Self::cache_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::cache_key(key), value, ttl_seconds).await?;
        Ok(())
    }
}
