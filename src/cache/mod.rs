pub mod key;
pub mod memory_store;
pub mod redis_store;
pub mod response_cache;

pub use key::{CacheKey, FingerprintInput, OperationKind};
pub use memory_store::InMemoryCacheStore;
pub use redis_store::RedisCacheStore;
pub use response_cache::ResponseCache;

use async_trait::async_trait;

use crate::error::AppResult;

/// Key-value store with per-entry expiry backing the response cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the raw value stored under `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Store `value` under `key`, expiring after `ttl_seconds`
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()>;
}
