use serde_json::Value;
use std::sync::Arc;

use crate::cache::{CacheKey, CacheStore};

/// Best-effort cache of generated payloads.
///
/// Backend failures never reach the caller: reads degrade to a miss and
/// writes are skipped, both with a warning.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl_seconds: u64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    /// Read a cached payload; `force_refresh` skips the lookup entirely
    pub async fn lookup(&self, key: &CacheKey, force_refresh: bool) -> Option<Value> {
        if force_refresh {
            tracing::debug!(cache_key = %key, "Force refresh requested, skipping cache read");
            return None;
        }
        self.get(key).await
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Value> {
        let raw = match self.store.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(cache_key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(payload) => {
                tracing::debug!(cache_key = %key, "Cache hit");
                Some(payload)
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cached payload is not valid JSON, treating as miss");
                None
            }
        }
    }

    /// Store a payload; returns whether the write reached the backend
    pub async fn set(&self, key: &CacheKey, payload: &Value) -> bool {
        let raw = match serde_json::to_string(payload) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Failed to serialize payload for cache");
                return false;
            }
        };

        match self.store.set(key.as_str(), &raw, self.ttl_seconds).await {
            Ok(()) => {
                tracing::debug!(cache_key = %key, ttl = self.ttl_seconds, "Cached generated payload");
                true
            }
            Err(e) => {
                tracing::warn!(cache_key = %key, error = %e, "Cache write failed, skipping");
                false
            }
        }
    }
}
