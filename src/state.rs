use std::sync::Arc;

use redis::aio::ConnectionManager as RedisConnectionManager;
use sea_orm::{ConnectOptions, Database};
use sqlx::postgres::PgPool;

use crate::cache::{CacheStore, RedisCacheStore, ResponseCache};
use crate::config::Config;
use crate::registry::{EndpointRegistry, PgEndpointRegistry};
use crate::services::{AiGenerator, CompletionClient, MockResponseService, OpenAiClient};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Resolves inbound requests to endpoint definitions
    pub registry: Arc<dyn EndpointRegistry>,
    pub mock_service: Arc<MockResponseService>,
}

impl AppState {
    /// Create a new AppState by connecting to Postgres, Redis and the completion service
    pub async fn new(config: Config) -> Result<Self, AppStateError> {
        // Connect to PostgreSQL with SQLx (for migrations)
        let pg_pool = PgPool::connect(&config.database_url)
            .await
            .map_err(|e| AppStateError::Postgres(e.to_string()))?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pg_pool)
            .await
            .map_err(|e| AppStateError::Migration(e.to_string()))?;

        // Connect to PostgreSQL with SeaORM
        let mut opt = ConnectOptions::new(&config.database_url);
        opt.max_connections(50)
            .min_connections(5)
            .sqlx_logging(true);

        let db = Database::connect(opt)
            .await
            .map_err(|e| AppStateError::Postgres(e.to_string()))?;

        // Connect to Redis
        let redis_client = redis::Client::open(config.redis_url.as_str())
            .map_err(|e| AppStateError::Redis(e.to_string()))?;
        let redis = RedisConnectionManager::new(redis_client)
            .await
            .map_err(|e| AppStateError::Redis(e.to_string()))?;

        // One pooled HTTP client for the lifetime of the process
        let completion = OpenAiClient::from_config(&config)
            .map_err(|e| AppStateError::Completion(e.to_string()))?
            .map(|client| Arc::new(client) as Arc<dyn CompletionClient>);
        if completion.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, responses will come from the fallback generator");
        }

        let registry: Arc<dyn EndpointRegistry> = Arc::new(PgEndpointRegistry::new(db));
        let cache_store: Arc<dyn CacheStore> = Arc::new(RedisCacheStore::new(redis));

        Ok(Self::with_components(config, registry, cache_store, completion))
    }

    /// Create AppState from already-built collaborators (for testing)
    pub fn with_components(
        config: Config,
        registry: Arc<dyn EndpointRegistry>,
        cache_store: Arc<dyn CacheStore>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        let generation = config.generation();
        let cache = ResponseCache::new(cache_store, generation.cache_ttl_seconds);
        let ai = completion.map(|client| AiGenerator::new(client, generation.attempt_timeout));
        let mock_service = Arc::new(MockResponseService::new(cache, ai, generation));

        Self {
            config,
            registry,
            mock_service,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("PostgreSQL connection error: {0}")]
    Postgres(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Redis connection error: {0}")]
    Redis(String),

    #[error("Completion client error: {0}")]
    Completion(String),
}
