pub mod memory_registry;
pub mod pg_registry;

pub use memory_registry::InMemoryRegistry;
pub use pg_registry::PgEndpointRegistry;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CreateEndpoint, EndpointDefinition, HttpMethod};

/// Endpoint registry trait for abstracting where mock definitions live
#[async_trait]
pub trait EndpointRegistry: Send + Sync {
    /// Find the endpoint registered for a user's route, if any
    async fn lookup(
        &self,
        user_slug: &str,
        path: &str,
        method: HttpMethod,
    ) -> AppResult<Option<EndpointDefinition>>;

    /// Register a new endpoint; one per (user_slug, path, method)
    async fn create(&self, input: CreateEndpoint) -> AppResult<EndpointDefinition>;

    /// Record that the endpoint was just served
    async fn mark_requested(&self, id: Uuid) -> AppResult<()>;
}
