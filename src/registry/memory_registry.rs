use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_path, CreateEndpoint, EndpointDefinition, HttpMethod};
use crate::registry::EndpointRegistry;

type RouteKey = (String, String, HttpMethod);

/// In-memory registry for tests and local runs without Postgres
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    endpoints: Arc<RwLock<HashMap<RouteKey, EndpointDefinition>>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a definition by id (used to inspect `last_request_at`)
    pub async fn get(&self, id: Uuid) -> Option<EndpointDefinition> {
        let endpoints = self.endpoints.read().await;
        endpoints.values().find(|e| e.id == id).cloned()
    }
}

#[async_trait]
impl EndpointRegistry for InMemoryRegistry {
    async fn lookup(
        &self,
        user_slug: &str,
        path: &str,
        method: HttpMethod,
    ) -> AppResult<Option<EndpointDefinition>> {
        let key = (user_slug.to_string(), normalize_path(path), method);
        let endpoints = self.endpoints.read().await;
        Ok(endpoints.get(&key).cloned())
    }

    async fn create(&self, input: CreateEndpoint) -> AppResult<EndpointDefinition> {
        let definition = input.into_definition();
        let key = (
            definition.user_slug.clone(),
            definition.path.clone(),
            definition.method,
        );

        let mut endpoints = self.endpoints.write().await;
        if endpoints.contains_key(&key) {
            return Err(AppError::Conflict("Endpoint".to_string()));
        }
        endpoints.insert(key, definition.clone());

        Ok(definition)
    }

    async fn mark_requested(&self, id: Uuid) -> AppResult<()> {
        let mut endpoints = self.endpoints.write().await;
        let endpoint = endpoints
            .values_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound("Endpoint".to_string()))?;
        endpoint.last_request_at = Some(time::OffsetDateTime::now_utc());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_input(path: &str, method: HttpMethod) -> CreateEndpoint {
        CreateEndpoint {
            user_id: Uuid::new_v4(),
            user_slug: "alice-1a2b3c4d".to_string(),
            name: format!("{} {}", method, path),
            description: None,
            method,
            path: path.to_string(),
            request_schema: None,
            response_schema: json!({"type": "object"}),
            status_code: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let registry = InMemoryRegistry::new();
        let created = registry
            .create(create_input("users/", HttpMethod::Get))
            .await
            .unwrap();
        assert_eq!(created.path, "/users");
        assert_eq!(created.status_code, 200);

        let found = registry
            .lookup("alice-1a2b3c4d", "users", HttpMethod::Get)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);

        let other_method = registry
            .lookup("alice-1a2b3c4d", "/users", HttpMethod::Delete)
            .await
            .unwrap();
        assert!(other_method.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_route_conflicts() {
        let registry = InMemoryRegistry::new();
        registry
            .create(create_input("/orders", HttpMethod::Post))
            .await
            .unwrap();

        let result = registry
            .create(create_input("orders", HttpMethod::Post))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // Same path with another verb is a distinct route
        let put = registry
            .create(create_input("/orders", HttpMethod::Put))
            .await
            .unwrap();
        assert_eq!(put.status_code, 200);
    }

    #[tokio::test]
    async fn test_mark_requested() {
        let registry = InMemoryRegistry::new();
        let created = registry
            .create(create_input("/ping", HttpMethod::Get))
            .await
            .unwrap();
        assert!(created.last_request_at.is_none());

        registry.mark_requested(created.id).await.unwrap();

        let updated = registry.get(created.id).await.unwrap();
        assert!(updated.last_request_at.is_some());
    }
}
