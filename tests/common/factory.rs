use serde_json::{json, Value};
use uuid::Uuid;

use mockable::models::{CreateEndpoint, EndpointDefinition, HttpMethod};
use mockable::registry::EndpointRegistry;

use super::app::TestApp;

pub const USER_SLUG: &str = "alice-1a2b3c4d";

/// Factory for creating test endpoints
pub struct Factory<'a> {
    app: &'a TestApp,
    user_id: Uuid,
}

impl<'a> Factory<'a> {
    pub fn new(app: &'a TestApp) -> Self {
        Self {
            app,
            user_id: Uuid::new_v4(),
        }
    }

    /// Object schema used by most tests
    pub fn user_schema() -> Value {
        json!({
            "type": "object",
            "required": ["id", "name", "email"],
            "additionalProperties": false,
            "properties": {
                "id": {"type": "integer", "minimum": 1},
                "name": {"type": "string", "minLength": 1},
                "email": {"type": "string", "format": "email"}
            }
        })
    }

    pub fn name_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        })
    }

    pub fn input(&self, method: HttpMethod, path: &str, response_schema: Value) -> CreateEndpoint {
        CreateEndpoint {
            user_id: self.user_id,
            user_slug: USER_SLUG.to_string(),
            name: format!("{} {}", method, path),
            description: Some("Registered users of the demo shop".to_string()),
            method,
            path: path.to_string(),
            request_schema: None,
            response_schema,
            status_code: None,
        }
    }

    pub async fn create(&self, input: CreateEndpoint) -> EndpointDefinition {
        self.app
            .registry
            .create(input)
            .await
            .expect("Failed to create endpoint")
    }

    /// GET endpoint returning `response_schema`
    pub async fn get_endpoint(&self, path: &str, response_schema: Value) -> EndpointDefinition {
        self.create(self.input(HttpMethod::Get, path, response_schema))
            .await
    }

    /// Body-bearing endpoint with both schemas
    pub async fn body_endpoint(
        &self,
        method: HttpMethod,
        path: &str,
        request_schema: Value,
        response_schema: Value,
    ) -> EndpointDefinition {
        let mut input = self.input(method, path, response_schema);
        input.request_schema = Some(request_schema);
        self.create(input).await
    }

    /// Endpoint configured to answer with a fixed status
    pub async fn status_endpoint(&self, path: &str, status_code: u16) -> EndpointDefinition {
        let mut input = self.input(HttpMethod::Get, path, Self::user_schema());
        input.status_code = Some(status_code);
        self.create(input).await
    }

    pub fn url(path: &str) -> String {
        format!("/api/{}{}", USER_SLUG, path)
    }
}
