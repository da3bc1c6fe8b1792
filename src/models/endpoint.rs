use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// HTTP verbs a mock endpoint can be registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Status used when an endpoint is registered without one
    pub fn default_status_code(&self) -> u16 {
        match self {
            Self::Post => 201,
            Self::Get | Self::Put | Self::Delete => 200,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("Unsupported HTTP method: {}", other)),
        }
    }
}

/// A registered mock route and the schemas that drive its responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointDefinition {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_slug: String,
    pub name: String,
    pub description: Option<String>,
    pub method: HttpMethod,
    /// Normalized path, always starting with `/`
    pub path: String,
    /// Either a JSON Schema object or a JSON-encoded string of one
    pub request_schema: Option<serde_json::Value>,
    /// Either a JSON Schema object or a JSON-encoded string of one
    pub response_schema: serde_json::Value,
    pub status_code: u16,
    pub last_request_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl EndpointDefinition {
    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// Endpoint creation DTO (without id and timestamps)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEndpoint {
    pub user_id: Uuid,
    pub user_slug: String,
    pub name: String,
    pub description: Option<String>,
    pub method: HttpMethod,
    pub path: String,
    pub request_schema: Option<serde_json::Value>,
    pub response_schema: serde_json::Value,
    pub status_code: Option<u16>,
}

impl CreateEndpoint {
    /// Build a definition with a fresh id and the method's default status when none is given
    pub fn into_definition(self) -> EndpointDefinition {
        let now = OffsetDateTime::now_utc();
        EndpointDefinition {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            user_slug: self.user_slug,
            name: self.name,
            description: self.description,
            status_code: self
                .status_code
                .unwrap_or_else(|| self.method.default_status_code()),
            method: self.method,
            path: normalize_path(&self.path),
            request_schema: self.request_schema,
            response_schema: self.response_schema,
            last_request_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Normalize a route path so `users`, `/users` and `/users/` address the same endpoint
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("users"), "/users");
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path("users/42/orders"), "/users/42/orders");
    }

    #[test]
    fn test_http_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" PUT ".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert!("PATCH".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_default_status_codes() {
        assert_eq!(HttpMethod::Get.default_status_code(), 200);
        assert_eq!(HttpMethod::Post.default_status_code(), 201);
        assert_eq!(HttpMethod::Delete.default_status_code(), 200);
    }
}
