use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::HttpMethod;

/// Operation kind a cache entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Read,
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl From<HttpMethod> for OperationKind {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::Read,
            HttpMethod::Post => Self::Create,
            HttpMethod::Put => Self::Update,
            HttpMethod::Delete => Self::Delete,
        }
    }
}

/// Inputs that identify one cacheable generation
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    pub endpoint_id: Uuid,
    pub operation: OperationKind,
    pub response_schema: &'a Value,
    /// Only for body-bearing operations
    pub request_schema: Option<&'a Value>,
    /// Only for body-bearing operations
    pub request_body: Option<&'a Value>,
}

impl<'a> FingerprintInput<'a> {
    pub fn read(endpoint_id: Uuid, response_schema: &'a Value) -> Self {
        Self {
            endpoint_id,
            operation: OperationKind::Read,
            response_schema,
            request_schema: None,
            request_body: None,
        }
    }

    pub fn delete(endpoint_id: Uuid, response_schema: &'a Value) -> Self {
        Self {
            operation: OperationKind::Delete,
            ..Self::read(endpoint_id, response_schema)
        }
    }

    pub fn with_body(
        endpoint_id: Uuid,
        operation: OperationKind,
        request_body: &'a Value,
        request_schema: &'a Value,
        response_schema: &'a Value,
    ) -> Self {
        Self {
            endpoint_id,
            operation,
            response_schema,
            request_schema: Some(request_schema),
            request_body: Some(request_body),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Fingerprint<'a> {
    endpoint_id: String,
    operation: &'static str,
    response_schema: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_body: Option<&'a Value>,
}

/// Deterministic cache key: `{operation}:{endpoint_id}:{sha256 of canonical JSON}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key from RFC 8785 canonical JSON, so key order and
    /// whitespace in schemas or bodies never change the fingerprint
    pub fn derive(input: &FingerprintInput<'_>) -> AppResult<Self> {
        let fingerprint = Fingerprint {
            endpoint_id: input.endpoint_id.to_string(),
            operation: input.operation.as_str(),
            response_schema: input.response_schema,
            request_schema: input.request_schema,
            request_body: input.request_body,
        };

        let value = serde_json::to_value(&fingerprint)
            .map_err(|e| AppError::Internal(format!("Fingerprint serialization error: {}", e)))?;
        let canonical = serde_jcs::to_vec(&value)
            .map_err(|e| AppError::Internal(format!("Canonical JSON error: {}", e)))?;

        let digest = Sha256::digest(&canonical);

        Ok(Self(format!(
            "{}:{}:{}",
            input.operation.as_str(),
            input.endpoint_id,
            hex::encode(digest)
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}, "age": {"type": "integer"}}
        })
    }

    #[test]
    fn test_key_is_deterministic() {
        let id = Uuid::new_v4();
        let schema = schema();

        let a = CacheKey::derive(&FingerprintInput::read(id, &schema)).unwrap();
        let b = CacheKey::derive(&FingerprintInput::read(id, &schema)).unwrap();

        assert_eq!(a, b);
        assert!(a.as_str().starts_with(&format!("read:{}:", id)));
        // sha256 hex digest
        assert_eq!(a.as_str().rsplit(':').next().unwrap().len(), 64);
    }

    #[test]
    fn test_key_ignores_property_order() {
        let id = Uuid::new_v4();
        let a: Value = serde_json::from_str(
            r#"{"type":"object","properties":{"a":{"type":"string"},"b":{"type":"number"}}}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{ "properties": { "b": {"type": "number"}, "a": {"type": "string"} }, "type": "object" }"#,
        )
        .unwrap();

        assert_eq!(
            CacheKey::derive(&FingerprintInput::read(id, &a)).unwrap(),
            CacheKey::derive(&FingerprintInput::read(id, &b)).unwrap()
        );
    }

    #[test]
    fn test_each_input_changes_key() {
        let id = Uuid::new_v4();
        let request_schema = json!({"type": "object"});
        let response_schema = schema();
        let body = json!({"name": "Alice"});

        let base = CacheKey::derive(&FingerprintInput::with_body(
            id,
            OperationKind::Update,
            &body,
            &request_schema,
            &response_schema,
        ))
        .unwrap();

        let other_body = json!({"name": "Bob"});
        let other_request_schema = json!({"type": "object", "required": ["name"]});
        let other_response_schema = json!({"type": "object"});

        let variants = [
            FingerprintInput::with_body(
                Uuid::new_v4(),
                OperationKind::Update,
                &body,
                &request_schema,
                &response_schema,
            ),
            FingerprintInput::with_body(
                id,
                OperationKind::Update,
                &other_body,
                &request_schema,
                &response_schema,
            ),
            FingerprintInput::with_body(
                id,
                OperationKind::Update,
                &body,
                &other_request_schema,
                &response_schema,
            ),
            FingerprintInput::with_body(
                id,
                OperationKind::Update,
                &body,
                &request_schema,
                &other_response_schema,
            ),
            FingerprintInput::with_body(
                id,
                OperationKind::Create,
                &body,
                &request_schema,
                &response_schema,
            ),
        ];

        for variant in variants {
            assert_ne!(CacheKey::derive(&variant).unwrap(), base);
        }
    }

    #[test]
    fn test_read_and_delete_do_not_share_slots() {
        let id = Uuid::new_v4();
        let schema = schema();

        let read = CacheKey::derive(&FingerprintInput::read(id, &schema)).unwrap();
        let delete = CacheKey::derive(&FingerprintInput::delete(id, &schema)).unwrap();

        assert_ne!(read, delete);
    }
}
