use jsonschema::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Turn a stored schema (object or JSON-encoded string) into a parsed schema.
///
/// Already-parsed schemas are returned unchanged. A string that is not JSON,
/// or JSON that is neither an object nor a boolean schema, is an
/// [`AppError::InvalidSchemaFormat`].
pub fn normalize_schema(raw: &Value) -> AppResult<Value> {
    let schema = match raw {
        Value::String(encoded) => serde_json::from_str::<Value>(encoded)
            .map_err(|e| AppError::InvalidSchemaFormat(format!("schema is not valid JSON: {}", e)))?,
        other => other.clone(),
    };

    match schema {
        Value::Object(_) | Value::Bool(_) => Ok(schema),
        other => Err(AppError::InvalidSchemaFormat(format!(
            "schema must be a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One reason a payload does not conform to a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value (empty for the document root)
    pub path: String,
    pub message: String,
}

/// Outcome of validating one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<SchemaViolation>,
}

impl ValidationReport {
    /// Short human-readable summary for logs
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| {
                if e.path.is_empty() {
                    e.message.clone()
                } else {
                    format!("{}: {}", e.path, e.message)
                }
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A compiled JSON Schema, ready to check payloads
pub struct CompiledSchema {
    validator: Validator,
}

impl CompiledSchema {
    /// Compile a parsed schema with format assertions enabled.
    ///
    /// A malformed schema is an [`AppError::InvalidSchemaFormat`]; it is never
    /// reported as a validation failure.
    pub fn compile(schema: &Value) -> AppResult<Self> {
        let validator = jsonschema::options()
            .should_validate_formats(true)
            .build(schema)
            .map_err(|e| AppError::InvalidSchemaFormat(format!("schema does not compile: {}", e)))?;

        Ok(Self { validator })
    }

    pub fn is_valid(&self, payload: &Value) -> bool {
        self.validator.is_valid(payload)
    }

    pub fn validate(&self, payload: &Value) -> ValidationReport {
        let errors: Vec<SchemaViolation> = self
            .validator
            .iter_errors(payload)
            .map(|err| SchemaViolation {
                path: err.instance_path.to_string(),
                message: err.to_string(),
            })
            .collect();

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }
}
