use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::models::HttpMethod;
use crate::services::SchemaViolation;

/// Error from the completion service
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion request failed: {0}")]
    Request(String),

    #[error("Completion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion response could not be decoded: {0}")]
    Decode(String),
}

/// Chat-style completion service used to produce realistic payloads
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Return the model's text for one system + user prompt pair
    async fn complete(&self, system_prompt: &str, user_prompt: &str)
        -> Result<String, CompletionError>;
}

// ============ OpenAI-compatible client ============

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` API.
///
/// Built once at startup; the inner `reqwest::Client` pools connections and
/// is shared by every request.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Build the client from configuration, `None` when no API key is set
    pub fn from_config(config: &Config) -> Result<Option<Self>, CompletionError> {
        let Some(api_key) = &config.openai_api_key else {
            return Ok(None);
        };

        Self::new(
            api_key.clone(),
            config.openai_base_url.clone(),
            config.openai_model.clone(),
            Duration::from_secs(config.ai_timeout_seconds),
        )
        .map(Some)
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, CompletionError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: 0.7,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Decode(e.to_string()))?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

// ============ Generation ============

/// Why a single generation attempt produced nothing usable; always retryable
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion returned no content")]
    EmptyOutput,

    #[error("generated text is not JSON: {0}")]
    Parse(String),

    #[error("generated data does not match the response schema: {}", summarize(.0))]
    SchemaMismatch(Vec<SchemaViolation>),
}

fn summarize(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// What the model is told about the request besides the schema
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub method: HttpMethod,
    pub path: &'a str,
    pub description: Option<&'a str>,
    /// Accepted request body (PUT/POST)
    pub request_body: Option<&'a Value>,
    /// Schema the request body was validated against (PUT/POST)
    pub request_schema: Option<&'a Value>,
}

const BASE_SYSTEM_PROMPT: &str = "\
You are a data generator that strictly adheres to the provided JSON schema. When generating data:

- Include every required property and respect the declared type, format and constraints of each field.
- Optional properties may be omitted; never include properties the schema does not declare.
- Pay special attention to 'oneOf', 'anyOf' and 'allOf' conditions.
- Use plausible, domain-realistic values inferred from property names and the endpoint description. \
Avoid generic placeholders such as \"string\", \"foo\", \"test\" or \"example\".
- Output only the JSON data without any explanations or extra text.";

const UPDATE_SYSTEM_PROMPT: &str = "\
You are a data generator that strictly adheres to the provided JSON schemas. When generating response data for a PUT request:

- Use the provided request body and request schema as context.
- Assume this represents a full resource update; carry the request body's values into matching response fields.
- Ensure all properties in the response match the response schema, including 'oneOf', 'anyOf' and 'allOf' conditions.
- Do not include additional properties not defined in the response schema.
- Use plausible, domain-realistic values for fields the request does not determine; avoid generic placeholders.
- Output only the JSON data without any explanations or extra text.";

/// Build the (system, user) prompt pair for one generation
pub fn build_prompts(schema: &Value, context: &GenerationContext<'_>) -> (&'static str, String) {
    let mut user_prompt = format!("Endpoint: {} {}\n", context.method, context.path);
    if let Some(description) = context.description.filter(|d| !d.trim().is_empty()) {
        user_prompt.push_str(&format!("Description: {}\n", description.trim()));
    }

    match (context.request_body, context.request_schema) {
        (Some(body), Some(request_schema)) => {
            user_prompt.push_str(&format!(
                "Request Body: {}\nRequest Schema: {}\nResponse Schema: {}",
                body, request_schema, schema
            ));
            (UPDATE_SYSTEM_PROMPT, user_prompt)
        }
        _ => {
            user_prompt.push_str(&format!("JSON Schema: {}", schema));
            (BASE_SYSTEM_PROMPT, user_prompt)
        }
    }
}

/// Content of the first fenced code block, without its info string
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let end = after.find("```")?;
    let block = &after[..end];

    let block = match block.split_once('\n') {
        Some((info, rest)) if info.trim().chars().all(|c| c.is_ascii_alphanumeric()) => rest,
        _ => block
            .trim_start()
            .strip_prefix("json")
            .unwrap_or(block),
    };

    Some(block.trim())
}

/// Pull a JSON payload out of free-form model output.
///
/// A fenced code block wins when it parses; otherwise the whole trimmed
/// text must be JSON.
pub fn parse_generated_json(text: &str) -> Result<Value, AttemptError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AttemptError::EmptyOutput);
    }

    if let Some(block) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(block) {
            return Ok(value);
        }
    }

    serde_json::from_str(trimmed).map_err(|e| AttemptError::Parse(e.to_string()))
}

/// Produces candidate payloads through the completion service
#[derive(Clone)]
pub struct AiGenerator {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl AiGenerator {
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Ask the model for a payload and return its raw text
    pub async fn generate_raw(
        &self,
        schema: &Value,
        context: &GenerationContext<'_>,
    ) -> Result<String, AttemptError> {
        let (system_prompt, user_prompt) = build_prompts(schema, context);

        match tokio::time::timeout(
            self.timeout,
            self.client.complete(system_prompt, &user_prompt),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(AttemptError::Timeout(self.timeout)),
        }
    }

    /// Ask the model for a payload and parse it; schema validation is left to the caller
    pub async fn generate(
        &self,
        schema: &Value,
        context: &GenerationContext<'_>,
    ) -> Result<Value, AttemptError> {
        let raw = self.generate_raw(schema, context).await?;
        parse_generated_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_json() {
        let value = parse_generated_json("  {\"id\": 7, \"name\": \"Ada\"}\n").unwrap();
        assert_eq!(value, json!({"id": 7, "name": "Ada"}));
    }

    #[test]
    fn test_parse_fenced_json_block() {
        let text = "Here is your data:\n```json\n{\"id\": 7}\n```\nLet me know!";
        assert_eq!(parse_generated_json(text).unwrap(), json!({"id": 7}));
    }

    #[test]
    fn test_parse_untagged_and_inline_fences() {
        assert_eq!(
            parse_generated_json("```\n[1, 2, 3]\n```").unwrap(),
            json!([1, 2, 3])
        );
        assert_eq!(
            parse_generated_json("```json {\"ok\": true}```").unwrap(),
            json!({"ok": true})
        );
    }

    #[test]
    fn test_parse_failures_are_retryable_errors() {
        assert!(matches!(
            parse_generated_json("Sure! The user is Ada."),
            Err(AttemptError::Parse(_))
        ));
        assert!(matches!(
            parse_generated_json("   "),
            Err(AttemptError::EmptyOutput)
        ));
    }

    #[test]
    fn test_read_prompt_includes_schema_and_description() {
        let schema = json!({"type": "object"});
        let context = GenerationContext {
            method: HttpMethod::Get,
            path: "/users",
            description: Some("List of registered users"),
            request_body: None,
            request_schema: None,
        };

        let (system, user) = build_prompts(&schema, &context);
        assert_eq!(system, BASE_SYSTEM_PROMPT);
        assert!(user.contains("GET /users"));
        assert!(user.contains("List of registered users"));
        assert!(user.contains("JSON Schema: {\"type\":\"object\"}"));
    }

    #[test]
    fn test_update_prompt_includes_request_context() {
        let schema = json!({"type": "object"});
        let request_schema = json!({"type": "object", "required": ["name"]});
        let body = json!({"name": "Alice"});
        let context = GenerationContext {
            method: HttpMethod::Put,
            path: "/users/1",
            description: None,
            request_body: Some(&body),
            request_schema: Some(&request_schema),
        };

        let (system, user) = build_prompts(&schema, &context);
        assert_eq!(system, UPDATE_SYSTEM_PROMPT);
        assert!(user.contains("Request Body: {\"name\":\"Alice\"}"));
        assert!(user.contains("Request Schema:"));
        assert!(user.contains("Response Schema:"));
        assert!(!user.contains("Description:"));
    }

    struct SlowClient;

    #[async_trait]
    impl CompletionClient for SlowClient {
        async fn complete(&self, _: &str, _: &str) -> Result<String, CompletionError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    #[tokio::test]
    async fn test_generation_timeout_is_retryable() {
        let generator = AiGenerator::new(Arc::new(SlowClient), Duration::from_millis(20));
        let schema = json!({"type": "object"});
        let context = GenerationContext {
            method: HttpMethod::Get,
            path: "/slow",
            description: None,
            request_body: None,
            request_schema: None,
        };

        let result = generator.generate(&schema, &context).await;
        assert!(matches!(result, Err(AttemptError::Timeout(_))));
    }
}
