use rand::Rng;
use serde_json::{Map, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::cache::{CacheKey, FingerprintInput, OperationKind, ResponseCache};
use crate::error::{AppError, AppResult};
use crate::models::{EndpointDefinition, HttpMethod};
use crate::services::ai_generator::{AiGenerator, AttemptError, GenerationContext};
use crate::services::fallback::FallbackGenerator;
use crate::services::schema::{normalize_schema, CompiledSchema};

/// Tunables for the generation pipeline
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// AI attempts per request before falling back
    pub max_retries: u32,
    pub attempt_timeout: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub cache_ttl_seconds: u64,
    /// Fallback draws before giving up
    pub fallback_draws: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(2),
            cache_ttl_seconds: 3600,
            fallback_draws: 5,
        }
    }
}

impl GenerationConfig {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped at `backoff_max`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// An inbound call against a resolved endpoint
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub force_refresh: bool,
}

impl MockRequest {
    pub fn new(method: HttpMethod) -> Self {
        Self {
            method,
            body: None,
            force_refresh: false,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn force_refresh(mut self, force_refresh: bool) -> Self {
        self.force_refresh = force_refresh;
        self
    }
}

/// Where a response payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Ai,
    Fallback,
    /// POST body echoed back with a generated id
    Echo,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Ai => "ai",
            Self::Fallback => "fallback",
            Self::Echo => "echo",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    pub body: Value,
    pub source: ResponseSource,
}

/// Coordinates cache, AI generation, validation and fallback for one request
#[derive(Clone)]
pub struct MockResponseService {
    cache: ResponseCache,
    ai: Option<AiGenerator>,
    fallback: FallbackGenerator,
    config: GenerationConfig,
}

impl MockResponseService {
    /// `ai` is `None` when no completion service is configured; requests then go straight to the fallback
    pub fn new(cache: ResponseCache, ai: Option<AiGenerator>, config: GenerationConfig) -> Self {
        Self {
            cache,
            ai,
            fallback: FallbackGenerator::new(),
            config,
        }
    }

    /// Produce the response payload for `request` against `endpoint`
    pub async fn respond(
        &self,
        endpoint: &EndpointDefinition,
        request: MockRequest,
    ) -> AppResult<MockResponse> {
        tracing::info!(
            endpoint_id = %endpoint.id,
            method = %request.method,
            path = %endpoint.path,
            force_refresh = request.force_refresh,
            "Resolving mock response"
        );

        let response_schema = normalize_schema(&endpoint.response_schema)?;
        let response_validator = CompiledSchema::compile(&response_schema)?;

        match request.method {
            HttpMethod::Get | HttpMethod::Delete => {
                let operation = OperationKind::from(request.method);
                let input = match operation {
                    OperationKind::Delete => FingerprintInput::delete(endpoint.id, &response_schema),
                    _ => FingerprintInput::read(endpoint.id, &response_schema),
                };
                let key = CacheKey::derive(&input)?;
                let context = GenerationContext {
                    method: request.method,
                    path: &endpoint.path,
                    description: endpoint.description.as_deref(),
                    request_body: None,
                    request_schema: None,
                };

                self.cached_or_generate(
                    &key,
                    &response_schema,
                    &response_validator,
                    &context,
                    request.force_refresh,
                )
                .await
            }
            HttpMethod::Post => {
                let (body, _) = self.accept_body(endpoint, request.body)?;
                self.echo_created(endpoint, body, &response_schema, &response_validator)
            }
            HttpMethod::Put => {
                let (body, request_schema) = self.accept_body(endpoint, request.body)?;
                let key = CacheKey::derive(&FingerprintInput::with_body(
                    endpoint.id,
                    OperationKind::Update,
                    &body,
                    &request_schema,
                    &response_schema,
                ))?;
                let context = GenerationContext {
                    method: request.method,
                    path: &endpoint.path,
                    description: endpoint.description.as_deref(),
                    request_body: Some(&body),
                    request_schema: Some(&request_schema),
                };

                self.cached_or_generate(
                    &key,
                    &response_schema,
                    &response_validator,
                    &context,
                    request.force_refresh,
                )
                .await
            }
        }
    }

    /// Validate a request body against the endpoint's request schema
    fn accept_body(
        &self,
        endpoint: &EndpointDefinition,
        body: Option<Value>,
    ) -> AppResult<(Value, Value)> {
        let raw_schema = endpoint.request_schema.as_ref().ok_or_else(|| {
            AppError::InvalidSchemaFormat(format!(
                "{} endpoint has no request schema",
                endpoint.method
            ))
        })?;
        let request_schema = normalize_schema(raw_schema)?;
        let validator = CompiledSchema::compile(&request_schema)?;

        let body = body.unwrap_or(Value::Null);
        let report = validator.validate(&body);
        if !report.valid {
            tracing::info!(
                endpoint_id = %endpoint.id,
                errors = %report.summary(),
                "Request body rejected"
            );
            return Err(AppError::RequestValidationFailed(report.errors));
        }

        Ok((body, request_schema))
    }

    /// POST: the accepted body plus a generated id is the created resource
    fn echo_created(
        &self,
        endpoint: &EndpointDefinition,
        body: Value,
        response_schema: &Value,
        validator: &CompiledSchema,
    ) -> AppResult<MockResponse> {
        let created = attach_id(body, response_schema, &mut rand::rng());

        let report = validator.validate(&created);
        if !report.valid {
            tracing::warn!(
                endpoint_id = %endpoint.id,
                errors = %report.summary(),
                "Created resource does not match response schema"
            );
            return Err(AppError::GenerationExhausted(format!(
                "created resource does not match response schema: {}",
                report.summary()
            )));
        }

        Ok(MockResponse {
            body: created,
            source: ResponseSource::Echo,
        })
    }

    async fn cached_or_generate(
        &self,
        key: &CacheKey,
        schema: &Value,
        validator: &CompiledSchema,
        context: &GenerationContext<'_>,
        force_refresh: bool,
    ) -> AppResult<MockResponse> {
        if let Some(cached) = self.cache.lookup(key, force_refresh).await {
            return Ok(MockResponse {
                body: cached,
                source: ResponseSource::Cache,
            });
        }

        let response = match self.generate_with_ai(schema, validator, context).await {
            Some(body) => MockResponse {
                body,
                source: ResponseSource::Ai,
            },
            None => MockResponse {
                body: self.generate_fallback(schema, validator)?,
                source: ResponseSource::Fallback,
            },
        };

        self.cache.set(key, &response.body).await;
        Ok(response)
    }

    /// Up to `max_retries` sequential attempts; `None` once they are spent
    async fn generate_with_ai(
        &self,
        schema: &Value,
        validator: &CompiledSchema,
        context: &GenerationContext<'_>,
    ) -> Option<Value> {
        let Some(ai) = &self.ai else {
            tracing::debug!("No completion service configured, using fallback generator");
            return None;
        };

        let max_retries = self.config.max_retries.max(1);
        for attempt in 1..=max_retries {
            let result = ai.generate(schema, context).await.and_then(|candidate| {
                let report = validator.validate(&candidate);
                if report.valid {
                    Ok(candidate)
                } else {
                    Err(AttemptError::SchemaMismatch(report.errors))
                }
            });

            match result {
                Ok(payload) => {
                    tracing::info!(attempt, "Generated response with completion service");
                    return Some(payload);
                }
                Err(e) => {
                    tracing::warn!(attempt, max_retries, error = %e, "Generation attempt failed");
                }
            }

            if attempt < max_retries {
                tokio::time::sleep(self.config.backoff(attempt)).await;
            }
        }

        tracing::warn!(max_retries, "Generation attempts exhausted, using fallback generator");
        None
    }

    fn generate_fallback(&self, schema: &Value, validator: &CompiledSchema) -> AppResult<Value> {
        let draws = self.config.fallback_draws.max(1);
        let mut last_errors = String::new();

        for draw in 1..=draws {
            let candidate = self.fallback.generate(schema);
            let report = validator.validate(&candidate);
            if report.valid {
                tracing::info!(draw, "Generated response with fallback generator");
                return Ok(candidate);
            }
            last_errors = report.summary();
            tracing::debug!(draw, errors = %last_errors, "Fallback draw did not match schema");
        }

        Err(AppError::GenerationExhausted(format!(
            "fallback output does not match response schema: {}",
            last_errors
        )))
    }
}

/// Merge a generated `id` into an object body; a body-supplied `id` wins
fn attach_id<R: Rng + ?Sized>(body: Value, response_schema: &Value, rng: &mut R) -> Value {
    let Value::Object(fields) = body else {
        return body;
    };

    let mut created = Map::new();
    created.insert("id".to_string(), generated_id(response_schema, rng));
    created.extend(fields);
    Value::Object(created)
}

/// An id shaped like the response schema's `id` property
fn generated_id<R: Rng + ?Sized>(response_schema: &Value, rng: &mut R) -> Value {
    let id_schema = response_schema.pointer("/properties/id");
    let id_type = id_schema.and_then(|s| s.get("type")).and_then(Value::as_str);
    let id_format = id_schema.and_then(|s| s.get("format")).and_then(Value::as_str);

    match (id_type, id_format) {
        (Some("integer") | Some("number"), _) => Value::from(rng.random_range(1..=999_999_u32)),
        (Some("string"), Some("uuid")) => Value::String(Uuid::new_v4().to_string()),
        _ => Value::String(rng.random_range(0..1_000_000_u32).to_string()),
    }
}
