use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::error::{AppError, AppResult};
use crate::models::{EndpointDefinition, HttpMethod};
use crate::services::{MockRequest, MockResponse};
use crate::state::AppState;

/// Names where a mock payload came from: `cache`, `ai`, `fallback` or `echo`
pub const MOCK_SOURCE_HEADER: HeaderName = HeaderName::from_static("x-mock-source");

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize)]
pub struct MockPath {
    pub user_slug: String,
    /// Empty for requests against the user's root path
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct MockQuery {
    /// Skip the cached payload and generate a new one
    #[serde(rename = "forceRefresh", default)]
    pub force_refresh: bool,
}

/// Body returned for endpoints configured with a non-2xx status
#[derive(Debug, Serialize, ToSchema)]
pub struct MockErrorResponse {
    pub error: String,
}

// ============ Handlers ============

/// Serve a generated payload for a registered GET endpoint
#[utoipa::path(
    get,
    path = "/api/{user_slug}/{path}",
    params(
        ("user_slug" = String, Path, description = "Owner's public slug"),
        ("path" = String, Path, description = "Registered endpoint path"),
        MockQuery
    ),
    responses(
        (status = 200, description = "Schema-valid payload (status follows the endpoint definition)"),
        (status = 404, description = "No endpoint registered for this route"),
        (status = 422, description = "Stored schema is malformed"),
        (status = 500, description = "No valid payload could be generated")
    ),
    tag = "Mock"
)]
pub async fn get_mock(
    State(state): State<AppState>,
    Path(path): Path<MockPath>,
    Query(query): Query<MockQuery>,
) -> AppResult<Response> {
    serve(&state, path, HttpMethod::Get, None, query.force_refresh).await
}

/// Echo a created resource for a registered POST endpoint
#[utoipa::path(
    post,
    path = "/api/{user_slug}/{path}",
    params(
        ("user_slug" = String, Path, description = "Owner's public slug"),
        ("path" = String, Path, description = "Registered endpoint path"),
        MockQuery
    ),
    responses(
        (status = 201, description = "Request body with a generated id"),
        (status = 400, description = "Request body does not match the request schema"),
        (status = 404, description = "No endpoint registered for this route")
    ),
    tag = "Mock"
)]
pub async fn post_mock(
    State(state): State<AppState>,
    Path(path): Path<MockPath>,
    Query(query): Query<MockQuery>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    serve(&state, path, HttpMethod::Post, Some(body), query.force_refresh).await
}

/// Serve a generated update response for a registered PUT endpoint
#[utoipa::path(
    put,
    path = "/api/{user_slug}/{path}",
    params(
        ("user_slug" = String, Path, description = "Owner's public slug"),
        ("path" = String, Path, description = "Registered endpoint path"),
        MockQuery
    ),
    responses(
        (status = 200, description = "Schema-valid payload reflecting the update"),
        (status = 400, description = "Request body does not match the request schema"),
        (status = 404, description = "No endpoint registered for this route"),
        (status = 500, description = "No valid payload could be generated")
    ),
    tag = "Mock"
)]
pub async fn put_mock(
    State(state): State<AppState>,
    Path(path): Path<MockPath>,
    Query(query): Query<MockQuery>,
    Json(body): Json<Value>,
) -> AppResult<Response> {
    serve(&state, path, HttpMethod::Put, Some(body), query.force_refresh).await
}

/// Serve a generated confirmation for a registered DELETE endpoint
#[utoipa::path(
    delete,
    path = "/api/{user_slug}/{path}",
    params(
        ("user_slug" = String, Path, description = "Owner's public slug"),
        ("path" = String, Path, description = "Registered endpoint path"),
        MockQuery
    ),
    responses(
        (status = 200, description = "Schema-valid confirmation payload"),
        (status = 404, description = "No endpoint registered for this route"),
        (status = 500, description = "No valid payload could be generated")
    ),
    tag = "Mock"
)]
pub async fn delete_mock(
    State(state): State<AppState>,
    Path(path): Path<MockPath>,
    Query(query): Query<MockQuery>,
) -> AppResult<Response> {
    serve(&state, path, HttpMethod::Delete, None, query.force_refresh).await
}

// ============ Helpers ============

async fn serve(
    state: &AppState,
    path: MockPath,
    method: HttpMethod,
    body: Option<Value>,
    force_refresh: bool,
) -> AppResult<Response> {
    let endpoint = state
        .registry
        .lookup(&path.user_slug, &path.path, method)
        .await?
        .ok_or_else(|| AppError::NotFound("Endpoint".to_string()))?;

    if let Err(e) = state.registry.mark_requested(endpoint.id).await {
        tracing::warn!(endpoint_id = %endpoint.id, error = %e, "Failed to record request time");
    }

    let status = StatusCode::from_u16(endpoint.status_code).map_err(|_| {
        AppError::Internal(format!("Invalid status code {}", endpoint.status_code))
    })?;

    if !endpoint.is_success_status() {
        return Ok(error_status_response(status));
    }

    let mut request = MockRequest::new(method).force_refresh(force_refresh);
    if let Some(body) = body {
        request = request.with_body(body);
    }

    let response = state.mock_service.respond(&endpoint, request).await?;
    Ok(mock_response(&endpoint, status, response))
}

fn error_status_response(status: StatusCode) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error").to_string();
    (status, Json(MockErrorResponse { error: reason })).into_response()
}

fn mock_response(endpoint: &EndpointDefinition, status: StatusCode, response: MockResponse) -> Response {
    tracing::debug!(
        endpoint_id = %endpoint.id,
        source = response.source.as_str(),
        status = status.as_u16(),
        "Serving mock response"
    );

    (
        status,
        [(MOCK_SOURCE_HEADER, response.source.as_str())],
        Json(response.body),
    )
        .into_response()
}
