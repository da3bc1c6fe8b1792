// Library crate for Mockable
// Exports modules for use by the server binary and tests

pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod services;
pub mod state;

use axum::{http::HeaderValue, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{delete_mock, get_mock, health_check, post_mock, put_mock};
use crate::state::AppState;

/// Build the application router with the given state
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(state.config.cors_origin.as_deref());

    let mock_routes = get(get_mock)
        .post(post_mock)
        .put(put_mock)
        .delete(delete_mock);

    Router::new()
        .route("/", get(|| async { "Hello, Mockable!" }))
        .route("/api/health/check", get(health_check))
        // Mock routes; the root variant serves a user's "/" endpoint
        .route("/api/{user_slug}", mock_routes.clone())
        .route("/api/{user_slug}/{*path}", mock_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Allow the configured origin, or any origin when none is set
fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            layer.allow_origin(Any)
        }
        None => layer.allow_origin(Any),
    }
}
