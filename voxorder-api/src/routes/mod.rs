//! HTTP routes.

pub mod health;
pub mod webhook;

use axum::{extract::DefaultBodyLimit, middleware::from_fn, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

/// Build the full application router.
///
/// - `/api/webhooks/voice` - callback receiver (POST) and status check (GET)
/// - `/health/*` - health checks
/// - `/metrics` - Prometheus scrape endpoint
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    Router::new()
        .nest("/api/webhooks", webhook::create_router())
        .nest("/health", health::create_router())
        .route("/metrics", get(metrics_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
