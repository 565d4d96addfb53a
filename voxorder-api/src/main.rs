//! VOXORDER API Server Entry Point
//!
//! Loads configuration, connects the store backend and starts the Axum
//! HTTP server.

use axum::Router;
use voxorder_api::telemetry::{init_tracing, TelemetryConfig};
use voxorder_api::{
    build_state, create_router, validate_for_production, ApiConfig, ApiError, ApiResult, Backends,
    DbConfig, WebhookConfig,
};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracing(&telemetry_config)?;

    let api_config = ApiConfig::from_env()?;
    let webhook_config = WebhookConfig::from_env()?;
    validate_for_production(&api_config, &webhook_config)?;

    let db_config = DbConfig::from_env();
    let backends = Backends::from_config(&api_config, &db_config)?;
    let state = build_state(&webhook_config, backends);

    let app: Router = create_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(
        %addr,
        signature_header = %webhook_config.signature_header,
        delivery_offset = %webhook_config.delivery_offset,
        "Starting VOXORDER API server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
