//! VOXORDER API - Voice Callback Webhook Service
//!
//! Axum front end for [`voxorder_core`]: receives post-call callbacks, hands
//! the raw body to the [`CallbackPipeline`] and maps outcomes onto HTTP
//! responses. Persistence is PostgreSQL via `deadpool-postgres`, or an
//! in-process store for local development.

pub mod config;
pub mod error;
pub mod postgres;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::sync::Arc;

use voxorder_core::{
    CallbackPipeline, InMemoryOrderStore, InMemoryUserDirectory, OrderStore, UserDirectory,
    WebhookVerifier,
};

pub use config::{validate_for_production, ApiConfig, DbConfig, StoreBackend, WebhookConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use postgres::{PgOrderStore, PgUserDirectory};
pub use routes::create_router;
pub use state::AppState;

/// Directory and store handles for one process.
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn UserDirectory>,
    pub store: Arc<dyn OrderStore>,
}

impl Backends {
    /// Connect the configured backend. The Postgres pool is created lazily;
    /// no connection is opened here.
    pub fn from_config(api: &ApiConfig, db: &DbConfig) -> ApiResult<Self> {
        match api.store_backend {
            StoreBackend::Postgres => {
                let pool = db.create_pool()?;
                tracing::info!(host = %db.host, dbname = %db.dbname, max_size = db.max_size, "Using PostgreSQL backend");
                Ok(Self {
                    directory: Arc::new(PgUserDirectory::new(pool.clone())),
                    store: Arc::new(PgOrderStore::new(pool)),
                })
            }
            StoreBackend::Memory => {
                tracing::warn!(
                    seeded_users = api.dev_user_ids.len(),
                    "Using in-memory backend; orders are lost on restart"
                );
                Ok(Self {
                    directory: Arc::new(InMemoryUserDirectory::with_users(api.dev_user_ids.iter().cloned())),
                    store: Arc::new(InMemoryOrderStore::new()),
                })
            }
        }
    }
}

/// Assemble shared state from webhook settings and backends.
pub fn build_state(webhook: &WebhookConfig, backends: Backends) -> AppState {
    let verifier = Arc::new(WebhookVerifier::from_optional(webhook.secret.clone()));
    let pipeline = CallbackPipeline::new(verifier, backends.directory, backends.store.clone())
        .with_delivery_offset(webhook.delivery_offset);
    AppState::new(pipeline, webhook.signature_header.as_str(), backends.store)
}
