//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use voxorder_core::{CallbackPipeline, OrderStore};

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Verify → normalize → extract → commit.
    pub pipeline: CallbackPipeline,
    /// Lowercase name of the header carrying the callback signature.
    pub signature_header: Arc<str>,
    /// Store handle used by the readiness check.
    pub store: Arc<dyn OrderStore>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        pipeline: CallbackPipeline,
        signature_header: impl Into<Arc<str>>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            pipeline,
            signature_header: signature_header.into(),
            store,
            start_time: Instant::now(),
        }
    }
}
