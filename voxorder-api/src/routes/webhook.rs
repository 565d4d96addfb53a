//! Voice provider callback endpoint.
//!
//! POST runs the full pipeline over the raw body; GET is a static status
//! check some provider dashboards ping when the webhook is configured.

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use voxorder_core::{CommittedCallback, ExtractedOrder, OrderRecord, PipelineOutcome};

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;
use crate::telemetry::metrics::with_metrics;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoredResponse {
    pub message: &'static str,
    pub event_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedResponse {
    pub success: bool,
    pub message: &'static str,
    pub conversation_id: Option<String>,
    pub user_id: String,
    /// Rows written, as the store returned them.
    pub data: Vec<OrderRecord>,
    pub order_details: ExtractedOrder,
}

impl From<CommittedCallback> for CommittedResponse {
    fn from(committed: CommittedCallback) -> Self {
        Self {
            success: true,
            message: "Order stored successfully",
            conversation_id: committed.conversation_id,
            user_id: committed.user_id,
            data: vec![committed.order.record],
            order_details: committed.order.details,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EndpointStatusResponse {
    pub message: &'static str,
    pub timestamp: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/webhooks/voice
async fn receive_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<impl IntoResponse> {
    let body = body.map_err(|rejection| {
        let err = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::from_code(ErrorCode::PayloadTooLarge)
        } else {
            ApiError::malformed_payload(rejection.body_text())
        };
        with_metrics(|m| m.record_callback(outcome_label(err.code)));
        err
    })?;

    let signature = headers
        .get(state.signature_header.as_ref())
        .and_then(|value| value.to_str().ok());

    tracing::debug!(bytes = body.len(), signed = signature.is_some(), "Received voice callback");

    match state.pipeline.process(&body, signature).await {
        Ok(PipelineOutcome::Ignored { event_type }) => {
            with_metrics(|m| m.record_callback("ignored"));
            Ok(Json(serde_json::to_value(IgnoredResponse {
                message: "Ignored non-transcription event",
                event_type,
            })
            .map_err(|e| ApiError::internal_error(format!("Failed to encode response: {}", e)))?))
        }
        Ok(PipelineOutcome::Committed(committed)) => {
            with_metrics(|m| m.record_callback("committed"));
            let response = CommittedResponse::from(*committed);
            tracing::info!(
                conversation_id = ?response.conversation_id,
                user_id = %response.user_id,
                "Order stored from voice callback"
            );
            Ok(Json(serde_json::to_value(response).map_err(|e| {
                ApiError::internal_error(format!("Failed to encode response: {}", e))
            })?))
        }
        Err(e) => {
            let err = ApiError::from(e);
            with_metrics(|m| m.record_callback(outcome_label(err.code)));
            if err.status_code().is_server_error() {
                tracing::error!(code = %err.code, error = %err.message, "Callback failed");
            } else {
                tracing::warn!(code = %err.code, error = %err.message, "Callback rejected");
            }
            Err(err)
        }
    }
}

/// GET /api/webhooks/voice
async fn endpoint_status() -> impl IntoResponse {
    Json(EndpointStatusResponse {
        message: "Voice webhook endpoint is active",
        timestamp: Utc::now().to_rfc3339(),
    })
}

fn outcome_label(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::AuthenticationFailure => "authentication_failure",
        ErrorCode::MalformedPayload => "malformed_payload",
        ErrorCode::MissingEventType => "missing_event_type",
        ErrorCode::MissingTranscript => "missing_transcript",
        ErrorCode::MissingUser => "missing_user",
        ErrorCode::InvalidUser => "invalid_user",
        ErrorCode::IncompleteOrder => "incomplete_order",
        ErrorCode::StoreWriteFailed => "store_write_failed",
        ErrorCode::DirectoryUnavailable => "directory_unavailable",
        ErrorCode::PayloadTooLarge => "payload_too_large",
        ErrorCode::InternalError => "internal_error",
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create webhook router, nested under `/api/webhooks`.
pub fn create_router() -> Router<AppState> {
    Router::new().route("/voice", post(receive_callback).get(endpoint_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels_are_snake_case() {
        for code in [
            ErrorCode::AuthenticationFailure,
            ErrorCode::IncompleteOrder,
            ErrorCode::StoreWriteFailed,
        ] {
            let label = outcome_label(code);
            assert!(label.chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn test_ignored_response_shape() -> Result<(), serde_json::Error> {
        let json = serde_json::to_value(IgnoredResponse {
            message: "Ignored non-transcription event",
            event_type: "call_started".to_string(),
        })?;
        assert_eq!(json["eventType"], "call_started");
        assert!(json.get("event_type").is_none());
        Ok(())
    }
}
