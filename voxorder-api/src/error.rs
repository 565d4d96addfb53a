//! Error Types for VOXORDER API
//!
//! This module defines error handling for the HTTP layer:
//! - ApiError struct for structured error responses
//! - ErrorCode enum mapping each failure category to a status
//! - IntoResponse implementation for Axum
//! - Conversion from the core `PipelineError`
//!
//! Error bodies are `{ "error": ..., "code": ..., "details": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use voxorder_core::{CommitError, PayloadError, PipelineError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Callback signature missing, malformed, wrong, or unverifiable
    AuthenticationFailure,

    // ========================================================================
    // Payload Errors (400)
    // ========================================================================
    /// Body is not a JSON object of the expected shape
    MalformedPayload,

    /// Body has no event type
    MissingEventType,

    /// Actionable event without a usable transcript
    MissingTranscript,

    // ========================================================================
    // Commit Errors (400)
    // ========================================================================
    /// No user id in any known payload location
    MissingUser,

    /// User id does not name an existing user
    InvalidUser,

    /// Item or restaurant could not be extracted
    IncompleteOrder,

    // ========================================================================
    // Server Errors (413, 500)
    // ========================================================================
    /// Order insert failed
    StoreWriteFailed,

    /// User lookup could not be performed
    DirectoryUnavailable,

    /// Request body exceeded the configured limit
    PayloadTooLarge,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::AuthenticationFailure => StatusCode::UNAUTHORIZED,

            ErrorCode::MalformedPayload
            | ErrorCode::MissingEventType
            | ErrorCode::MissingTranscript
            | ErrorCode::MissingUser
            | ErrorCode::InvalidUser
            | ErrorCode::IncompleteOrder => StatusCode::BAD_REQUEST,

            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,


            ErrorCode::StoreWriteFailed
            | ErrorCode::DirectoryUnavailable
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::AuthenticationFailure => "Invalid webhook signature",
            ErrorCode::MalformedPayload => "Malformed webhook payload",
            ErrorCode::MissingEventType => "Webhook payload has no event type",
            ErrorCode::MissingTranscript => "Webhook payload has no transcript",
            ErrorCode::MissingUser => "Could not extract user_id from webhook payload",
            ErrorCode::InvalidUser => "Invalid user_id",
            ErrorCode::IncompleteOrder => "Could not extract complete order details",
            ErrorCode::StoreWriteFailed => "Failed to store order",
            ErrorCode::DirectoryUnavailable => "User lookup failed",
            ErrorCode::PayloadTooLarge => "Webhook payload too large",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable error message
    #[serde(rename = "error")]
    pub message: String,

    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Optional structured detail (missing field, extracted values, conversation id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create an AuthenticationFailure error. The reason is never sent to
    /// the caller.
    pub fn authentication_failure() -> Self {
        Self::from_code(ErrorCode::AuthenticationFailure)
    }

    /// Create a MalformedPayload error.
    pub fn malformed_payload(reason: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::MalformedPayload).with_details(json!({ "reason": reason.into() }))
    }

    /// Create an InternalError.
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM CORE ERRORS
// ============================================================================

impl From<PayloadError> for ApiError {
    fn from(err: PayloadError) -> Self {
        match err {
            PayloadError::Malformed { reason } => ApiError::malformed_payload(reason),
            PayloadError::MissingEventType => {
                ApiError::from_code(ErrorCode::MissingEventType).with_details(json!({ "field": "type" }))
            }
            PayloadError::MissingTranscript => ApiError::from_code(ErrorCode::MissingTranscript)
                .with_details(json!({ "field": "data.transcript" })),
        }
    }
}

fn from_commit_error(err: CommitError, conversation_id: Option<String>) -> ApiError {
    match err {
        CommitError::MissingUser => ApiError::from_code(ErrorCode::MissingUser).with_details(json!({
            "conversationId": conversation_id,
        })),
        CommitError::InvalidUser { user_id } => ApiError::from_code(ErrorCode::InvalidUser).with_details(json!({
            "conversationId": conversation_id,
            "userId": user_id,
        })),
        CommitError::IncompleteOrder { extracted } => {
            ApiError::from_code(ErrorCode::IncompleteOrder).with_details(json!({
                "conversationId": conversation_id,
                "missing": extracted.missing_fields(),
                "extracted": {
                    "orderItem": extracted.order_item,
                    "restaurant": extracted.restaurant,
                    "rawTimeExpression": extracted.raw_time_expression,
                },
            }))
        }
        CommitError::DirectoryUnavailable(e) => {
            tracing::error!(error = %e, "User directory failure");
            ApiError::from_code(ErrorCode::DirectoryUnavailable).with_details(json!({
                "conversationId": conversation_id,
            }))
        }
        CommitError::StoreWriteFailed(e) => {
            ApiError::from_code(ErrorCode::StoreWriteFailed).with_details(json!({
                "conversationId": conversation_id,
                "reason": e.to_string(),
            }))
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Authentication(_) => ApiError::authentication_failure(),
            PipelineError::Payload(e) => e.into(),
            PipelineError::Commit {
                conversation_id,
                source,
            } => from_commit_error(source, conversation_id),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use voxorder_core::{ExtractedOrder, SignatureRejection, StoreError};

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::AuthenticationFailure.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::MalformedPayload.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InvalidUser.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::IncompleteOrder.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::StoreWriteFailed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::DirectoryUnavailable.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ErrorCode::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_missing_fields_are_named() {
        let err: ApiError = PayloadError::MissingEventType.into();
        assert_eq!(err.details, Some(json!({ "field": "type" })));

        let err: ApiError = PipelineError::Payload(PayloadError::MissingTranscript).into();
        assert_eq!(err.code, ErrorCode::MissingTranscript);
        assert_eq!(err.details, Some(json!({ "field": "data.transcript" })));
    }

    #[test]
    fn test_authentication_hides_reason() {
        let err: ApiError = PipelineError::Authentication(SignatureRejection::SecretNotConfigured).into();
        assert_eq!(err.code, ErrorCode::AuthenticationFailure);
        assert_eq!(err.details, None);
        assert!(!err.message.contains("configured"));
    }

    #[test]
    fn test_incomplete_order_details() {
        let err: ApiError = PipelineError::Commit {
            conversation_id: Some("conv_1".to_string()),
            source: CommitError::IncompleteOrder {
                extracted: Box::new(ExtractedOrder {
                    order_item: Some("a pizza".to_string()),
                    restaurant: None,
                    delivery_time: Utc::now(),
                    raw_time_expression: None,
                }),
            },
        }
        .into();

        let details = err.details.clone().unwrap_or_default();
        assert_eq!(err.code, ErrorCode::IncompleteOrder);
        assert_eq!(details["conversationId"], "conv_1");
        assert_eq!(details["missing"], json!(["restaurant"]));
        assert_eq!(details["extracted"]["orderItem"], "a pizza");
    }

    #[test]
    fn test_store_failure_carries_detail() {
        let err: ApiError = PipelineError::Commit {
            conversation_id: None,
            source: CommitError::StoreWriteFailed(StoreError::WriteFailed {
                reason: "null value in column".to_string(),
            }),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let reason = err
            .details
            .as_ref()
            .and_then(|d| d["reason"].as_str())
            .unwrap_or_default();
        assert!(reason.contains("null value"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::from_code(ErrorCode::MissingUser);
        let json = serde_json::to_value(&err)?;

        assert_eq!(json["error"], "Could not extract user_id from webhook payload");
        assert_eq!(json["code"], "MISSING_USER");
        assert!(json.get("details").is_none());

        let deserialized: ApiError = serde_json::from_value(json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::internal_error("Connection failed");
        let display = format!("{}", err);
        assert!(display.contains("InternalError"));
        assert!(display.contains("Connection failed"));
    }
}
