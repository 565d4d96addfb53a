//! Error types for VOXORDER operations

use thiserror::Error;

use crate::extractor::ExtractedOrder;
use crate::signature::SignatureRejection;

/// Structural problems with an inbound callback body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Malformed payload: {reason}")]
    Malformed { reason: String },

    #[error("Payload has no event type")]
    MissingEventType,

    #[error("Payload has no transcript")]
    MissingTranscript,
}

/// Order Store failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Order insert failed: {reason}")]
    WriteFailed { reason: String },

    #[error("Order store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// User Directory failures. A missing user is not an error here; lookups
/// return `Ok(None)` for that.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("User lookup failed: {reason}")]
    LookupFailed { reason: String },
}

/// Reasons the committer refuses or fails to persist an order.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CommitError {
    #[error("Could not extract user_id from webhook payload")]
    MissingUser,

    #[error("Invalid user_id: {user_id}")]
    InvalidUser { user_id: String },

    #[error("Could not extract complete order details")]
    IncompleteOrder { extracted: Box<ExtractedOrder> },

    #[error("User directory unavailable: {0}")]
    DirectoryUnavailable(#[from] DirectoryError),

    #[error("Failed to store order: {0}")]
    StoreWriteFailed(#[from] StoreError),
}

/// Master error type for a single callback run.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("Callback authentication failed: {0}")]
    Authentication(SignatureRejection),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Commit error: {source}")]
    Commit {
        conversation_id: Option<String>,
        #[source]
        source: CommitError,
    },
}

/// Result type alias for callback processing.
pub type VoxResult<T> = Result<T, PipelineError>;

// =============================================================================
// TESTS
// =============================================================================
