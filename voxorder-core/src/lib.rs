//! VOXORDER Core - Callback Verification and Order Extraction
//!
//! Turns a voice-conversation provider's post-call callback into a durable
//! food order. The stages run leaf-first:
//!
//! 1. [`signature`] - HMAC-SHA256 check over the raw body
//! 2. [`payload`] - JSON parsing into a [`CallbackEnvelope`]
//! 3. [`resolver`] - owning user lookup across historical payload shapes
//! 4. [`extractor`] - order item, restaurant and delivery time from the transcript
//! 5. [`committer`] - user validation and the single order insert
//!
//! [`pipeline::CallbackPipeline`] wires them together. Persistence is reached
//! only through the [`UserDirectory`] and [`OrderStore`] traits.

pub mod clock;
pub mod committer;
pub mod envelope;
pub mod error;
pub mod extractor;
pub mod memory;
pub mod payload;
pub mod pipeline;
pub mod resolver;
pub mod signature;
pub mod store;

use chrono::{DateTime, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, FixedClock, SystemClock};
pub use committer::{CommittedOrder, OrderCommitter};
pub use envelope::{CallbackEnvelope, TranscriptRole, TranscriptTurn, POST_CALL_TRANSCRIPTION};
pub use error::{
    CommitError, DirectoryError, PayloadError, PipelineError, StoreError, VoxResult,
};
pub use extractor::{
    extract_order, extract_order_fields, extract_time_expression, normalize_delivery_time,
    order_patterns, time_patterns, ExtractedOrder, OrderFields, OrderPattern, OrderPatternKind,
    TimePattern, TimePatternKind,
};
pub use memory::{InMemoryOrderStore, InMemoryUserDirectory};
pub use payload::{normalize_payload, NormalizedPayload};
pub use pipeline::{CallbackPipeline, CommittedCallback, PipelineOutcome};
pub use resolver::{resolve_user, resolve_user_in, UserContext, UserIdLocation, USER_ID_LOCATIONS};
pub use signature::{SignatureCheck, SignatureRejection, WebhookVerifier};
pub use store::{NewOrder, OrderRecord, OrderStore, UserDirectory, UserRecord};
