//! VOXORDER Test Utilities
//!
//! Shared test infrastructure for the VOXORDER workspace:
//! - Mock directories and stores with failure injection
//! - Callback payload builder and signing helpers
//! - Proptest generators for transcripts and user ids
//! - Custom assertions for pipeline outcomes

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

// Re-export core types for convenience
pub use voxorder_core::{
    CallbackPipeline, CommitError, CommittedCallback, DirectoryError, ExtractedOrder, FixedClock,
    InMemoryOrderStore, InMemoryUserDirectory, NewOrder, OrderRecord, OrderStore, PayloadError,
    PipelineError, PipelineOutcome, StoreError, Timestamp, UserDirectory, UserRecord, VoxResult,
    WebhookVerifier, POST_CALL_TRANSCRIPTION,
};

/// Secret shared by fixtures and the payload builder.
pub const TEST_SECRET: &str = "whsec_test_secret";

/// User id the default fixtures seed and reference.
pub const TEST_USER_ID: &str = "3f2c9a4e-0d1b-4c7a-9e8f-1a2b3c4d5e6f";

// ============================================================================
// MOCK BACKENDS
// ============================================================================

/// Order store that records inserts in memory and counts attempts.
#[derive(Debug, Clone, Default)]
pub struct RecordingOrderStore {
    inner: InMemoryOrderStore,
    attempts: Arc<AtomicUsize>,
}

impl RecordingOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert calls seen, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Result<Vec<OrderRecord>, StoreError> {
        self.inner.records()
    }
}

#[async_trait]
impl OrderStore for RecordingOrderStore {
    async fn insert(&self, order: NewOrder) -> Result<OrderRecord, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(order).await
    }
}

/// Order store whose every write and health check fails.
#[derive(Debug, Clone)]
pub struct FailingOrderStore {
    reason: String,
    attempts: Arc<AtomicUsize>,
}

impl FailingOrderStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn insert(&self, _order: NewOrder) -> Result<OrderRecord, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::WriteFailed {
            reason: self.reason.clone(),
        })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Err(StoreError::Unavailable {
            reason: self.reason.clone(),
        })
    }
}

/// Directory over a fixed id set that counts lookups.
#[derive(Debug, Clone)]
pub struct CountingUserDirectory {
    inner: InMemoryUserDirectory,
    lookups: Arc<AtomicUsize>,
}

impl CountingUserDirectory {
    pub fn with_users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: InMemoryUserDirectory::with_users(ids),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserDirectory for CountingUserDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_id(user_id).await
    }
}

/// Directory that cannot be reached.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableUserDirectory;

#[async_trait]
impl UserDirectory for UnavailableUserDirectory {
    async fn find_by_id(&self, _user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        Err(DirectoryError::LookupFailed {
            reason: "connection refused".to_string(),
        })
    }
}

// ============================================================================
// PAYLOAD BUILDER
// ============================================================================

/// Where the builder places the user id inside `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIdPlacement {
    DynamicVariablesId,
    DynamicVariablesUserId,
    TopLevel,
    InitiationClientData,
    ClientData,
}

/// Builds callback bodies in the provider's wire shape.
#[derive(Debug, Clone)]
pub struct CallbackPayloadBuilder {
    event_type: Option<String>,
    conversation_id: Option<String>,
    transcript: Option<Vec<(String, String)>>,
    user: Option<(UserIdPlacement, Value)>,
}

impl Default for CallbackPayloadBuilder {
    fn default() -> Self {
        Self {
            event_type: Some(POST_CALL_TRANSCRIPTION.to_string()),
            conversation_id: Some("conv_test".to_string()),
            transcript: Some(Vec::new()),
            user: Some((UserIdPlacement::DynamicVariablesId, Value::from(TEST_USER_ID))),
        }
    }
}

impl CallbackPayloadBuilder {
    /// A transcription callback for [`TEST_USER_ID`] with an empty transcript.
    pub fn transcription() -> Self {
        Self::default()
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn without_event_type(mut self) -> Self {
        self.event_type = None;
        self
    }

    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn agent_says(self, message: impl Into<String>) -> Self {
        self.turn("agent", message)
    }

    pub fn user_says(self, message: impl Into<String>) -> Self {
        self.turn("user", message)
    }

    fn turn(mut self, role: &str, message: impl Into<String>) -> Self {
        self.transcript
            .get_or_insert_with(Vec::new)
            .push((role.to_string(), message.into()));
        self
    }

    pub fn without_transcript(mut self) -> Self {
        self.transcript = None;
        self
    }

    pub fn user_id(mut self, id: impl Into<String>) -> Self {
        let placement = self
            .user
            .as_ref()
            .map(|(placement, _)| *placement)
            .unwrap_or(UserIdPlacement::DynamicVariablesId);
        self.user = Some((placement, Value::from(id.into())));
        self
    }

    pub fn user_id_at(mut self, placement: UserIdPlacement, id: impl Into<String>) -> Self {
        self.user = Some((placement, Value::from(id.into())));
        self
    }

    pub fn without_user(mut self) -> Self {
        self.user = None;
        self
    }

    pub fn build(&self) -> Value {
        let mut data = Map::new();
        if let Some(id) = &self.conversation_id {
            data.insert("conversation_id".to_string(), Value::from(id.as_str()));
        }
        if let Some(turns) = &self.transcript {
            let turns: Vec<Value> = turns
                .iter()
                .map(|(role, message)| json!({"role": role, "message": message}))
                .collect();
            data.insert("transcript".to_string(), Value::Array(turns));
        }
        if let Some((placement, id)) = &self.user {
            place_user_id(&mut data, *placement, id.clone());
        }

        let mut root = Map::new();
        if let Some(event_type) = &self.event_type {
            root.insert("type".to_string(), Value::from(event_type.as_str()));
        }
        root.insert("data".to_string(), Value::Object(data));
        Value::Object(root)
    }

    /// Serialized body bytes.
    pub fn body(&self) -> Vec<u8> {
        self.build().to_string().into_bytes()
    }
}

fn place_user_id(data: &mut Map<String, Value>, placement: UserIdPlacement, id: Value) {
    let (path, key): (&[&str], &str) = match placement {
        UserIdPlacement::DynamicVariablesId => {
            (&["conversation_initiation_client_data", "dynamic_variables"], "id")
        }
        UserIdPlacement::DynamicVariablesUserId => {
            (&["conversation_initiation_client_data", "dynamic_variables"], "user_id")
        }
        UserIdPlacement::TopLevel => (&[], "user_id"),
        UserIdPlacement::InitiationClientData => {
            (&["conversation_initiation_client_data"], "user_id")
        }
        UserIdPlacement::ClientData => (&["client_data"], "user_id"),
    };

    let mut node = data;
    for segment in path {
        let entry = node
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(next) = entry else {
            return;
        };
        node = next;
    }
    node.insert(key.to_string(), id);
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_body(secret: &str, body: &[u8]) -> String {
    test_verifier_with(secret).sign(body).unwrap_or_default()
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built instances for common scenarios.

    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;

    /// 2026-10-16 09:00:00 UTC.
    pub fn test_instant() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    pub fn test_verifier() -> WebhookVerifier {
        super::test_verifier_with(TEST_SECRET)
    }

    /// Pipeline over the given backends, on [`test_instant`] with [`TEST_SECRET`].
    pub fn test_pipeline(
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn OrderStore>,
    ) -> CallbackPipeline {
        CallbackPipeline::new(Arc::new(test_verifier()), directory, store)
            .with_clock(Arc::new(FixedClock::new(test_instant())))
    }

    /// Directory knowing only [`TEST_USER_ID`].
    pub fn known_users() -> InMemoryUserDirectory {
        InMemoryUserDirectory::with_users([TEST_USER_ID])
    }
}

fn test_verifier_with(secret: &str) -> WebhookVerifier {
    WebhookVerifier::new(secrecy::SecretString::from(secret.to_string()))
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for callback content.

    use proptest::prelude::*;

    use super::UserIdPlacement;

    /// Plausible user ids: UUID-shaped or short slugs.
    pub fn arb_user_id() -> impl Strategy<Value = String> {
        prop_oneof![
            "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
            "user-[a-z0-9]{1,12}",
        ]
    }

    /// Any id location the resolver understands.
    pub fn arb_user_id_placement() -> impl Strategy<Value = UserIdPlacement> {
        prop_oneof![
            Just(UserIdPlacement::DynamicVariablesId),
            Just(UserIdPlacement::DynamicVariablesUserId),
            Just(UserIdPlacement::TopLevel),
            Just(UserIdPlacement::InitiationClientData),
            Just(UserIdPlacement::ClientData),
        ]
    }

    /// Event types other than the transcription event.
    pub fn arb_ignored_event_type() -> impl Strategy<Value = String> {
        "[a-z_]{1,24}".prop_filter("not the transcription event", |s| {
            s != super::POST_CALL_TRANSCRIPTION
        })
    }

    /// Lowercase words with no pattern keywords.
    pub fn arb_plain_word() -> impl Strategy<Value = String> {
        "[b-df-hj-np-tv-z]{3,8}"
    }

    /// Free-form utterance text, including punctuation and unicode.
    pub fn arb_utterance() -> impl Strategy<Value = String> {
        prop_oneof![
            "\\PC{0,120}",
            prop::collection::vec(arb_plain_word(), 0..12).prop_map(|words| words.join(" ")),
        ]
    }

    /// Spoken times with an explicit meridiem and their 24-hour hour.
    pub fn arb_spoken_time() -> impl Strategy<Value = (String, u32)> {
        (1u32..=12, prop::option::of(0u32..60), prop::bool::ANY).prop_map(|(hour, minute, pm)| {
            let meridiem = if pm { "pm" } else { "am" };
            let spoken = match minute {
                Some(m) => format!("{}:{:02} {}", hour, m, meridiem),
                None => format!("{} {}", hour, meridiem),
            };
            let hour24 = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
            (spoken, hour24)
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on pipeline results.

    use super::*;

    /// Assert that the callback committed and return it.
    #[track_caller]
    pub fn assert_committed(result: VoxResult<PipelineOutcome>) -> CommittedCallback {
        match result {
            Ok(PipelineOutcome::Committed(committed)) => *committed,
            other => panic!("Expected a committed order, got: {:?}", other),
        }
    }

    /// Assert that the callback was ignored with the given event type.
    #[track_caller]
    pub fn assert_ignored(result: &VoxResult<PipelineOutcome>, expected: &str) {
        match result {
            Ok(PipelineOutcome::Ignored { event_type }) => assert_eq!(event_type, expected),
            other => panic!("Expected Ignored({}), got: {:?}", expected, other),
        }
    }

    /// Assert that the commit stage rejected the callback and return why.
    #[track_caller]
    pub fn assert_commit_error(result: VoxResult<PipelineOutcome>) -> CommitError {
        match result {
            Err(PipelineError::Commit { source, .. }) => source,
            other => panic!("Expected a commit error, got: {:?}", other),
        }
    }

    /// Assert that the callback failed authentication.
    #[track_caller]
    pub fn assert_rejected_signature(result: &VoxResult<PipelineOutcome>) {
        match result {
            Err(PipelineError::Authentication(_)) => {}
            other => panic!("Expected an authentication failure, got: {:?}", other),
        }
    }
}
