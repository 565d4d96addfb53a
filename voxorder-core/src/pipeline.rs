//! Callback pipeline.
//!
//! verify → normalize → (resolve, extract) → commit. Holds only immutable
//! configuration and shared handles, so one instance serves every request.

use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::committer::{CommittedOrder, OrderCommitter};
use crate::error::{PipelineError, VoxResult};
use crate::extractor::extract_order;
use crate::payload::{normalize_payload, NormalizedPayload};
use crate::resolver::resolve_user;
use crate::signature::{SignatureCheck, WebhookVerifier};
use crate::store::{OrderStore, UserDirectory};

/// What happened to a callback that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Verified, but not an event type that carries an order.
    Ignored { event_type: String },
    /// An order was written.
    Committed(Box<CommittedCallback>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedCallback {
    pub conversation_id: Option<String>,
    pub user_id: String,
    pub order: CommittedOrder,
}

/// End-to-end processing of one callback body.
#[derive(Clone)]
pub struct CallbackPipeline {
    verifier: Arc<WebhookVerifier>,
    committer: OrderCommitter,
    clock: Arc<dyn Clock>,
    delivery_offset: FixedOffset,
}

impl CallbackPipeline {
    /// Pipeline on the system clock with UTC as the delivery zone.
    pub fn new(
        verifier: Arc<WebhookVerifier>,
        directory: Arc<dyn UserDirectory>,
        store: Arc<dyn OrderStore>,
    ) -> Self {
        Self {
            verifier,
            committer: OrderCommitter::new(directory, store),
            clock: Arc::new(SystemClock),
            delivery_offset: Utc.fix(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Zone whose calendar day spoken times are applied to.
    pub fn with_delivery_offset(mut self, offset: FixedOffset) -> Self {
        self.delivery_offset = offset;
        self
    }

    pub fn verifier(&self) -> &WebhookVerifier {
        &self.verifier
    }

    /// Run one callback. `body` must be the exact bytes received.
    pub async fn process(&self, body: &[u8], signature: Option<&str>) -> VoxResult<PipelineOutcome> {
        if let SignatureCheck::Invalid(reason) = self.verifier.verify(body, signature) {
            tracing::warn!(reason = %reason, "Rejected callback signature");
            return Err(PipelineError::Authentication(reason));
        }

        let envelope = match normalize_payload(body)? {
            NormalizedPayload::Ignored { event_type } => {
                tracing::info!(event_type = %event_type, "Ignoring callback event");
                return Ok(PipelineOutcome::Ignored { event_type });
            }
            NormalizedPayload::Actionable(envelope) => envelope,
        };

        let conversation_id = envelope.conversation_id().map(str::to_string);
        let span = tracing::info_span!(
            "callback",
            conversation_id = conversation_id.as_deref().unwrap_or(""),
            event_type = %envelope.event_type(),
        );

        async move {
            let user = resolve_user(&envelope);
            let now = self.clock.now().with_timezone(&self.delivery_offset);
            let extracted = extract_order(&envelope.user_utterances(), now);

            tracing::debug!(
                user_id = ?user.user_id,
                order_item = ?extracted.order_item,
                restaurant = ?extracted.restaurant,
                raw_time = ?extracted.raw_time_expression,
                "Extracted callback details"
            );

            let order = self
                .committer
                .commit(&user, extracted)
                .await
                .map_err(|source| PipelineError::Commit {
                    conversation_id: conversation_id.clone(),
                    source,
                })?;

            Ok(PipelineOutcome::Committed(Box::new(CommittedCallback {
                conversation_id,
                user_id: order.record.user_id.clone(),
                order,
            })))
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error::{CommitError, PayloadError, StoreError};
    use crate::memory::{InMemoryOrderStore, InMemoryUserDirectory};
    use crate::signature::SignatureRejection;
    use chrono::{TimeZone, Timelike};
    use secrecy::SecretString;
    use serde_json::json;

    fn pipeline(store: &InMemoryOrderStore) -> CallbackPipeline {
        let verifier = WebhookVerifier::new(SecretString::from("secret".to_string()));
        let now = Utc
            .with_ymd_and_hms(2026, 10, 16, 9, 15, 42)
            .single()
            .expect("valid test instant");
        CallbackPipeline::new(
            Arc::new(verifier),
            Arc::new(InMemoryUserDirectory::with_users(["user-1"])),
            Arc::new(store.clone()),
        )
        .with_clock(Arc::new(FixedClock::new(now)))
    }

    fn body(user_turn: &str) -> Vec<u8> {
        json!({
            "type": "post_call_transcription",
            "data": {
                "conversation_id": "conv_1",
                "transcript": [
                    {"role": "agent", "message": "What would you like?"},
                    {"role": "user", "message": user_turn}
                ],
                "conversation_initiation_client_data": {
                    "dynamic_variables": {"id": "user-1"}
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_commits_order() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryOrderStore::new();
        let pipeline = pipeline(&store);
        let body = body("Can I get a pizza from Dominos at noon");
        let signature = pipeline.verifier().sign(&body);

        let PipelineOutcome::Committed(committed) =
            pipeline.process(&body, signature.as_deref()).await?
        else {
            panic!("expected a committed order");
        };

        assert_eq!(committed.conversation_id.as_deref(), Some("conv_1"));
        assert_eq!(committed.user_id, "user-1");
        assert_eq!(committed.order.record.order_item, "a pizza");
        assert_eq!(committed.order.record.restaurant, "dominos");
        assert_eq!(committed.order.record.delivery_time.hour(), 12);
        assert_eq!(committed.order.record.delivery_time.minute(), 0);
        assert_eq!(committed.order.record.delivery_time.second(), 0);
        assert_eq!(store.len()?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_bad_signature_stops_before_parsing() -> Result<(), StoreError> {
        let store = InMemoryOrderStore::new();
        let result = pipeline(&store).process(b"not even json", Some("00")).await;
        assert_eq!(result, Err(PipelineError::Authentication(SignatureRejection::Mismatch)));
        assert!(store.is_empty()?);
        Ok(())
    }

    #[tokio::test]
    async fn test_payload_errors_surface() {
        let store = InMemoryOrderStore::new();
        let pipeline = pipeline(&store);
        let body = br#"{"data": {}}"#;
        let signature = pipeline.verifier().sign(body);
        let result = pipeline.process(body, signature.as_deref()).await;
        assert_eq!(result, Err(PipelineError::Payload(PayloadError::MissingEventType)));
    }

    #[tokio::test]
    async fn test_commit_errors_carry_conversation_id() {
        let store = InMemoryOrderStore::new();
        let pipeline = pipeline(&store);
        let body = body("hello there");
        let signature = pipeline.verifier().sign(&body);

        let Err(PipelineError::Commit {
            conversation_id,
            source,
        }) = pipeline.process(&body, signature.as_deref()).await
        else {
            panic!("expected a commit error");
        };
        assert_eq!(conversation_id.as_deref(), Some("conv_1"));
        assert!(matches!(source, CommitError::IncompleteOrder { .. }));
    }

    #[tokio::test]
    async fn test_delivery_offset_moves_today() -> Result<(), Box<dyn std::error::Error>> {
        let store = InMemoryOrderStore::new();
        let offset = FixedOffset::west_opt(5 * 3600).ok_or("bad offset")?;
        let pipeline = pipeline(&store).with_delivery_offset(offset);
        let body = body("i want a pizza from dominos at 7 pm");
        let signature = pipeline.verifier().sign(&body);

        let PipelineOutcome::Committed(committed) =
            pipeline.process(&body, signature.as_deref()).await?
        else {
            panic!("expected a committed order");
        };
        // 19:00 at -05:00 is midnight UTC the next day.
        let expected = Utc
            .with_ymd_and_hms(2026, 10, 17, 0, 0, 0)
            .single()
            .ok_or("bad instant")?;
        assert_eq!(committed.order.record.delivery_time, expected);
        Ok(())
    }
}
