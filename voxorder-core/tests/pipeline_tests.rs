//! Callback pipeline behaviour across whole requests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use voxorder_core::*;

/// Directory that counts lookups.
#[derive(Default)]
struct CountingDirectory {
    lookups: AtomicUsize,
}

#[async_trait]
impl UserDirectory for CountingDirectory {
    async fn find_by_id(&self, user_id: &str) -> Result<Option<UserRecord>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok((user_id == "user-1").then(|| UserRecord {
            id: user_id.to_string(),
        }))
    }
}

struct Harness {
    pipeline: CallbackPipeline,
    directory: Arc<CountingDirectory>,
    store: InMemoryOrderStore,
}

fn harness() -> Harness {
    let directory = Arc::new(CountingDirectory::default());
    let store = InMemoryOrderStore::new();
    let now = Utc
        .with_ymd_and_hms(2026, 10, 16, 9, 0, 0)
        .single()
        .expect("valid test instant");
    let pipeline = CallbackPipeline::new(
        Arc::new(WebhookVerifier::new(SecretString::from("whsec_pipeline".to_string()))),
        directory.clone(),
        Arc::new(store.clone()),
    )
    .with_clock(Arc::new(FixedClock::new(now)));
    Harness {
        pipeline,
        directory,
        store,
    }
}

fn transcription(user_turn: &str) -> Value {
    json!({
        "type": "post_call_transcription",
        "data": {
            "conversation_id": "conv_7",
            "agent_id": "agent_1",
            "transcript": [
                {"role": "agent", "message": "Hi, what can I get you?"},
                {"role": "user", "message": user_turn}
            ],
            "user_id": "user-1"
        }
    })
}

async fn send(h: &Harness, payload: &Value) -> VoxResult<PipelineOutcome> {
    let body = payload.to_string().into_bytes();
    let signature = h.pipeline.verifier().sign(&body);
    h.pipeline.process(&body, signature.as_deref()).await
}

#[tokio::test]
async fn ignored_event_skips_lookup_and_write() -> Result<(), Box<dyn std::error::Error>> {
    let h = harness();
    let outcome = send(&h, &json!({"type": "conversation_started", "data": {"user_id": "user-1"}})).await?;

    assert_eq!(
        outcome,
        PipelineOutcome::Ignored {
            event_type: "conversation_started".to_string()
        }
    );
    assert_eq!(h.directory.lookups.load(Ordering::SeqCst), 0);
    assert!(h.store.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn identical_callbacks_write_twice() -> Result<(), Box<dyn std::error::Error>> {
    let h = harness();
    let payload = transcription("I want a cheeseburger from McDonalds at 7 pm");

    send(&h, &payload).await?;
    send(&h, &payload).await?;

    let records = h.store.records()?;
    assert_eq!(records.len(), 2);
    assert_ne!(records[0].id, records[1].id);
    assert_eq!(records[0].order_item, records[1].order_item);
    Ok(())
}

#[tokio::test]
async fn unmatched_transcript_is_incomplete_without_write() -> Result<(), StoreError> {
    let h = harness();
    let result = send(&h, &transcription("Just checking your opening hours")).await;

    let Err(PipelineError::Commit { source, .. }) = result else {
        panic!("expected a commit error, got {:?}", result);
    };
    let CommitError::IncompleteOrder { extracted } = source else {
        panic!("expected an incomplete order, got {:?}", source);
    };
    assert_eq!(extracted.order_item, None);
    assert_eq!(extracted.restaurant, None);
    assert!(h.store.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn unresolvable_user_is_missing_user() {
    let h = harness();
    let mut payload = transcription("I want a pizza from Dominos");
    if let Some(data) = payload["data"].as_object_mut() {
        data.remove("user_id");
    }

    let result = send(&h, &payload).await;
    assert!(matches!(
        result,
        Err(PipelineError::Commit {
            source: CommitError::MissingUser,
            ..
        })
    ));
    assert_eq!(h.directory.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn agent_turns_are_not_extracted() -> Result<(), StoreError> {
    let h = harness();
    let payload = json!({
        "type": "post_call_transcription",
        "data": {
            "conversation_id": "conv_8",
            "transcript": [
                {"role": "agent", "message": "Would you like a pizza from Dominos?"},
                {"role": "user", "message": "yes please"}
            ],
            "user_id": "user-1"
        }
    });

    let result = send(&h, &payload).await;
    assert!(matches!(
        result,
        Err(PipelineError::Commit {
            source: CommitError::IncompleteOrder { .. },
            ..
        })
    ));
    assert!(h.store.is_empty()?);
    Ok(())
}

#[tokio::test]
async fn unsigned_callback_is_rejected() -> Result<(), StoreError> {
    let h = harness();
    let body = transcription("I want a pizza from Dominos").to_string().into_bytes();
    let result = h.pipeline.process(&body, None).await;

    assert_eq!(
        result,
        Err(PipelineError::Authentication(SignatureRejection::MissingSignature))
    );
    assert_eq!(h.directory.lookups.load(Ordering::SeqCst), 0);
    assert!(h.store.is_empty()?);
    Ok(())
}
