//! Fuzz test for callback payload normalization
//!
//! Feeds arbitrary bytes to the payload parser and user resolver to find
//! panics on hostile JSON.
//!
//! Run with: cargo +nightly fuzz run payload_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use voxorder_core::{normalize_payload, resolve_user, NormalizedPayload, POST_CALL_TRANSCRIPTION};

fuzz_target!(|data: &[u8]| {
    let Ok(normalized) = normalize_payload(data) else {
        return;
    };

    match normalized {
        NormalizedPayload::Ignored { event_type } => {
            assert_ne!(event_type, POST_CALL_TRANSCRIPTION, "transcription events are never ignored");
        }
        NormalizedPayload::Actionable(envelope) => {
            assert_eq!(envelope.event_type(), POST_CALL_TRANSCRIPTION);

            let user = resolve_user(&envelope);
            if let Some(id) = &user.user_id {
                assert!(!id.trim().is_empty(), "resolved ids are never blank");
                assert!(user.source.is_some());
            }

            // Joined utterances only carry user turns
            let _ = envelope.user_utterances();
        }
    }
});
