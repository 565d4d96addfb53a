//! Payload Normalizer
//!
//! Parses a verified callback body into a [`CallbackEnvelope`], rejecting
//! structurally invalid bodies and setting aside event types that carry no
//! order (call started/ended and the like).

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::envelope::{CallbackEnvelope, TranscriptTurn, POST_CALL_TRANSCRIPTION};
use crate::error::PayloadError;

/// Result of normalizing a well-formed body.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedPayload {
    /// A `post_call_transcription` event ready for extraction.
    Actionable(CallbackEnvelope),
    /// Any other event type. Expected and frequent, not an error.
    Ignored { event_type: String },
}

/// Parse the raw callback body.
pub fn normalize_payload(body: &[u8]) -> Result<NormalizedPayload, PayloadError> {
    let document: Value = serde_json::from_slice(body).map_err(|e| PayloadError::Malformed {
        reason: format!("Invalid JSON: {}", e),
    })?;

    let Value::Object(mut root) = document else {
        return Err(PayloadError::Malformed {
            reason: "payload must be a JSON object".to_string(),
        });
    };

    let event_type = match root.get("type") {
        None | Some(Value::Null) => return Err(PayloadError::MissingEventType),
        Some(Value::String(t)) => t.clone(),
        Some(other) => {
            return Err(PayloadError::Malformed {
                reason: format!("event type must be a string, got {}", json_kind(other)),
            })
        }
    };

    if event_type != POST_CALL_TRANSCRIPTION {
        return Ok(NormalizedPayload::Ignored { event_type });
    }

    let data = match root.remove("data") {
        Some(Value::Object(data)) => data,
        _ => return Err(PayloadError::MissingTranscript),
    };

    let transcript = parse_transcript(&data)?;

    Ok(NormalizedPayload::Actionable(CallbackEnvelope::new(
        event_type,
        string_field(&data, "conversation_id"),
        string_field(&data, "agent_id"),
        transcript,
        data,
    )))
}

fn parse_transcript(data: &Map<String, Value>) -> Result<Vec<TranscriptTurn>, PayloadError> {
    let turns = match data.get("transcript") {
        Some(Value::Array(turns)) if !turns.is_empty() => turns,
        _ => return Err(PayloadError::MissingTranscript),
    };

    turns
        .iter()
        .enumerate()
        .map(|(index, turn)| {
            TranscriptTurn::deserialize(turn).map_err(|e| PayloadError::Malformed {
                reason: format!("transcript[{}]: {}", index, e),
            })
        })
        .collect()
}

fn string_field(data: &Map<String, Value>, key: &str) -> Option<String> {
    data.get(key).and_then(Value::as_str).map(str::to_string)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
