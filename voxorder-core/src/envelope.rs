//! Canonical callback envelope.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only event type that carries an order.
pub const POST_CALL_TRANSCRIPTION: &str = "post_call_transcription";

/// Speaker attribution for a transcript turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TranscriptRole {
    User,
    Agent,
    /// Any other tag the provider sends, kept verbatim.
    Other(String),
    #[default]
    Unknown,
}

impl From<String> for TranscriptRole {
    fn from(role: String) -> Self {
        match role.as_str() {
            "user" => TranscriptRole::User,
            "agent" => TranscriptRole::Agent,
            "" => TranscriptRole::Unknown,
            _ => TranscriptRole::Other(role),
        }
    }
}

impl From<TranscriptRole> for String {
    fn from(role: TranscriptRole) -> Self {
        match role {
            TranscriptRole::User => "user".to_string(),
            TranscriptRole::Agent => "agent".to_string(),
            TranscriptRole::Other(tag) => tag,
            TranscriptRole::Unknown => String::new(),
        }
    }
}

/// One utterance in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    #[serde(default)]
    pub role: TranscriptRole,
    /// Tool-call turns arrive with a `null` message.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub message: String,
}

impl TranscriptTurn {
    pub fn new(role: TranscriptRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
        }
    }

    pub fn user(message: impl Into<String>) -> Self {
        Self::new(TranscriptRole::User, message)
    }

    pub fn agent(message: impl Into<String>) -> Self {
        Self::new(TranscriptRole::Agent, message)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A validated `post_call_transcription` callback.
///
/// Built once per request by [`crate::payload::normalize_payload`] and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEnvelope {
    event_type: String,
    conversation_id: Option<String>,
    agent_id: Option<String>,
    transcript: Vec<TranscriptTurn>,
    client_data: Map<String, Value>,
}

impl CallbackEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        conversation_id: Option<String>,
        agent_id: Option<String>,
        transcript: Vec<TranscriptTurn>,
        client_data: Map<String, Value>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            conversation_id,
            agent_id,
            transcript,
            client_data,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn transcript(&self) -> &[TranscriptTurn] {
        &self.transcript
    }

    /// The provider's `data` object, used for user-id probing.
    pub fn client_data(&self) -> &Map<String, Value> {
        &self.client_data
    }

    /// All user turns joined with single spaces, lower-cased.
    pub fn user_utterances(&self) -> String {
        self.transcript
            .iter()
            .filter(|turn| turn.role == TranscriptRole::User)
            .map(|turn| turn.message.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}
