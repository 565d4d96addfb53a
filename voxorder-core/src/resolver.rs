//! User Resolver
//!
//! The provider's payload shape changed across integration iterations, so the
//! owning user's id can sit in any of several places. All historical shapes
//! stay supported at once; the locations below are tried in strict priority
//! order and the first non-empty value wins.

use serde_json::{Map, Value};

use crate::envelope::CallbackEnvelope;

/// A named path into the callback's `data` object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserIdLocation {
    /// Dotted location used in logs.
    pub location: &'static str,
    pub path: &'static [&'static str],
}

impl UserIdLocation {
    /// Walk the path and return a usable identifier, if one is there.
    ///
    /// Strings are trimmed and must be non-empty. Integers are accepted and
    /// rendered in decimal. Anything else counts as not found.
    pub fn lookup(&self, data: &Map<String, Value>) -> Option<String> {
        let (last, parents) = self.path.split_last()?;
        let mut node = data;
        for key in parents {
            node = node.get(*key)?.as_object()?;
        }
        match node.get(*last)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Lookup order, highest priority first.
pub const USER_ID_LOCATIONS: &[UserIdLocation] = &[
    UserIdLocation {
        location: "conversation_initiation_client_data.dynamic_variables.id",
        path: &["conversation_initiation_client_data", "dynamic_variables", "id"],
    },
    UserIdLocation {
        location: "conversation_initiation_client_data.dynamic_variables.user_id",
        path: &["conversation_initiation_client_data", "dynamic_variables", "user_id"],
    },
    UserIdLocation {
        location: "user_id",
        path: &["user_id"],
    },
    UserIdLocation {
        location: "conversation_initiation_client_data.user_id",
        path: &["conversation_initiation_client_data", "user_id"],
    },
    UserIdLocation {
        location: "client_data.user_id",
        path: &["client_data", "user_id"],
    },
];

/// The resolved owner of a callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    pub user_id: Option<String>,
    /// Which location matched.
    pub source: Option<&'static str>,
}

impl UserContext {
    pub fn resolved(user_id: impl Into<String>, source: &'static str) -> Self {
        Self {
            user_id: Some(user_id.into()),
            source: Some(source),
        }
    }

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Resolve the owning user from an envelope.
pub fn resolve_user(envelope: &CallbackEnvelope) -> UserContext {
    resolve_user_in(envelope.client_data())
}

/// Resolve the owning user from a raw `data` object.
pub fn resolve_user_in(data: &Map<String, Value>) -> UserContext {
    for candidate in USER_ID_LOCATIONS {
        if let Some(user_id) = candidate.lookup(data) {
            tracing::debug!(location = candidate.location, user_id = %user_id, "Resolved user id");
            return UserContext::resolved(user_id, candidate.location);
        }
    }

    let checked: Vec<String> = USER_ID_LOCATIONS
        .iter()
        .map(|candidate| {
            let state = if path_present(data, candidate.path) { "present-but-empty" } else { "absent" };
            format!("{}={}", candidate.location, state)
        })
        .collect();
    tracing::warn!(checked = ?checked, "Could not find user_id in callback payload");

    UserContext::absent()
}

fn path_present(data: &Map<String, Value>, path: &[&str]) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };
    let mut node = data;
    for key in parents {
        match node.get(*key).and_then(Value::as_object) {
            Some(next) => node = next,
            None => return false,
        }
    }
    node.get(*last).is_some_and(|v| !v.is_null())
}
