use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::message::ChatMessage;
use crate::core::params::ModelParameters;

pub const NEW_SESSION_TITLE: &str = "New Chat";

/// One conversation: an append-only message sequence plus the model and
/// parameter snapshot it was started with.
///
/// Sessions are owned exclusively by the session manager; everything else
/// treats a session reference as a read-only snapshot and re-fetches after
/// mutating calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub parameters: ModelParameters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(
        id: String,
        model: impl Into<String>,
        parameters: ModelParameters,
        now: DateTime<Utc>,
    ) -> Self {
        ChatSession {
            id,
            title: NEW_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            model: model.into(),
            parameters,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Content of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
    }
}

/// Issues unique, strictly increasing id strings.
///
/// Ids are UTC millisecond timestamps rendered as decimal strings; when two
/// ids are requested within the same millisecond the counter advances past
/// the clock so ordering by id matches ordering by creation.
#[derive(Debug, Default)]
pub struct IdSource {
    last: i64,
}

impl IdSource {
    pub fn new() -> Self {
        IdSource::default()
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis().max(self.last + 1);
        self.last = millis;
        millis.to_string()
    }
}
