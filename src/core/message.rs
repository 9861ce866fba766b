use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::params::ModelParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl AsRef<str> for Role {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// One entry in a session transcript. Immutable once created: a message is
/// never edited, only appended after.
///
/// `model` and `parameters` record what produced the text and are set only on
/// assistant messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ModelParameters>,
}

impl ChatMessage {
    pub fn user(id: String, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ChatMessage {
            id,
            role: Role::User,
            content: content.into(),
            timestamp,
            model: None,
            parameters: None,
        }
    }

    pub fn assistant(
        id: String,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        model: impl Into<String>,
        parameters: ModelParameters,
    ) -> Self {
        ChatMessage {
            id,
            role: Role::Assistant,
            content: content.into(),
            timestamp,
            model: Some(model.into()),
            parameters: Some(parameters),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn user_messages_carry_no_model_metadata() {
        let msg = ChatMessage::user("1".into(), "hello", Utc::now());
        assert!(msg.is_user());
        assert!(msg.model.is_none());
        assert!(msg.parameters.is_none());

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("model").is_none());
    }

    #[test]
    fn assistant_messages_record_their_provenance() {
        let msg = ChatMessage::assistant(
            "2".into(),
            "hi",
            Utc::now(),
            "gemini-flash",
            ModelParameters::default(),
        );
        assert!(msg.is_assistant());
        assert_eq!(msg.model.as_deref(), Some("gemini-flash"));
        assert_eq!(msg.parameters, Some(ModelParameters::default()));
    }
}
