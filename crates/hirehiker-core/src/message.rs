//! Chat turns between a candidate and the assistant

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(crate::Error::Parse(format!("Unknown message role: {}", s))),
        }
    }
}

/// A message in a session transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Message ID (assigned by the database, increasing per insert)
    pub id: i64,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new candidate message
    pub fn user(session_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(session_id: Uuid, content: impl Into<String>) -> Self {
        Self::new(session_id, MessageRole::Assistant, content)
    }

    fn new(session_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by database
            session_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_from_candidate(&self) -> bool {
        self.role == MessageRole::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_role_as_str() {
        assert_eq!(MessageRole::User.as_str(), "user");
        assert_eq!(MessageRole::Assistant.as_str(), "assistant");
    }

    #[test]
    fn test_message_role_from_str() {
        assert_eq!(MessageRole::from_str("user").unwrap(), MessageRole::User);
        assert_eq!(
            MessageRole::from_str("assistant").unwrap(),
            MessageRole::Assistant
        );
        assert!(MessageRole::from_str("system").is_err());
    }

    #[test]
    fn test_constructors() {
        let session_id = Uuid::new_v4();
        let question = Message::user(session_id, "Where is the total computed?");
        assert_eq!(question.id, 0);
        assert_eq!(question.session_id, session_id);
        assert!(question.is_from_candidate());

        let answer = Message::assistant(session_id, "In src/cart.js");
        assert_eq!(answer.role, MessageRole::Assistant);
        assert!(!answer.is_from_candidate());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
