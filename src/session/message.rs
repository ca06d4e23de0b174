//! Conversation message types
//!
//! A message is an immutable `(id, role, content)` record. Conversation
//! order is insertion order; the id only exists so the store can refuse a
//! second copy of the same message.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the client
    User,
    /// The assistant, remote or synthetic
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single conversation entry
///
/// # Examples
///
/// ```
/// use milo::session::{Message, Role};
///
/// let msg = Message::user("What does baggage cover?");
/// assert_eq!(msg.role, Role::User);
/// assert_eq!(msg.id.len(), 26);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier (ULID, or a deterministic key for
    /// messages that must never be duplicated)
    pub id: String,
    /// Author of the message
    pub role: Role,
    /// Message text
    pub content: String,
}

impl Message {
    /// Creates a message with a fresh id
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
        }
    }

    /// Creates a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Creates an assistant message with a caller-chosen id
    ///
    /// Used for messages whose identity is derived from an external event,
    /// such as a payment confirmation.
    pub fn assistant_with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Whether the message carries any visible text
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Generate a new ULID for a message
pub fn new_message_id() -> String {
    Ulid::new().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn test_unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }

    #[test]
    fn test_message_ids_are_unique() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_ne!(a.id, b.id);
        assert_ne!(a, b);
    }

    #[test]
    fn test_assistant_with_id_keeps_id() {
        let msg = Message::assistant_with_id("payment-cs_123", "Paid");
        assert_eq!(msg.id, "payment-cs_123");
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_is_blank() {
        assert!(Message::user("   \n").is_blank());
        assert!(!Message::user(" ok ").is_blank());
    }
}
