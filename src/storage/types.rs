use crate::error::MiloError;
use crate::session::{new_message_id, Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current layout version of a persisted session snapshot
pub const SCHEMA_VERSION: u32 = 1;

/// Metadata for a stored session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    /// Session identifier
    pub id: String,
    /// When the snapshot was last written (None for migrated legacy data)
    pub saved_at: Option<DateTime<Utc>>,
    /// Number of messages in the session
    pub message_count: usize,
}

/// Full-snapshot record written under a session key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Layout version, see [`SCHEMA_VERSION`]
    pub schema_version: u32,
    /// Time of the write
    pub saved_at: DateTime<Utc>,
    /// The conversation, in order
    pub messages: Vec<Message>,
}

impl SessionSnapshot {
    /// Snapshot the given messages at the current schema version
    pub fn new(messages: &[Message]) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        }
    }
}

/// Record of a payment event that has already been reflected in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumedPayment {
    /// Payment event key taken from the return address
    pub event_key: String,
    /// When the confirmation was appended (RFC-3339)
    pub consumed_at: String,
}

/// Unversioned message layout: a bare `{role, content}` pair
#[derive(Debug, Deserialize)]
struct LegacyMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Legacy(Vec<LegacyMessage>),
    Versioned(VersionHeader),
}

#[derive(Debug, Deserialize)]
struct VersionHeader {
    schema_version: u32,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
    messages: serde_json::Value,
}

/// A decoded snapshot: (time of the write, messages).
pub type DecodedSnapshot = (Option<DateTime<Utc>>, Vec<Message>);

/// Decode a stored value into a snapshot, migrating older layouts
///
/// Unversioned arrays are given fresh
/// message ids. Anything unreadable, or written by a newer schema, is a
/// `MalformedPersistedState` error.
pub fn decode_snapshot(bytes: &[u8]) -> Result<DecodedSnapshot, MiloError> {
    let layout: StoredLayout = serde_json::from_slice(bytes)
        .map_err(|e| MiloError::MalformedPersistedState(e.to_string()))?;

    match layout {
        StoredLayout::Legacy(items) => {
            tracing::debug!("Migrating unversioned snapshot with {} messages", items.len());
            let messages = items
                .into_iter()
                .map(|m| Message {
                    id: new_message_id(),
                    role: m.role,
                    content: m.content,
                })
                .collect();
            Ok((None, messages))
        }
        StoredLayout::Versioned(header) => {
            if header.schema_version != SCHEMA_VERSION {
                return Err(MiloError::MalformedPersistedState(format!(
                    "unsupported schema version {}",
                    header.schema_version
                )));
            }
            let messages: Vec<Message> = serde_json::from_value(header.messages)
                .map_err(|e| MiloError::MalformedPersistedState(e.to_string()))?;
            Ok((header.saved_at, messages))
        }
    }
}
