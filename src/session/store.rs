//! Ordered, append-only message store for one session
//!
//! Every mutation is followed by a full-snapshot write to [`SessionStorage`].
//! A failed write is logged and the in-memory state stays authoritative; the
//! last successful write is what survives a restart. If the stored
//! conversation could not be read at load, nothing is written for the rest of
//! the store's life so the unread snapshot is left intact.

use crate::error::{MiloError, Result};
use crate::session::Message;
use crate::storage::SessionStorage;

/// How the store was populated at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A persisted conversation with this many messages was restored
    Restored(usize),
    /// Nothing was stored; the greeting was seeded
    Seeded,
    /// The stored snapshot was unreadable, discarded, and the greeting seeded
    Recovered,
    /// Storage could not be read; the greeting was seeded in memory only
    Unavailable,
}

/// The conversation of a single session
pub struct MessageStore {
    session_id: String,
    greeting: String,
    messages: Vec<Message>,
    storage: SessionStorage,
    detached: bool,
}

impl MessageStore {
    /// Create an empty store bound to `session_id`
    ///
    /// Call [`MessageStore::load`] to restore or seed the conversation.
    pub fn new(
        session_id: impl Into<String>,
        greeting: impl Into<String>,
        storage: SessionStorage,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            greeting: greeting.into(),
            messages: Vec::new(),
            storage,
            detached: false,
        }
    }

    /// Session this store persists under
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Replace the in-memory conversation with the persisted one
    ///
    /// Falls back to the greeting when nothing usable is stored. Never fails.
    pub fn load(&mut self) -> LoadOutcome {
        let stored = self.storage.load_session(&self.session_id);
        self.restore(stored)
    }

    /// Populate the conversation from the result of
    /// [`SessionStorage::load_session`]
    ///
    /// Lets the caller perform the read elsewhere, e.g. off the async executor.
    pub fn restore(&mut self, stored: Result<Option<Vec<Message>>>) -> LoadOutcome {
        self.detached = false;
        match stored {
            Ok(Some(messages)) if !messages.is_empty() => {
                tracing::info!(
                    "Restored session {} with {} messages",
                    self.session_id,
                    messages.len()
                );
                let count = messages.len();
                self.messages = messages;
                LoadOutcome::Restored(count)
            }
            Ok(_) => {
                tracing::debug!("No stored conversation for {}, seeding greeting", self.session_id);
                self.seed();
                LoadOutcome::Seeded
            }
            Err(e) => match e.downcast_ref::<MiloError>() {
                Some(MiloError::MalformedPersistedState(reason)) => {
                    tracing::warn!(
                        "Discarding unreadable snapshot for {}: {}",
                        self.session_id,
                        reason
                    );
                    self.seed();
                    LoadOutcome::Recovered
                }
                _ => {
                    tracing::error!(
                        "Failed to read session {}, continuing without saving: {}",
                        self.session_id,
                        e
                    );
                    self.detached = true;
                    self.messages = vec![self.greeting_message()];
                    LoadOutcome::Unavailable
                }
            },
        }
    }

    /// Append `message` to the end of the conversation and persist
    ///
    /// Returns `false` without changing anything when the message is blank or
    /// a message with the same id is already present.
    pub fn append(&mut self, message: Message) -> bool {
        if message.is_blank() {
            tracing::debug!("Ignoring blank {} message", message.role);
            return false;
        }

        if self.contains(&message.id) {
            tracing::debug!("Ignoring duplicate message {}", message.id);
            return false;
        }

        self.messages.push(message);
        self.persist();
        true
    }

    /// Replace the conversation with the single greeting and persist
    pub fn reset(&mut self) {
        tracing::info!(
            "Resetting session {} ({} messages dropped)",
            self.session_id,
            self.messages.len()
        );
        self.seed();
    }

    /// Current conversation, oldest first
    pub fn snapshot(&self) -> &[Message] {
        &self.messages
    }

    /// Whether a message with `id` is present
    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages (only before `load`)
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn greeting_message(&self) -> Message {
        Message::assistant(self.greeting.clone())
    }

    fn seed(&mut self) {
        self.messages = vec![self.greeting_message()];
        self.persist();
    }

    fn persist(&self) {
        if self.detached {
            tracing::debug!("Session {} is not being saved", self.session_id);
            return;
        }
        if let Err(e) = self.storage.save_session(&self.session_id, &self.messages) {
            tracing::warn!("Failed to persist session {}: {}", self.session_id, e);
        }
    }
}
