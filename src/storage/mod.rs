//! Durable session storage
//!
//! Stores one full snapshot per session in an embedded `sled` key-value
//! database, plus a small ledger of payment events that have already been
//! reflected in a conversation.

use crate::error::{MiloError, Result};
use crate::session::Message;
use chrono::Utc;
use directories::ProjectDirs;
use sled::Db;
use std::path::{Path, PathBuf};

pub mod types;
pub use types::{decode_snapshot, ConsumedPayment, SessionSnapshot, StoredSession, SCHEMA_VERSION};

const SESSION_PREFIX: &str = "session/";
const PAYMENT_PREFIX: &str = "payment/";

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

// The session id is length-prefixed so ids containing `/` cannot collide.
fn payment_key(session_id: &str, event_key: &str) -> String {
    format!(
        "{}{}:{}/{}",
        PAYMENT_PREFIX,
        session_id.len(),
        session_id,
        event_key
    )
}

/// Storage backend for session snapshots
///
/// Cloning is cheap; clones share the same open database.
#[derive(Clone)]
pub struct SessionStorage {
    db: Db,
    path: Option<PathBuf>,
}

impl SessionStorage {
    /// Open the store in the user's data directory
    ///
    /// # Errors
    ///
    /// Returns `MiloError::Storage` if the directory cannot be determined
    /// or the database cannot be opened
    pub fn open_default() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("com", "milo", "milo")
            .ok_or_else(|| MiloError::Storage("Could not determine data directory".into()))?;

        Self::new(proj_dirs.data_dir().join("sessions.db"))
    }

    /// Open or create a store at `path`
    ///
    /// # Examples
    ///
    /// ```
    /// use milo::storage::SessionStorage;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let storage = SessionStorage::new(dir.path().join("sessions.db")).unwrap();
    /// assert!(storage.load_session("default_user").unwrap().is_none());
    /// ```
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MiloError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }

        let db = sled::open(path)
            .map_err(|e| MiloError::Storage(format!("Failed to open database: {}", e)))?;

        tracing::debug!("Opened session storage at {}", path.display());

        Ok(Self {
            db,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a throwaway in-memory store that is removed on drop
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| MiloError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db, path: None })
    }

    /// Location of the database, if it is file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Overwrite the snapshot for `session_id` with `messages`
    ///
    /// The write is flushed before returning.
    pub fn save_session(&self, session_id: &str, messages: &[Message]) -> Result<()> {
        let value = serde_json::to_vec(&SessionSnapshot::new(messages))
            .map_err(|e| MiloError::Storage(format!("Serialization failed: {}", e)))?;

        self.db
            .insert(session_key(session_id), value)
            .map_err(|e| MiloError::Storage(format!("Insert failed: {}", e)))?;

        self.flush()
    }

    /// Load the snapshot for `session_id`
    ///
    /// Returns `Ok(None)` when nothing was ever saved.
    ///
    /// # Errors
    ///
    /// Returns `MiloError::MalformedPersistedState` when a snapshot exists but
    /// cannot be decoded, and `MiloError::Storage` on database failure
    pub fn load_session(&self, session_id: &str) -> Result<Option<Vec<Message>>> {
        let bytes = self
            .db
            .get(session_key(session_id))
            .map_err(|e| MiloError::Storage(format!("Get failed: {}", e)))?;

        match bytes {
            Some(bytes) => {
                let (_, messages) = decode_snapshot(&bytes)?;
                Ok(Some(messages))
            }
            None => Ok(None),
        }
    }

    /// Write raw bytes under a session key, bypassing snapshot encoding
    ///
    /// Used to import data written by older clients.
    pub fn import_raw(&self, session_id: &str, bytes: &[u8]) -> Result<()> {
        self.db
            .insert(session_key(session_id), bytes)
            .map_err(|e| MiloError::Storage(format!("Insert failed: {}", e)))?;
        self.flush()
    }

    /// Remove the snapshot for `session_id`
    ///
    /// Idempotent. The payment ledger is kept so a cleared session cannot be
    /// re-confirmed for a payment it already acknowledged.
    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.db
            .remove(session_key(session_id))
            .map_err(|e| MiloError::Storage(format!("Remove failed: {}", e)))?;
        self.flush()
    }

    /// List stored sessions in key order
    ///
    /// Snapshots that cannot be decoded are skipped with a warning.
    pub fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let mut sessions = Vec::new();

        for entry in self.db.scan_prefix(SESSION_PREFIX) {
            let (key, value) =
                entry.map_err(|e| MiloError::Storage(format!("Iteration failed: {}", e)))?;
            let id = String::from_utf8_lossy(&key[SESSION_PREFIX.len()..]).to_string();

            match decode_snapshot(&value) {
                Ok((saved_at, messages)) => sessions.push(StoredSession {
                    id,
                    saved_at,
                    message_count: messages.len(),
                }),
                Err(e) => tracing::warn!("Skipping unreadable session {}: {}", id, e),
            }
        }

        Ok(sessions)
    }

    /// Whether `event_key` has already been reflected in `session_id`
    pub fn is_payment_consumed(&self, session_id: &str, event_key: &str) -> Result<bool> {
        let found = self
            .db
            .contains_key(payment_key(session_id, event_key))
            .map_err(|e| MiloError::Storage(format!("Get failed: {}", e)))?;
        Ok(found)
    }

    /// Record `event_key` as consumed for `session_id`
    ///
    /// Returns `true` if this call recorded it, `false` if it was already
    /// recorded. The check and the write are a single atomic operation.
    pub fn mark_payment_consumed(&self, session_id: &str, event_key: &str) -> Result<bool> {
        let record = ConsumedPayment {
            event_key: event_key.to_string(),
            consumed_at: Utc::now().to_rfc3339(),
        };
        let value = serde_json::to_vec(&record)
            .map_err(|e| MiloError::Storage(format!("Serialization failed: {}", e)))?;

        let swapped = self
            .db
            .compare_and_swap(
                payment_key(session_id, event_key),
                None::<&[u8]>,
                Some(value),
            )
            .map_err(|e| MiloError::Storage(format!("Compare-and-swap failed: {}", e)))?;

        self.flush()?;
        Ok(swapped.is_ok())
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| MiloError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}
