//! Error types for Milo
//!
//! This module defines the error types used by the session core,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Milo operations
///
/// Nothing in the session core surfaces these to the presentation layer:
/// the controller converts every failure into a chat message, an outcome
/// value, or a no-op. They exist so the lower layers can report precisely
/// what went wrong and so the logs carry the detail.
#[derive(Error, Debug)]
pub enum MiloError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The assistant or payment service was unreachable, timed out,
    /// answered with a non-success status, or sent an unreadable body
    #[error("Network error: {0}")]
    Network(String),

    /// A stored session snapshot could not be decoded
    #[error("Malformed persisted state: {0}")]
    MalformedPersistedState(String),

    /// The payment status check succeeded but did not report success
    #[error("Payment status is not successful: {0}")]
    PaymentStatusNegative(String),

    /// Session storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Interactive line editor errors
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

/// Result type alias for Milo operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
