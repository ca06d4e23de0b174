//! Remote service traits and wire types
//!
//! The session core talks to two black-box collaborators: the assistant
//! (chat and reset) and the payment status endpoint. Both sit behind traits
//! so the controller can be driven by in-process stubs.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's utterance
    pub message: String,
    /// Session the utterance belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Body returned by `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The assistant's reply
    pub reply: String,
}

/// Body of `POST /reset`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    /// Session whose server-side context should be discarded
    pub user_id: String,
}

/// Body returned by `GET /payment-status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusResponse {
    /// `"success"` once the checkout completed; anything else otherwise
    #[serde(alias = "latest_payment_status")]
    pub status: Option<String>,
}

/// Outcome of a payment status check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    /// The payment completed
    Success,
    /// Any other reported status (pending, failed, missing, ...)
    Other(String),
}

impl PaymentStatus {
    /// Interpret a raw status field
    ///
    /// # Examples
    ///
    /// ```
    /// use milo::service::PaymentStatus;
    ///
    /// assert_eq!(PaymentStatus::from_raw(Some("success")), PaymentStatus::Success);
    /// assert!(!PaymentStatus::from_raw(Some("pending")).is_success());
    /// assert!(!PaymentStatus::from_raw(None).is_success());
    /// ```
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("success") => PaymentStatus::Success,
            Some(s) => PaymentStatus::Other(s.to_string()),
            None => PaymentStatus::Other(String::new()),
        }
    }

    /// Whether the payment completed
    pub fn is_success(&self) -> bool {
        matches!(self, PaymentStatus::Success)
    }
}

/// The remote assistant
///
/// Implementations perform exactly one request per call; they never retry.
/// Any transport failure, timeout, non-success status, or unreadable body is
/// reported as `MiloError::Network`.
#[async_trait]
pub trait AssistantService: Send + Sync {
    /// Send an utterance and return the assistant's reply
    async fn send(&self, utterance: &str, session_id: &str) -> Result<String>;

    /// Ask the service to discard any context it holds for `session_id`
    async fn reset(&self, session_id: &str) -> Result<()>;
}

/// The payment status endpoint
#[async_trait]
pub trait PaymentStatusService: Send + Sync {
    /// Query the status of the most recent checkout
    async fn payment_status(&self) -> Result<PaymentStatus>;
}
