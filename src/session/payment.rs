//! Payment reconciliation
//!
//! After an external checkout the client is reopened with a marker on its
//! address (for example `?payment=success&session_id=cs_123`). At startup the
//! reconciler detects the marker, asks the payment status endpoint whether
//! the checkout completed, and on success appends one confirmation message.
//!
//! A payment event is reflected at most once per session. When the address
//! names the event, three things enforce that: the confirmation message id is
//! derived from the event key (so the store refuses a second copy), the event
//! is recorded in the durable payment ledger, and the caller strips the marker
//! from the address. A bare marker names no event, so every return carrying it
//! is a new payment; only stripping the marker guards against replaying it.

use crate::config::PaymentConfig;
use crate::error::MiloError;
use crate::service::{PaymentStatus, PaymentStatusService};
use crate::session::{new_message_id, Message, MessageStore};
use crate::storage::SessionStorage;
use std::sync::Arc;
use url::Url;

/// A payment marker found on the return address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSignal {
    /// Checkout session id carried next to the marker, if any
    pub event_key: Option<String>,
    confirmation_id: String,
}

impl PaymentSignal {
    /// Signal for a return that names its payment event
    pub fn for_event(event_key: impl Into<String>) -> Self {
        let event_key = event_key.into();
        Self {
            confirmation_id: format!("payment-{}", event_key),
            event_key: Some(event_key),
        }
    }

    /// Signal for a bare marker
    ///
    /// Each call is a distinct event with its own confirmation id.
    pub fn unidentified() -> Self {
        Self {
            event_key: None,
            confirmation_id: format!("payment-{}", new_message_id()),
        }
    }

    /// Event key for logs
    pub fn label(&self) -> &str {
        self.event_key.as_deref().unwrap_or("(unidentified)")
    }

    /// Look for the payment marker on `address`
    ///
    /// # Examples
    ///
    /// ```
    /// use milo::config::PaymentConfig;
    /// use milo::session::PaymentSignal;
    /// use url::Url;
    ///
    /// let config = PaymentConfig::default();
    /// let url = Url::parse("http://localhost:5173/?payment=success&session_id=cs_1").unwrap();
    /// let signal = PaymentSignal::detect(&url, &config).unwrap();
    /// assert_eq!(signal.event_key.as_deref(), Some("cs_1"));
    ///
    /// let url = Url::parse("http://localhost:5173/").unwrap();
    /// assert!(PaymentSignal::detect(&url, &config).is_none());
    /// ```
    pub fn detect(address: &Url, config: &PaymentConfig) -> Option<Self> {
        let mut marker = None;
        let mut event = None;

        for (key, value) in address.query_pairs() {
            if key == config.marker_param.as_str() {
                marker = Some(value.into_owned());
            } else if key == config.event_param.as_str() && !value.trim().is_empty() {
                event = Some(value.into_owned());
            }
        }

        let marker = marker?;
        if !marker.eq_ignore_ascii_case(&config.marker_value) {
            tracing::debug!("Ignoring payment marker with value {:?}", marker);
            return None;
        }

        Some(match event {
            Some(event_key) => Self::for_event(event_key),
            None => Self::unidentified(),
        })
    }

    /// Id of the confirmation message for this event
    pub fn confirmation_id(&self) -> &str {
        &self.confirmation_id
    }
}

/// Remove the payment marker and event parameters from `address`
///
/// Other query parameters and the fragment are kept in order.
pub fn strip_marker(address: &Url, config: &PaymentConfig) -> Url {
    let kept: Vec<(String, String)> = address
        .query_pairs()
        .filter(|(k, _)| k != config.marker_param.as_str() && k != config.event_param.as_str())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut cleaned = address.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}

/// Result of the network half of reconciliation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentCheck {
    /// No marker on the address
    Absent,
    /// The event was already reflected in this session
    AlreadyConsumed(PaymentSignal),
    /// The status endpoint reported success
    Confirmed(PaymentSignal),
    /// The status endpoint answered with something other than success
    Negative(String),
    /// The status endpoint could not be queried
    Failed(String),
}

/// What reconciliation did to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// No payment marker; nothing to do
    NoSignal,
    /// The confirmation was appended by this run
    Confirmed,
    /// The event had already been reflected; nothing appended
    AlreadyConsumed,
    /// Status was not success; nothing appended
    NotConfirmed,
    /// Status check failed; nothing appended, no retry
    CheckFailed,
}

impl ReconcileOutcome {
    /// Whether the marker has been fully handled and should be removed
    pub fn consumes_marker(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Confirmed | ReconcileOutcome::AlreadyConsumed
        )
    }
}

/// Detects, verifies, and records completed payments
pub struct PaymentReconciler {
    config: PaymentConfig,
    storage: SessionStorage,
    service: Arc<dyn PaymentStatusService>,
}

impl PaymentReconciler {
    /// Create a reconciler
    pub fn new(
        config: PaymentConfig,
        storage: SessionStorage,
        service: Arc<dyn PaymentStatusService>,
    ) -> Self {
        Self {
            config,
            storage,
            service,
        }
    }

    /// Marker configuration
    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Verify `signal` against the ledger and the status endpoint
    ///
    /// Does not touch the conversation, so it can run while the
    /// conversation is still being reloaded.
    pub async fn check(&self, session_id: &str, signal: Option<&PaymentSignal>) -> PaymentCheck {
        let Some(signal) = signal else {
            return PaymentCheck::Absent;
        };

        if let Some(event_key) = &signal.event_key {
            match self.storage.is_payment_consumed(session_id, event_key) {
                Ok(true) => {
                    tracing::info!(
                        "Payment {} already reflected in session {}",
                        event_key,
                        session_id
                    );
                    return PaymentCheck::AlreadyConsumed(signal.clone());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Payment ledger unavailable, relying on message ids: {}", e)
                }
            }
        }

        match self.service.payment_status().await {
            Ok(PaymentStatus::Success) => PaymentCheck::Confirmed(signal.clone()),
            Ok(PaymentStatus::Other(status)) => {
                let negative = MiloError::PaymentStatusNegative(status.clone());
                tracing::info!("Not confirming payment {}: {}", signal.label(), negative);
                PaymentCheck::Negative(status)
            }
            Err(e) => {
                tracing::warn!("Payment status check failed: {}", e);
                PaymentCheck::Failed(e.to_string())
            }
        }
    }

    /// Reflect a completed check in `store`
    ///
    /// Must only be called once the conversation has been loaded, otherwise
    /// the reload would overwrite the confirmation.
    pub fn apply(&self, check: PaymentCheck, store: &mut MessageStore) -> ReconcileOutcome {
        match check {
            PaymentCheck::Absent => ReconcileOutcome::NoSignal,
            PaymentCheck::AlreadyConsumed(_) => ReconcileOutcome::AlreadyConsumed,
            PaymentCheck::Negative(_) => ReconcileOutcome::NotConfirmed,
            PaymentCheck::Failed(_) => ReconcileOutcome::CheckFailed,
            PaymentCheck::Confirmed(signal) => {
                let message = Message::assistant_with_id(
                    signal.confirmation_id().to_string(),
                    self.config.confirmation.clone(),
                );
                let appended = store.append(message);

                // Record after the append: a crash in between leaves the
                // message id in the snapshot, which still blocks a duplicate.
                if let Some(event_key) = &signal.event_key {
                    if let Err(e) = self
                        .storage
                        .mark_payment_consumed(store.session_id(), event_key)
                    {
                        tracing::warn!("Failed to record payment {}: {}", event_key, e);
                    }
                }

                if appended {
                    tracing::info!(
                        "Payment {} confirmed in session {}",
                        signal.label(),
                        store.session_id()
                    );
                    ReconcileOutcome::Confirmed
                } else {
                    ReconcileOutcome::AlreadyConsumed
                }
            }
        }
    }
}
