//! Session controller
//!
//! Owns one session's [`MessageStore`] and runs every interaction against it:
//!
//! - startup: reload the persisted conversation and reconcile a returning
//!   payment, joined so the confirmation lands after the reload. The
//!   snapshot read runs on the blocking pool while the status check awaits
//!   the network
//! - send: commit the user message, classify it, answer locally for a
//!   purchase or ask the assistant service otherwise
//! - reset: clear locally, then ask the service to forget
//!
//! The controller is either `Idle` or `Sending`. While a remote call is in
//! flight (including the startup status check) further starts, sends and
//! resets are rejected rather than queued. Nothing
//! here returns an error to the caller: failures become chat messages,
//! outcome values, or no-ops.

use crate::config::Config;
use crate::error::MiloError;
use crate::service::{AssistantService, PaymentStatusService};
use crate::session::payment::{strip_marker, PaymentReconciler, PaymentSignal, ReconcileOutcome};
use crate::session::{Intent, IntentClassifier, LoadOutcome, Message, MessageStore};
use crate::storage::SessionStorage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for the next send or reset
    Idle,
    /// A remote call is in flight
    Sending,
}

/// Result of [`SessionController::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant service answered; the reply was appended
    Replied(Message),
    /// Purchase intent; the synthetic checkout reply was appended
    PurchaseLink(Message),
    /// The assistant service failed; an error reply was appended
    Failed(Message),
    /// Another call was in flight; nothing changed
    Rejected,
    /// The input was blank; nothing changed
    Ignored,
}

/// Result of [`SessionController::reset`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Cleared locally and on the service
    Cleared,
    /// Cleared locally; the service may still hold context
    LocalOnly {
        /// Notice for the user
        warning: String,
    },
    /// Another call was in flight; nothing changed
    Rejected,
}

/// What [`SessionController::start`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// How the conversation was populated
    pub restored: LoadOutcome,
    /// What payment reconciliation did
    pub payment: ReconcileOutcome,
    /// The address to show from now on, with a handled payment marker removed
    pub address: Option<Url>,
}

/// Clears the sending flag when a send or reset finishes, however it ends
struct SendingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Orchestrates one session
pub struct SessionController {
    session_id: String,
    store: Mutex<MessageStore>,
    storage: SessionStorage,
    sending: AtomicBool,
    classifier: IntentClassifier,
    assistant: Arc<dyn AssistantService>,
    reconciler: PaymentReconciler,
    purchase_reply: String,
    error_reply: String,
    reset_warning: String,
}

impl SessionController {
    /// Create a controller for `session_id`
    ///
    /// The conversation is empty until [`SessionController::start`] runs.
    pub fn new(
        session_id: impl Into<String>,
        config: &Config,
        storage: SessionStorage,
        assistant: Arc<dyn AssistantService>,
        payments: Arc<dyn PaymentStatusService>,
    ) -> Self {
        let session_id = session_id.into();
        let store = MessageStore::new(
            session_id.clone(),
            config.session.greeting.clone(),
            storage.clone(),
        );

        Self {
            session_id,
            store: Mutex::new(store),
            storage: storage.clone(),
            sending: AtomicBool::new(false),
            classifier: IntentClassifier::from_config(&config.intent),
            assistant,
            reconciler: PaymentReconciler::new(config.payment.clone(), storage, payments),
            purchase_reply: config.intent.render_purchase_reply(),
            error_reply: config.session.error_reply.clone(),
            reset_warning: config.session.reset_warning.clone(),
        }
    }

    /// Session this controller manages
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        if self.is_loading() {
            SessionState::Sending
        } else {
            SessionState::Idle
        }
    }

    /// Whether a remote call is in flight
    pub fn is_loading(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Copy of the conversation, oldest first
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock_store().snapshot().to_vec()
    }

    /// Load the session and reconcile a returning payment
    ///
    /// `address` is where the client was opened from; it may carry the
    /// payment marker. The reload and the payment status check are started
    /// together; the confirmation is applied only after both have finished.
    ///
    /// Returns `None` without touching the session if another call is in
    /// flight.
    pub async fn start(&self, address: Option<&Url>) -> Option<StartupReport> {
        let Some(_guard) = SendingGuard::acquire(&self.sending) else {
            tracing::debug!("Start rejected: another call is in flight");
            return None;
        };

        let signal = address.and_then(|a| PaymentSignal::detect(a, self.reconciler.config()));
        if let Some(signal) = &signal {
            tracing::info!("Payment marker present: event={}", signal.label());
        }

        let storage = self.storage.clone();
        let session_id = self.session_id.clone();
        let reload = tokio::task::spawn_blocking(move || storage.load_session(&session_id));
        let check = self.reconciler.check(&self.session_id, signal.as_ref());
        let (stored, check) = tokio::join!(reload, check);
        let stored = stored.unwrap_or_else(|e| {
            Err(MiloError::Storage(format!("Reload task failed: {}", e)).into())
        });

        let (restored, payment) = {
            let mut store = self.lock_store();
            let restored = store.restore(stored);
            (restored, self.reconciler.apply(check, &mut store))
        };

        let address = address.map(|a| {
            if payment.consumes_marker() {
                strip_marker(a, self.reconciler.config())
            } else {
                a.clone()
            }
        });

        tracing::debug!(?restored, ?payment, "Session {} started", self.session_id);

        Some(StartupReport {
            restored,
            payment,
            address,
        })
    }

    /// Send a user utterance
    ///
    /// The user message is committed before any remote call. A purchase
    /// intent is answered locally with the checkout link; anything else goes
    /// to the assistant service, and a failure there is answered with an
    /// error reply. Rejected while another call is in flight.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }

        let Some(_guard) = SendingGuard::acquire(&self.sending) else {
            tracing::debug!("Send rejected: another call is in flight");
            return SendOutcome::Rejected;
        };

        self.append(Message::user(text));

        match self.classifier.classify(text) {
            Intent::Purchase => {
                tracing::info!("Purchase intent detected, answering with checkout link");
                let reply = Message::assistant(self.purchase_reply.clone());
                self.append(reply.clone());
                SendOutcome::PurchaseLink(reply)
            }
            Intent::Generic => match self.assistant.send(text, &self.session_id).await {
                Ok(reply) if !reply.trim().is_empty() => {
                    let reply = Message::assistant(reply);
                    self.append(reply.clone());
                    SendOutcome::Replied(reply)
                }
                Ok(_) => {
                    tracing::warn!("Assistant returned an empty reply");
                    self.fail()
                }
                Err(e) => {
                    tracing::warn!("Assistant request failed: {}", e);
                    self.fail()
                }
            },
        }
    }

    /// Clear the conversation back to the greeting
    ///
    /// The local reset always takes effect. The service is then asked to
    /// discard its context; if that fails the outcome carries a warning.
    pub async fn reset(&self) -> ResetOutcome {
        let Some(_guard) = SendingGuard::acquire(&self.sending) else {
            tracing::debug!("Reset rejected: another call is in flight");
            return ResetOutcome::Rejected;
        };

        self.lock_store().reset();

        match self.assistant.reset(&self.session_id).await {
            Ok(()) => ResetOutcome::Cleared,
            Err(e) => {
                tracing::warn!("Remote reset failed, local reset kept: {}", e);
                ResetOutcome::LocalOnly {
                    warning: self.reset_warning.clone(),
                }
            }
        }
    }

    fn fail(&self) -> SendOutcome {
        let reply = Message::assistant(self.error_reply.clone());
        self.append(reply.clone());
        SendOutcome::Failed(reply)
    }

    fn append(&self, message: Message) {
        self.lock_store().append(message);
    }

    fn lock_store(&self) -> MutexGuard<'_, MessageStore> {
        // A panic while holding the lock cannot leave the store half-written:
        // every mutation is a single push or replace.
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MiloError, Result};
    use crate::service::PaymentStatus;
    use crate::session::Role;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    /// Assistant stub that replays canned results and counts calls
    struct MockAssistant {
        replies: Mutex<Vec<Result<String>>>,
        send_calls: Mutex<usize>,
        reset_ok: bool,
        gate: Option<Arc<Notify>>,
    }

    impl MockAssistant {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                send_calls: Mutex::new(0),
                reset_ok: true,
                gate: None,
            }
        }

        fn send_calls(&self) -> usize {
            *self.send_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl AssistantService for MockAssistant {
        async fn send(&self, _utterance: &str, _session_id: &str) -> Result<String> {
            *self.send_calls.lock().unwrap() += 1;
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok("Done".to_string())
            } else {
                replies.remove(0)
            }
        }

        async fn reset(&self, _session_id: &str) -> Result<()> {
            if self.reset_ok {
                Ok(())
            } else {
                Err(MiloError::Network("reset unreachable".to_string()).into())
            }
        }
    }

    struct FixedStatus(PaymentStatus);

    #[async_trait]
    impl PaymentStatusService for FixedStatus {
        async fn payment_status(&self) -> Result<PaymentStatus> {
            Ok(self.0.clone())
        }
    }

    fn controller(assistant: Arc<MockAssistant>) -> SessionController {
        SessionController::new(
            "default_user",
            &Config::default(),
            SessionStorage::temporary().unwrap(),
            assistant,
            Arc::new(FixedStatus(PaymentStatus::Success)),
        )
    }

    #[tokio::test]
    async fn test_start_seeds_greeting() {
        let c = controller(Arc::new(MockAssistant::new(vec![])));
        let report = c.start(None).await.unwrap();

        assert_eq!(report.restored, LoadOutcome::Seeded);
        assert_eq!(report.payment, ReconcileOutcome::NoSignal);
        assert_eq!(c.snapshot().len(), 1);
        assert_eq!(c.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_generic_send_appends_user_then_reply() {
        let assistant = Arc::new(MockAssistant::new(vec![Ok(
            "Baggage coverage includes...".to_string()
        )]));
        let c = controller(assistant.clone());
        c.start(None).await.unwrap();

        let outcome = c.send("What does baggage cover?").await;
        assert!(matches!(outcome, SendOutcome::Replied(ref m) if m.content == "Baggage coverage includes..."));

        let messages = c.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What does baggage cover?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert_eq!(messages[2].content, "Baggage coverage includes...");
        assert_eq!(assistant.send_calls(), 1);
        assert!(!c.is_loading());
    }

    #[tokio::test]
    async fn test_purchase_send_never_calls_assistant() {
        let assistant = Arc::new(MockAssistant::new(vec![]));
        let c = controller(assistant.clone());
        c.start(None).await.unwrap();

        let outcome = c.send("I want to buy insurance").await;
        let checkout_url = Config::default().intent.checkout_url;
        assert!(matches!(outcome, SendOutcome::PurchaseLink(ref m) if m.content.contains(&checkout_url)));

        let messages = c.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages
                .iter()
                .filter(|m| m.role == Role::Assistant && m.content.contains(&checkout_url))
                .count(),
            1
        );
        assert_eq!(assistant.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_user_message() {
        let assistant = Arc::new(MockAssistant::new(vec![Err(MiloError::Network(
            "timed out".to_string(),
        )
        .into())]));
        let c = controller(assistant);
        c.start(None).await.unwrap();

        let outcome = c.send("Am I covered for skiing?").await;
        let error_reply = Config::default().session.error_reply;
        assert!(matches!(outcome, SendOutcome::Failed(ref m) if m.content == error_reply));

        let messages = c.snapshot();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "Am I covered for skiing?");
        assert_eq!(messages[2].role, Role::Assistant);
        assert!(!c.is_loading());
    }

    #[tokio::test]
    async fn test_empty_reply_is_treated_as_failure() {
        let c = controller(Arc::new(MockAssistant::new(vec![Ok("  ".to_string())])));
        c.start(None).await.unwrap();

        assert!(matches!(c.send("hello").await, SendOutcome::Failed(_)));
        assert_eq!(c.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let assistant = Arc::new(MockAssistant::new(vec![]));
        let c = controller(assistant.clone());
        c.start(None).await.unwrap();

        assert_eq!(c.send("   ").await, SendOutcome::Ignored);
        assert_eq!(c.snapshot().len(), 1);
        assert_eq!(assistant.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_send_while_sending_is_rejected() {
        let gate = Arc::new(Notify::new());
        let mut assistant = MockAssistant::new(vec![Ok("first reply".to_string())]);
        assistant.gate = Some(gate.clone());
        let assistant = Arc::new(assistant);
        let c = Arc::new(controller(assistant.clone()));
        c.start(None).await.unwrap();

        let in_flight = {
            let c = c.clone();
            tokio::spawn(async move { c.send("first question").await })
        };

        // Wait until the first send is parked inside the assistant call
        while assistant.send_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(c.state(), SessionState::Sending);
        // User message is already committed while the call is pending
        assert_eq!(c.snapshot().len(), 2);

        assert_eq!(c.send("second question").await, SendOutcome::Rejected);
        assert_eq!(c.reset().await, ResetOutcome::Rejected);
        let address = Url::parse("http://localhost:5173/?payment=success").unwrap();
        assert_eq!(c.start(Some(&address)).await, None);
        assert_eq!(c.snapshot().len(), 2);

        gate.notify_one();
        let outcome = in_flight.await.unwrap();
        assert!(matches!(outcome, SendOutcome::Replied(_)));
        assert_eq!(c.state(), SessionState::Idle);
        assert_eq!(c.snapshot().len(), 3);
        assert_eq!(assistant.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_reset_yields_single_greeting() {
        let c = controller(Arc::new(MockAssistant::new(vec![])));
        c.start(None).await.unwrap();
        c.send("one").await;
        c.send("two").await;

        assert_eq!(c.reset().await, ResetOutcome::Cleared);
        let messages = c.snapshot();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, Config::default().session.greeting);
    }

    #[tokio::test]
    async fn test_remote_reset_failure_keeps_local_reset() {
        let mut assistant = MockAssistant::new(vec![]);
        assistant.reset_ok = false;
        let c = controller(Arc::new(assistant));
        c.start(None).await.unwrap();
        c.send("remember this").await;

        let outcome = c.reset().await;
        assert!(matches!(outcome, ResetOutcome::LocalOnly { .. }));
        assert_eq!(c.snapshot().len(), 1);
        assert!(!c.is_loading());
    }

    #[tokio::test]
    async fn test_messages_grow_monotonically() {
        let c = controller(Arc::new(MockAssistant::new(vec![
            Ok("a".to_string()),
            Err(MiloError::Network("down".to_string()).into()),
            Ok("c".to_string()),
        ])));
        c.start(None).await.unwrap();

        let mut last = c.snapshot().len();
        for text in ["hi", "buy now", "", "what?", "ok"] {
            c.send(text).await;
            let len = c.snapshot().len();
            assert!(len >= last);
            last = len;
        }
        assert_eq!(last, 9);
    }

    #[tokio::test]
    async fn test_start_with_payment_marker_confirms_and_strips() {
        let c = controller(Arc::new(MockAssistant::new(vec![])));
        let address = Url::parse("http://localhost:5173/?payment=success&session_id=cs_9").unwrap();

        let report = c.start(Some(&address)).await.unwrap();
        assert_eq!(report.payment, ReconcileOutcome::Confirmed);
        assert_eq!(
            report.address.map(|u| u.to_string()),
            Some("http://localhost:5173/".to_string())
        );

        let messages = c.snapshot();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, Config::default().payment.confirmation);
    }
}
