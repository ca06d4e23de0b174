//! Session core
//!
//! The message model, the per-session store, intent classification, payment
//! reconciliation, and the controller that ties them together.

pub mod controller;
pub mod intent;
pub mod message;
pub mod payment;
pub mod store;

pub use controller::{ResetOutcome, SendOutcome, SessionController, SessionState, StartupReport};
pub use intent::{Intent, IntentClassifier};
pub use message::{new_message_id, Message, Role};
pub use payment::{
    strip_marker, PaymentCheck, PaymentReconciler, PaymentSignal, ReconcileOutcome,
};
pub use store::{LoadOutcome, MessageStore};
