//! Milo - travel insurance assistant client library
//!
//! This library provides the client side of the Milo assistant: the
//! conversation model, local persistence, purchase intent detection,
//! payment reconciliation, and the HTTP client for the assistant service.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `session`: Messages, the per-session store, intent classification,
//!   payment reconciliation, and the session controller
//! - `service`: Assistant service abstraction and its HTTP client
//! - `storage`: Durable sessions and the consumed-payment ledger
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use milo::{Config, HttpAssistantClient, SessionController, SessionStorage};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let client = Arc::new(HttpAssistantClient::new(config.service.clone())?);
//!     let storage = SessionStorage::open_default()?;
//!     let controller =
//!         SessionController::new("default_user", &config, storage, client.clone(), client);
//!
//!     if controller.start(None).await.is_some() {
//!         controller.send("What does baggage cover?").await;
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod service;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use error::{MiloError, Result};
pub use service::{AssistantService, HttpAssistantClient, PaymentStatusService};
pub use session::{Message, Role, SessionController};
pub use storage::SessionStorage;
