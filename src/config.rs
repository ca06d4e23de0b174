//! Configuration management for Milo
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{MiloError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Milo
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote assistant/payment service settings
    #[serde(default)]
    pub service: ServiceConfig,
    /// Session defaults and fixed copy
    #[serde(default)]
    pub session: SessionConfig,
    /// Purchase intent detection
    #[serde(default)]
    pub intent: IntentConfig,
    /// Payment reconciliation
    #[serde(default)]
    pub payment: PaymentConfig,
    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Remote service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the assistant service (`/chat`, `/reset`, `/payment-status`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent sent with each request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("milo/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session id used when the caller does not supply one
    #[serde(default = "default_session_id")]
    pub default_session_id: String,

    /// Greeting seeded into a fresh or reset conversation
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Assistant-role reply shown when the assistant service cannot be reached
    #[serde(default = "default_error_reply")]
    pub error_reply: String,

    /// Notice returned when the remote reset fails
    #[serde(default = "default_reset_warning")]
    pub reset_warning: String,
}

fn default_session_id() -> String {
    "default_user".to_string()
}

fn default_greeting() -> String {
    "Hi, I'm Milo, your travel insurance assistant. Ask me anything about your cover, \
     or tell me when you're ready to buy a policy."
        .to_string()
}

fn default_error_reply() -> String {
    "Sorry, I couldn't reach the assistant right now. Please try again in a moment."
        .to_string()
}

fn default_reset_warning() -> String {
    "The conversation was cleared here, but the assistant may still remember earlier messages."
        .to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_session_id: default_session_id(),
            greeting: default_greeting(),
            error_reply: default_error_reply(),
            reset_warning: default_reset_warning(),
        }
    }
}

/// Purchase intent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentConfig {
    /// Terms that mark an utterance as a purchase intent (case-insensitive)
    #[serde(default = "default_purchase_triggers")]
    pub purchase_triggers: Vec<String>,

    /// Fixed external checkout URL; opaque to the client
    #[serde(default = "default_checkout_url")]
    pub checkout_url: String,

    /// Synthetic reply template; `{checkout_url}` is substituted
    #[serde(default = "default_purchase_reply")]
    pub purchase_reply: String,
}

fn default_purchase_triggers() -> Vec<String> {
    vec!["buy".to_string()]
}

fn default_checkout_url() -> String {
    "https://buy.stripe.com/test_milo_travel_policy".to_string()
}

fn default_purchase_reply() -> String {
    "Great choice! You can complete your purchase securely here: {checkout_url}".to_string()
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            purchase_triggers: default_purchase_triggers(),
            checkout_url: default_checkout_url(),
            purchase_reply: default_purchase_reply(),
        }
    }
}

impl IntentConfig {
    /// Render the synthetic purchase reply with the checkout URL filled in
    pub fn render_purchase_reply(&self) -> String {
        self.purchase_reply
            .replace("{checkout_url}", &self.checkout_url)
    }
}

/// Payment reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Query parameter carrying the payment marker on the return address
    #[serde(default = "default_marker_param")]
    pub marker_param: String,

    /// Marker value meaning "returned from a completed checkout"
    #[serde(default = "default_marker_value")]
    pub marker_value: String,

    /// Query parameter identifying the individual payment event
    #[serde(default = "default_event_param")]
    pub event_param: String,

    /// Assistant-role message appended once a payment is confirmed
    #[serde(default = "default_confirmation")]
    pub confirmation: String,
}

fn default_marker_param() -> String {
    "payment".to_string()
}

fn default_marker_value() -> String {
    "success".to_string()
}

fn default_event_param() -> String {
    "session_id".to_string()
}

fn default_confirmation() -> String {
    "Payment successful! Your travel insurance policy is now active. \
     A confirmation has been sent to your email."
        .to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            marker_param: default_marker_param(),
            marker_value: default_marker_value(),
            event_param: default_event_param(),
            confirmation: default_confirmation(),
        }
    }
}

/// Local persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Database directory; defaults to the user's data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MiloError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| MiloError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("MILO_SERVICE_URL") {
            self.service.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("MILO_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.service.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid MILO_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(session_id) = std::env::var("MILO_SESSION_ID") {
            self.session.default_session_id = session_id;
        }

        if let Ok(triggers) = std::env::var("MILO_PURCHASE_TRIGGERS") {
            let terms: Vec<String> = triggers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !terms.is_empty() {
                tracing::debug!(?terms, "Env override: MILO_PURCHASE_TRIGGERS");
                self.intent.purchase_triggers = terms;
            }
        }

        if let Ok(checkout_url) = std::env::var("MILO_CHECKOUT_URL") {
            self.intent.checkout_url = checkout_url;
        }

        if let Ok(storage_path) = std::env::var("MILO_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(storage_path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Some(url) = &cli.service_url {
            self.service.base_url = url.clone();
        }

        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if url::Url::parse(&self.service.base_url).is_err() {
            return Err(MiloError::Config(format!(
                "service.base_url is not a valid URL: {}",
                self.service.base_url
            ))
            .into());
        }

        if self.service.timeout_seconds == 0 {
            return Err(MiloError::Config(
                "service.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.default_session_id.trim().is_empty() {
            return Err(MiloError::Config(
                "session.default_session_id cannot be empty".to_string(),
            )
            .into());
        }

        if self.session.greeting.trim().is_empty() {
            return Err(
                MiloError::Config("session.greeting cannot be empty".to_string()).into(),
            );
        }

        if self
            .intent
            .purchase_triggers
            .iter()
            .all(|t| t.trim().is_empty())
        {
            return Err(MiloError::Config(
                "intent.purchase_triggers must contain at least one term".to_string(),
            )
            .into());
        }

        if self.intent.checkout_url.trim().is_empty() {
            return Err(
                MiloError::Config("intent.checkout_url cannot be empty".to_string()).into(),
            );
        }

        if self.payment.marker_param.trim().is_empty() {
            return Err(MiloError::Config(
                "payment.marker_param cannot be empty".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn cli() -> crate::cli::Cli {
        crate::cli::Cli {
            config: None,
            verbose: false,
            service_url: None,
            storage_path: None,
            command: crate::cli::Commands::Sessions,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.session.default_session_id, "default_user");
        assert_eq!(config.intent.purchase_triggers, vec!["buy".to_string()]);
        assert_eq!(config.payment.marker_param, "payment");
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_base_url() {
        let mut config = Config::default();
        config.service.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.service.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_triggers() {
        let mut config = Config::default();
        config.intent.purchase_triggers = vec!["  ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_greeting() {
        let mut config = Config::default();
        config.session.greeting = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_render_purchase_reply_embeds_checkout_url() {
        let intent = IntentConfig {
            checkout_url: "https://checkout.example/abc".to_string(),
            ..Default::default()
        };
        assert!(intent
            .render_purchase_reply()
            .contains("https://checkout.example/abc"));
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
service:
  base_url: http://localhost:9000
  timeout_seconds: 5
intent:
  purchase_triggers: [buy, purchase]
  checkout_url: https://checkout.example/x
payment:
  marker_param: paid
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.service.base_url, "http://localhost:9000");
        assert_eq!(config.service.timeout_seconds, 5);
        assert_eq!(config.intent.purchase_triggers.len(), 2);
        assert_eq!(config.payment.marker_param, "paid");
        assert_eq!(config.payment.marker_value, "success");
        assert_eq!(config.session.default_session_id, "default_user");
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let config = Config::load("nonexistent.yaml", &cli()).unwrap();
        assert_eq!(config.intent.checkout_url, default_checkout_url());
    }

    #[test]
    #[serial]
    fn test_apply_env_vars_overrides_fields() {
        std::env::set_var("MILO_SERVICE_URL", "http://env.example:1234");
        std::env::set_var("MILO_PURCHASE_TRIGGERS", "buy, sign up ,");
        std::env::set_var("MILO_TIMEOUT_SECONDS", "not-a-number");

        let mut config = Config::default();
        config.apply_env_vars();

        std::env::remove_var("MILO_SERVICE_URL");
        std::env::remove_var("MILO_PURCHASE_TRIGGERS");
        std::env::remove_var("MILO_TIMEOUT_SECONDS");

        assert_eq!(config.service.base_url, "http://env.example:1234");
        assert_eq!(
            config.intent.purchase_triggers,
            vec!["buy".to_string(), "sign up".to_string()]
        );
        assert_eq!(config.service.timeout_seconds, default_timeout());
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let mut cli = cli();
        cli.service_url = Some("http://cli.example".to_string());
        cli.storage_path = Some(PathBuf::from("/tmp/milo-test"));

        let mut config = Config::default();
        config.apply_cli_overrides(&cli);
        assert_eq!(config.service.base_url, "http://cli.example");
        assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/milo-test")));
    }
}
