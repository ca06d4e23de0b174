//! HTTP client for the Milo assistant service
//!
//! Talks to `POST /chat`, `POST /reset` and `GET /payment-status` on a single
//! base URL. One request per call, no retries.

use crate::config::ServiceConfig;
use crate::error::{MiloError, Result};
use crate::service::{
    AssistantService, ChatRequest, ChatResponse, PaymentStatus, PaymentStatusResponse,
    PaymentStatusService, ResetRequest,
};

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

/// reqwest-backed implementation of both service traits
///
/// # Examples
///
/// ```
/// use milo::config::ServiceConfig;
/// use milo::service::HttpAssistantClient;
///
/// let client = HttpAssistantClient::new(ServiceConfig::default()).unwrap();
/// assert_eq!(client.base_url(), "http://127.0.0.1:8000");
/// ```
pub struct HttpAssistantClient {
    client: Client,
    base_url: String,
}

impl HttpAssistantClient {
    /// Create a client for the configured service
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MiloError::Config(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = config.base_url.trim_end_matches('/').to_string();

        tracing::info!("Initialized assistant client: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn transport failures and non-2xx statuses into `MiloError::Network`
    async fn check(
        result: std::result::Result<Response, reqwest::Error>,
        what: &str,
    ) -> Result<Response> {
        let response = result.map_err(|e| {
            tracing::error!("{} request failed: {}", what, e);
            MiloError::Network(format!("{} request failed: {}", what, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("{} returned error {}: {}", what, status, error_text);
            return Err(MiloError::Network(format!(
                "{} returned error {}: {}",
                what, status, error_text
            ))
            .into());
        }

        Ok(response)
    }
}

#[async_trait]
impl AssistantService for HttpAssistantClient {
    async fn send(&self, utterance: &str, session_id: &str) -> Result<String> {
        let request = ChatRequest {
            message: utterance.to_string(),
            user_id: Some(session_id.to_string()),
        };

        tracing::debug!(
            "Sending chat request: session={}, {} chars",
            session_id,
            utterance.len()
        );

        let response = Self::check(
            self.client
                .post(self.endpoint("/chat"))
                .json(&request)
                .send()
                .await,
            "Chat",
        )
        .await?;

        let body: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse chat response: {}", e);
            MiloError::Network(format!("Failed to parse chat response: {}", e))
        })?;

        Ok(body.reply)
    }

    async fn reset(&self, session_id: &str) -> Result<()> {
        let request = ResetRequest {
            user_id: session_id.to_string(),
        };

        Self::check(
            self.client
                .post(self.endpoint("/reset"))
                .json(&request)
                .send()
                .await,
            "Reset",
        )
        .await?;

        tracing::debug!("Remote context cleared for session {}", session_id);
        Ok(())
    }
}

#[async_trait]
impl PaymentStatusService for HttpAssistantClient {
    async fn payment_status(&self) -> Result<PaymentStatus> {
        let response = Self::check(
            self.client
                .get(self.endpoint("/payment-status"))
                .send()
                .await,
            "Payment status",
        )
        .await?;

        let body: PaymentStatusResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse payment status: {}", e);
            MiloError::Network(format!("Failed to parse payment status: {}", e))
        })?;

        Ok(PaymentStatus::from_raw(body.status.as_deref()))
    }
}
