use async_trait::async_trait;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

use milo::error::{MiloError, Result};
use milo::service::{AssistantService, PaymentStatus, PaymentStatusService};
use milo::storage::SessionStorage;

#[allow(dead_code)]
pub fn create_temp_storage() -> (SessionStorage, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("sessions.db");
    let storage = SessionStorage::new(db_path).expect("failed to open session storage");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Assistant stub that answers with a fixed reply and counts calls
#[allow(dead_code)]
pub struct StubAssistant {
    reply: Option<String>,
    reset_ok: bool,
    send_calls: Mutex<usize>,
    reset_calls: Mutex<usize>,
}

#[allow(dead_code)]
impl StubAssistant {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            reset_ok: true,
            send_calls: Mutex::new(0),
            reset_calls: Mutex::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            reply: None,
            reset_ok: false,
            send_calls: Mutex::new(0),
            reset_calls: Mutex::new(0),
        }
    }

    pub fn send_calls(&self) -> usize {
        *self.send_calls.lock().unwrap()
    }

    pub fn reset_calls(&self) -> usize {
        *self.reset_calls.lock().unwrap()
    }
}

#[async_trait]
impl AssistantService for StubAssistant {
    async fn send(&self, _utterance: &str, _session_id: &str) -> Result<String> {
        *self.send_calls.lock().unwrap() += 1;
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(MiloError::Network("connection refused".to_string()).into()),
        }
    }

    async fn reset(&self, _session_id: &str) -> Result<()> {
        *self.reset_calls.lock().unwrap() += 1;
        if self.reset_ok {
            Ok(())
        } else {
            Err(MiloError::Network("connection refused".to_string()).into())
        }
    }
}

/// Payment status stub with a fixed answer and a call counter
#[allow(dead_code)]
pub struct StubPaymentStatus {
    status: Option<PaymentStatus>,
    calls: Mutex<usize>,
}

#[allow(dead_code)]
impl StubPaymentStatus {
    pub fn success() -> Self {
        Self::answering(PaymentStatus::Success)
    }

    pub fn answering(status: PaymentStatus) -> Self {
        Self {
            status: Some(status),
            calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            status: None,
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PaymentStatusService for StubPaymentStatus {
    async fn payment_status(&self) -> Result<PaymentStatus> {
        *self.calls.lock().unwrap() += 1;
        match &self.status {
            Some(status) => Ok(status.clone()),
            None => Err(MiloError::Network("payment status unreachable".to_string()).into()),
        }
    }
}
