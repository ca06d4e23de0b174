//! Remote service module for Milo
//!
//! This module contains the assistant/payment service abstraction and its
//! HTTP implementation.

pub mod base;
pub mod http;

pub use base::{
    AssistantService, ChatRequest, ChatResponse, PaymentStatus, PaymentStatusResponse,
    PaymentStatusService, ResetRequest,
};
pub use http::HttpAssistantClient;
