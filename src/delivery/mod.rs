pub mod http;

use async_trait::async_trait;

use crate::models::FormData;

pub use http::HttpDelivery;

#[derive(Debug, Clone, PartialEq)]
pub enum DeliveryError {
    Transport(String),
    Status(u16),
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Transport(msg) => write!(f, "Delivery request failed: {msg}"),
            DeliveryError::Status(code) => write!(f, "Delivery endpoint returned {code}"),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// The remote side that accepts a submission payload.
///
/// `Ok(())` means the payload was accepted (a 2xx response). Every other
/// outcome is a failed attempt. No idempotency key is sent, so a retried
/// attempt looks like a fresh submission to the remote side.
#[async_trait]
pub trait DeliveryEndpoint: Send + Sync {
    async fn deliver(&self, form_data: &FormData) -> Result<(), DeliveryError>;
}
