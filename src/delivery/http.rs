use std::time::Duration;

use async_trait::async_trait;

use super::{DeliveryEndpoint, DeliveryError};
use crate::models::FormData;

/// Posts the payload as the whole JSON body to a fixed URL.
pub struct HttpDelivery {
    client: reqwest::Client,
    url: String,
}

impl HttpDelivery {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl DeliveryEndpoint for HttpDelivery {
    async fn deliver(&self, form_data: &FormData) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .json(form_data)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect::<String>();
            tracing::debug!("Delivery rejected with {status}: {body}");
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}
