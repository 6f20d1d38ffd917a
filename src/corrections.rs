//! Client side of the AI data-correction collaborator.
//!
//! The collaborator looks at a batch of unsent payloads and proposes field
//! corrections. Accepting a proposal is an ordinary payload edit: it goes
//! through the queue's `Update` transition and is persisted like any other.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::FormData;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRequest {
    pub form_name: String,
    pub form_data_entries: Vec<FormData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub entry_index: usize,
    pub field: String,
    pub suggested_value: serde_json::Value,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionResponse {
    #[serde(default)]
    pub corrected_data_proposals: Vec<Proposal>,
}

/// A proposal resolved against the queue entry it was made for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correction {
    pub id: String,
    pub field: String,
    pub suggested_value: serde_json::Value,
    pub reasoning: String,
}

#[derive(Debug)]
pub enum CorrectionError {
    Disabled,
    Request(String),
    Status(u16),
    InvalidResponse(String),
}

impl std::fmt::Display for CorrectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionError::Disabled => write!(f, "Correction service is not configured"),
            CorrectionError::Request(msg) => write!(f, "Correction request failed: {msg}"),
            CorrectionError::Status(code) => write!(f, "Correction service returned {code}"),
            CorrectionError::InvalidResponse(msg) => {
                write!(f, "Invalid correction response: {msg}")
            }
        }
    }
}

impl std::error::Error for CorrectionError {}

#[async_trait]
pub trait CorrectionProvider: Send + Sync {
    async fn suggest(&self, request: &CorrectionRequest) -> Result<Vec<Proposal>, CorrectionError>;
}

pub struct HttpCorrectionProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpCorrectionProvider {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CorrectionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CorrectionError::Request(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CorrectionProvider for HttpCorrectionProvider {
    async fn suggest(&self, request: &CorrectionRequest) -> Result<Vec<Proposal>, CorrectionError> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CorrectionError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CorrectionError::Status(resp.status().as_u16()));
        }

        let body: CorrectionResponse = resp
            .json()
            .await
            .map_err(|e| CorrectionError::InvalidResponse(e.to_string()))?;
        Ok(body.corrected_data_proposals)
    }
}

/// Map proposals back to entry ids. Indices outside `ids` are dropped.
pub fn resolve(ids: &[String], proposals: Vec<Proposal>) -> Vec<Correction> {
    proposals
        .into_iter()
        .filter_map(|p| {
            let Some(id) = ids.get(p.entry_index) else {
                tracing::debug!("Dropping proposal for unknown entry {}", p.entry_index);
                return None;
            };
            Some(Correction {
                id: id.clone(),
                field: p.field,
                suggested_value: p.suggested_value,
                reasoning: p.reasoning,
            })
        })
        .collect()
}
