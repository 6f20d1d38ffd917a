use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-owned form payload, keyed by field name.
pub type FormData = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Sending,
    Sent,
    Failed,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Sending => "sending",
            SubmissionStatus::Sent => "sent",
            SubmissionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "sending" => Some(SubmissionStatus::Sending),
            "sent" => Some(SubmissionStatus::Sent),
            "failed" => Some(SubmissionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One queued report awaiting delivery. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub form_data: FormData,
    pub status: SubmissionStatus,
    pub attempts: u32,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_attempt_at: Option<i64>,
}

impl Submission {
    /// A fresh entry as the UI layer creates it: pending, no attempts yet.
    pub fn new(form_data: FormData, now: i64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            form_data,
            status: SubmissionStatus::Pending,
            attempts: 0,
            timestamp: now,
            next_attempt_at: None,
        }
    }
}

/// The persisted shape of a submission: payload serialized as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    #[sqlx(rename = "formData")]
    pub form_data: String,
    pub status: String,
    pub attempts: i64,
    pub timestamp: i64,
    #[sqlx(rename = "nextAttemptAt")]
    #[serde(default)]
    pub next_attempt_at: Option<i64>,
}
