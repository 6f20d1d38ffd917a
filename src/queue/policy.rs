use crate::models::{Submission, SubmissionStatus};

use super::SubmissionPatch;

pub const MAX_RETRIES: u32 = 5;
pub const BACKOFF_BASE_MS: i64 = 1000;

/// Retry budget and exponential backoff for delivery attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay_ms: BACKOFF_BASE_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay after the n-th failed attempt: base * 2^(n-1).
    pub fn backoff_ms(&self, attempt: u32) -> i64 {
        let exp = attempt.saturating_sub(1).min(32);
        self.base_delay_ms.saturating_mul(1_i64 << exp)
    }

    /// `failed` entries are never picked up here; they wait for a manual retry.
    pub fn is_eligible(&self, item: &Submission, now: i64) -> bool {
        item.status == SubmissionStatus::Pending
            && item.next_attempt_at.is_none_or(|at| now >= at)
    }

    pub fn on_success(&self) -> SubmissionPatch {
        SubmissionPatch {
            status: Some(SubmissionStatus::Sent),
            next_attempt_at: Some(None),
            ..Default::default()
        }
    }

    pub fn on_failure(&self, item: &Submission, now: i64) -> SubmissionPatch {
        let attempts = item.attempts.saturating_add(1);
        if attempts >= self.max_retries {
            SubmissionPatch {
                status: Some(SubmissionStatus::Failed),
                attempts: Some(attempts),
                next_attempt_at: Some(None),
                ..Default::default()
            }
        } else {
            SubmissionPatch {
                status: Some(SubmissionStatus::Pending),
                attempts: Some(attempts),
                next_attempt_at: Some(Some(now.saturating_add(self.backoff_ms(attempts)))),
                ..Default::default()
            }
        }
    }

    pub fn manual_retry(&self, now: i64) -> SubmissionPatch {
        SubmissionPatch {
            status: Some(SubmissionStatus::Pending),
            attempts: Some(0),
            next_attempt_at: Some(Some(now)),
            ..Default::default()
        }
    }
}
