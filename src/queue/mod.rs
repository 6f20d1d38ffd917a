//! In-memory queue state and its transitions.
//!
//! `QueueState::apply` is a pure function: it never touches storage and
//! returns a new state. Persistence and notifications are sequenced by the
//! engine after a transition succeeds.

pub mod policy;

use serde::Serialize;

use crate::models::{FormData, Submission, SubmissionStatus};

pub use policy::RetryPolicy;

/// Named fields merged into an existing entry by `Transition::Update`.
/// `next_attempt_at: Some(None)` clears the field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPatch {
    pub status: Option<SubmissionStatus>,
    pub attempts: Option<u32>,
    pub next_attempt_at: Option<Option<i64>>,
    pub form_data: Option<FormData>,
}

impl SubmissionPatch {
    pub fn status(status: SubmissionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn form_data(form_data: FormData) -> Self {
        Self {
            form_data: Some(form_data),
            ..Default::default()
        }
    }

    fn merge_into(self, item: &mut Submission) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(attempts) = self.attempts {
            item.attempts = attempts;
        }
        if let Some(next) = self.next_attempt_at {
            item.next_attempt_at = next;
        }
        if let Some(form_data) = self.form_data {
            item.form_data = form_data;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Transition {
    LoadAll(Vec<Submission>),
    Add(Submission),
    Update { id: String, patch: SubmissionPatch },
    SyncStart,
    SyncEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    DuplicateId(String),
    SyncInProgress,
    Terminal(String),
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::DuplicateId(id) => write!(f, "Submission {id} already queued"),
            TransitionError::SyncInProgress => write!(f, "A sync run is already in progress"),
            TransitionError::Terminal(id) => write!(f, "Submission {id} was already sent"),
        }
    }
}

impl std::error::Error for TransitionError {}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueState {
    /// Newest first.
    pub submissions: Vec<Submission>,
    pub syncing: bool,
}

impl QueueState {
    pub fn apply(&self, transition: Transition) -> Result<QueueState, TransitionError> {
        match transition {
            Transition::LoadAll(items) => Ok(QueueState {
                submissions: items,
                syncing: self.syncing,
            }),
            Transition::Add(item) => {
                if self.get(&item.id).is_some() {
                    return Err(TransitionError::DuplicateId(item.id));
                }
                let mut submissions = Vec::with_capacity(self.submissions.len() + 1);
                submissions.push(item);
                submissions.extend(self.submissions.iter().cloned());
                Ok(QueueState {
                    submissions,
                    syncing: self.syncing,
                })
            }
            Transition::Update { id, patch } => {
                let Some(current) = self.get(&id) else {
                    return Ok(self.clone());
                };
                if current.status == SubmissionStatus::Sent {
                    return Err(TransitionError::Terminal(id));
                }
                let mut next = self.clone();
                if let Some(item) = next.submissions.iter_mut().find(|s| s.id == id) {
                    patch.merge_into(item);
                }
                Ok(next)
            }
            Transition::SyncStart => {
                if self.syncing {
                    return Err(TransitionError::SyncInProgress);
                }
                Ok(QueueState {
                    submissions: self.submissions.clone(),
                    syncing: true,
                })
            }
            Transition::SyncEnd => Ok(QueueState {
                submissions: self.submissions.clone(),
                syncing: false,
            }),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Submission> {
        self.submissions.iter().find(|s| s.id == id)
    }

    /// Entries a run may attempt at `now`, oldest first.
    pub fn eligible(&self, policy: &RetryPolicy, now: i64) -> Vec<Submission> {
        let mut items: Vec<Submission> = self
            .submissions
            .iter()
            .filter(|s| policy.is_eligible(s, now))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        items
    }
}
