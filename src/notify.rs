use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

/// Fire-and-forget events the engine reports to whoever shows them to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    StorageDegraded { error: String },
    Queued { id: String },
    Updated { id: String },
    SyncStarted { count: usize },
    SyncCompleted { delivered: usize },
    ItemFailed { id: String, attempts: u32, error: String },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEntry {
    pub at: i64,
    #[serde(flatten)]
    pub notification: Notification,
}

/// Logs every notification and keeps the most recent ones for display.
/// Per-item failures are logged only, never kept.
pub struct NotificationCenter {
    capacity: usize,
    recent: Mutex<VecDeque<NotificationEntry>>,
}

impl NotificationCenter {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<NotificationEntry> {
        let recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.iter().cloned().collect()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::StorageDegraded { error } => {
                tracing::warn!("Storage unavailable, running with an in-memory queue: {error}");
            }
            Notification::Queued { id } => tracing::info!("Submission {id} queued"),
            Notification::Updated { id } => tracing::info!("Submission {id} updated"),
            Notification::SyncStarted { count } => {
                tracing::info!("Sync started: attempting {count} submission(s)");
            }
            Notification::SyncCompleted { delivered } => {
                tracing::info!("Sync complete: {delivered} submission(s) sent");
            }
            Notification::ItemFailed { id, attempts, error } => {
                tracing::warn!("Submission {id} failed (attempt {attempts}): {error}");
                return;
            }
        }

        if self.capacity == 0 {
            return;
        }
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(NotificationEntry {
            at: chrono::Utc::now().timestamp_millis(),
            notification,
        });
    }
}
