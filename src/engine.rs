//! The offline submission queue and its sync engine.
//!
//! `SyncEngine` is the single writer of the in-memory queue. Every mutation is
//! a `Transition` applied under a short lock (never held across an await),
//! followed by a write to the submission store, so the durable copy can lag
//! the in-memory one by at most one step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::clock::Clock;
use crate::corrections::Correction;
use crate::db::SubmissionStore;
use crate::delivery::DeliveryEndpoint;
use crate::error::QueueError;
use crate::models::{FormData, Submission, SubmissionStatus};
use crate::network::NetworkMonitor;
use crate::notify::{Notification, Notifier};
use crate::queue::{QueueState, RetryPolicy, SubmissionPatch, Transition};

/// Why a scheduling attempt was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    OnlineTransition,
    ItemAdded,
    ManualRetry,
    StorageReady,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    NotReady,
    AlreadyRunning,
    NothingEligible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub trigger: Trigger,
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: Option<SkipReason>,
}

impl SyncReport {
    fn skipped(trigger: Trigger, reason: SkipReason) -> Self {
        Self {
            trigger,
            attempted: 0,
            delivered: 0,
            failed: 0,
            skipped: Some(reason),
        }
    }
}

pub type TriggerReceiver = mpsc::UnboundedReceiver<Trigger>;

pub struct SyncEngine {
    state: Mutex<QueueState>,
    ready: AtomicBool,
    /// Storage failed to come up; the queue lives in memory only.
    degraded: AtomicBool,
    store: SubmissionStore,
    delivery: Arc<dyn DeliveryEndpoint>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    network: NetworkMonitor,
    triggers: mpsc::UnboundedSender<Trigger>,
}

/// Clears the in-progress flag when a run ends, however it ends.
struct RunGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.engine.commit(Transition::SyncEnd);
    }
}

impl SyncEngine {
    pub fn new(
        store: SubmissionStore,
        delivery: Arc<dyn DeliveryEndpoint>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        network: NetworkMonitor,
    ) -> (Arc<Self>, TriggerReceiver) {
        let (triggers, rx) = mpsc::unbounded_channel();
        let engine = Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            ready: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
            store,
            delivery,
            notifier,
            clock,
            policy,
            network,
            triggers,
        });
        (engine, rx)
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a transition that cannot be rejected.
    fn commit(&self, transition: Transition) {
        let mut state = self.lock();
        match state.apply(transition) {
            Ok(next) => *state = next,
            Err(e) => tracing::error!("Rejected queue transition: {e}"),
        }
    }

    fn update(&self, id: &str, patch: SubmissionPatch) -> Result<Submission, QueueError> {
        let mut state = self.lock();
        let next = state.apply(Transition::Update {
            id: id.to_string(),
            patch,
        })?;
        let updated = next
            .get(id)
            .cloned()
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        *state = next;
        Ok(updated)
    }

    fn ensure_ready(&self) -> Result<(), QueueError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(QueueError::NotReady)
        }
    }

    fn request(&self, trigger: Trigger) {
        if self.network.is_online() {
            let _ = self.triggers.send(trigger);
        }
    }

    /// Write one entry through to storage. A no-op once storage is degraded.
    async fn persist(&self, item: &Submission) -> Result<(), QueueError> {
        if self.is_degraded() {
            return Ok(());
        }
        self.store.add_or_update(item).await?;
        Ok(())
    }

    async fn persist_logged(&self, item: &Submission) {
        if let Err(e) = self.persist(item).await {
            tracing::error!(
                "Failed to persist submission {} ({}): {e}",
                item.id,
                item.status
            );
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn is_syncing(&self) -> bool {
        self.lock().syncing
    }

    pub fn snapshot(&self) -> QueueState {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<Submission> {
        self.lock().get(id).cloned()
    }

    pub fn network(&self) -> &NetworkMonitor {
        &self.network
    }

    /// Bring up storage and load the queue. A storage failure is reported and
    /// the queue starts empty and in-memory only; the engine is ready either way.
    pub async fn load(&self) {
        let loaded = match self.store.initialize().await {
            Ok(()) => self.store.list().await,
            Err(e) => Err(e),
        };

        match loaded {
            Ok(items) => {
                let mut interrupted = Vec::new();
                let items: Vec<Submission> = items
                    .into_iter()
                    .map(|mut item| {
                        // Left over from a run that never finished.
                        if item.status == SubmissionStatus::Sending {
                            item.status = SubmissionStatus::Pending;
                            interrupted.push(item.clone());
                        }
                        item
                    })
                    .collect();

                tracing::info!(
                    "Loaded {} submission(s) from {} storage",
                    items.len(),
                    self.store.kind().as_str()
                );
                self.commit(Transition::LoadAll(items));

                for item in &interrupted {
                    tracing::info!("Requeueing interrupted submission {}", item.id);
                    self.persist_logged(item).await;
                }
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Release);
                self.notifier.notify(Notification::StorageDegraded {
                    error: e.to_string(),
                });
                self.commit(Transition::LoadAll(Vec::new()));
            }
        }

        self.ready.store(true, Ordering::Release);
        self.request(Trigger::StorageReady);
    }

    /// Queue a new entry. The entry only becomes visible to runs once it is
    /// stored, so a failed write leaves nothing behind to deliver.
    pub async fn add(&self, form_data: FormData) -> Result<Submission, QueueError> {
        self.ensure_ready()?;

        let submission = Submission::new(form_data, self.clock.now_millis());
        // Reject duplicates before touching storage.
        self.lock().apply(Transition::Add(submission.clone()))?;
        self.persist(&submission).await?;
        {
            let mut state = self.lock();
            *state = state.apply(Transition::Add(submission.clone()))?;
        }

        self.notifier.notify(Notification::Queued {
            id: submission.id.clone(),
        });
        self.request(Trigger::ItemAdded);
        Ok(submission)
    }

    /// Manual retry of a `failed` entry: attempts reset, eligible immediately.
    pub async fn retry(&self, id: &str) -> Result<Submission, QueueError> {
        self.ensure_ready()?;

        let current = self
            .get(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if current.status != SubmissionStatus::Failed {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                status: current.status,
            });
        }

        let updated = self.update(id, self.policy.manual_retry(self.clock.now_millis()))?;
        self.persist(&updated).await?;

        self.request(Trigger::ManualRetry);
        Ok(updated)
    }

    /// Replace the payload of an unsent entry. Status and attempts are kept.
    pub async fn update_form_data(
        &self,
        id: &str,
        form_data: FormData,
    ) -> Result<Submission, QueueError> {
        self.ensure_ready()?;

        let current = self
            .get(id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        if !matches!(
            current.status,
            SubmissionStatus::Pending | SubmissionStatus::Failed
        ) {
            return Err(QueueError::InvalidState {
                id: id.to_string(),
                status: current.status,
            });
        }

        let updated = self.update(id, SubmissionPatch::form_data(form_data))?;
        self.persist(&updated).await?;

        self.notifier.notify(Notification::Updated { id: id.to_string() });
        Ok(updated)
    }

    /// Apply one suggested field value to its entry's payload.
    pub async fn accept_correction(&self, correction: &Correction) -> Result<Submission, QueueError> {
        let current = self
            .get(&correction.id)
            .ok_or_else(|| QueueError::NotFound(correction.id.clone()))?;

        let mut form_data = current.form_data;
        form_data.insert(correction.field.clone(), correction.suggested_value.clone());
        self.update_form_data(&correction.id, form_data).await
    }

    /// Entries a correction pass may look at, newest first.
    pub fn unsent(&self) -> Vec<Submission> {
        self.lock()
            .submissions
            .iter()
            .filter(|s| matches!(s.status, SubmissionStatus::Pending | SubmissionStatus::Failed))
            .cloned()
            .collect()
    }

    /// One scheduling attempt. Dropped if a run is active, the network is
    /// offline, or storage has not been loaded yet.
    pub async fn sync(&self, trigger: Trigger) -> SyncReport {
        if !self.is_ready() {
            return SyncReport::skipped(trigger, SkipReason::NotReady);
        }
        if !self.network.is_online() {
            return SyncReport::skipped(trigger, SkipReason::Offline);
        }

        let now = self.clock.now_millis();
        let batch = {
            let mut state = self.lock();
            match state.apply(Transition::SyncStart) {
                Ok(next) => *state = next,
                Err(_) => {
                    tracing::debug!("Sync already running, dropping {trigger:?} trigger");
                    return SyncReport::skipped(trigger, SkipReason::AlreadyRunning);
                }
            }
            state.eligible(&self.policy, now)
        };
        let _guard = RunGuard { engine: self };

        if batch.is_empty() {
            return SyncReport::skipped(trigger, SkipReason::NothingEligible);
        }

        tracing::debug!("Sync run ({trigger:?}) with {} item(s)", batch.len());
        self.notifier.notify(Notification::SyncStarted { count: batch.len() });

        let mut report = SyncReport {
            trigger,
            attempted: 0,
            delivered: 0,
            failed: 0,
            skipped: None,
        };

        for item in &batch {
            match self.attempt(&item.id).await {
                Some(true) => report.delivered += 1,
                Some(false) => report.failed += 1,
                None => continue,
            }
            report.attempted += 1;
        }

        self.notifier.notify(Notification::SyncCompleted {
            delivered: report.delivered,
        });
        report
    }

    /// Deliver one entry. `None` if it is no longer pending.
    async fn attempt(&self, id: &str) -> Option<bool> {
        let sending = {
            let mut state = self.lock();
            if state.get(id)?.status != SubmissionStatus::Pending {
                return None;
            }
            let next = state
                .apply(Transition::Update {
                    id: id.to_string(),
                    patch: SubmissionPatch::status(SubmissionStatus::Sending),
                })
                .ok()?;
            *state = next;
            state.get(id)?.clone()
        };
        self.persist_logged(&sending).await;

        let outcome = self.delivery.deliver(&sending.form_data).await;

        let patch = match &outcome {
            Ok(()) => self.policy.on_success(),
            Err(_) => self.policy.on_failure(&sending, self.clock.now_millis()),
        };
        let finished = match self.update(id, patch) {
            Ok(item) => item,
            Err(e) => {
                tracing::error!("Failed to record outcome for submission {id}: {e}");
                return Some(outcome.is_ok());
            }
        };
        self.persist_logged(&finished).await;

        match outcome {
            Ok(()) => {
                tracing::debug!("Submission {id} delivered");
                Some(true)
            }
            Err(e) => {
                self.notifier.notify(Notification::ItemFailed {
                    id: id.to_string(),
                    attempts: finished.attempts,
                    error: e.to_string(),
                });
                Some(false)
            }
        }
    }
}
