use axum::extract::State;
use axum::Json;

use crate::engine::{SyncReport, Trigger};
use crate::notify::NotificationEntry;
use crate::state::SharedState;

/// Run a sync now and wait for it. Skipped runs are reported, not errors.
pub async fn run(State(state): State<SharedState>) -> Json<SyncReport> {
    Json(state.engine.sync(Trigger::Manual).await)
}

pub async fn notifications(State(state): State<SharedState>) -> Json<Vec<NotificationEntry>> {
    Json(state.notifications.recent())
}
