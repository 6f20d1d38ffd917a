use std::sync::Arc;

use tokio::sync::watch;

use crate::engine::{SyncEngine, Trigger, TriggerReceiver};

/// Subscribe the sync engine to its trigger sources and run until shutdown.
///
/// Each trigger spawns one scheduling attempt. Attempts that arrive while a
/// run is active are dropped by the engine, not queued here. There is no
/// timer: an offline queue drains only when one of the triggers fires.
pub fn spawn(
    engine: Arc<SyncEngine>,
    mut triggers: TriggerReceiver,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let mut network = engine.network().subscribe();
    // Read before spawning so a change made before the task first runs is
    // still seen as an edge.
    let mut online = *network.borrow_and_update();

    tokio::spawn(async move {
        tracing::info!("Sync scheduler started (network {})", status_label(online));

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                trigger = triggers.recv() => {
                    match trigger {
                        Some(trigger) => schedule(&engine, trigger),
                        None => break,
                    }
                }
                changed = network.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *network.borrow_and_update();
                    if now_online && !online {
                        schedule(&engine, Trigger::OnlineTransition);
                    }
                    online = now_online;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Sync scheduler stopped");
    })
}

fn schedule(engine: &Arc<SyncEngine>, trigger: Trigger) {
    let engine = engine.clone();
    tokio::spawn(async move {
        let report = engine.sync(trigger).await;
        match report.skipped {
            Some(reason) => tracing::debug!("Sync ({trigger:?}) skipped: {reason:?}"),
            None => tracing::info!(
                "Sync ({trigger:?}) finished: {} attempted, {} delivered, {} failed",
                report.attempted,
                report.delivered,
                report.failed
            ),
        }
    });
}

fn status_label(online: bool) -> &'static str {
    if online { "online" } else { "offline" }
}
