use std::time::Duration;

use tokio::sync::watch;

/// Online/offline state shared between whoever observes connectivity and the
/// sync scheduler.
#[derive(Clone)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>,
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Returns true if the state actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!("Network is now {}", if online { "online" } else { "offline" });
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Periodically probe `url`; any HTTP response counts as online.
pub fn spawn_probe(
    monitor: NetworkMonitor,
    url: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let client = match reqwest::Client::builder().timeout(interval).build() {
            Ok(client) => client,
            Err(e) => {
                tracing::error!("Network probe disabled: {e}");
                return;
            }
        };

        loop {
            if *shutdown.borrow() {
                break;
            }

            let online = client.head(&url).send().await.is_ok();
            monitor.set_online(online);

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Network probe stopped");
    })
}
