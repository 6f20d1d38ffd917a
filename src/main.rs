use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use formqueue::clock::{Clock, SystemClock};
use formqueue::config::Config;
use formqueue::corrections::HttpCorrectionProvider;
use formqueue::db::{self, SubmissionStore};
use formqueue::delivery::HttpDelivery;
use formqueue::engine::SyncEngine;
use formqueue::network::{self, NetworkMonitor};
use formqueue::notify::NotificationCenter;
use formqueue::state::{AppState, Corrections, SharedState};
use formqueue::{housekeeping, worker};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Load config
    let config = Config::from_env().expect("Failed to load configuration");

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(&config.log_level)
        }))
        .init();

    tracing::info!("Starting formqueue");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Storage backend is chosen once and never switched
    let backend = db::select_backend(&config.storage);
    tracing::info!("Using {} storage", backend.kind().as_str());
    let store = SubmissionStore::new(backend);

    if let Some(age) = config.purge_sent_after {
        let age = i64::try_from(age.as_millis()).unwrap_or(i64::MAX);
        let cutoff = clock.now_millis().saturating_sub(age);
        if let Err(e) = housekeeping::purge_sent(&store, cutoff).await {
            tracing::warn!("Housekeeping skipped: {e}");
        }
    }

    let delivery = Arc::new(HttpDelivery::new(
        config.delivery_url.clone(),
        config.delivery_timeout,
    )?);
    let notifications = Arc::new(NotificationCenter::new(50));
    let network = NetworkMonitor::new(config.start_online);

    let (engine, triggers) = SyncEngine::new(
        store,
        delivery,
        notifications.clone(),
        clock,
        config.retry,
        network.clone(),
    );

    let scheduler = worker::spawn(engine.clone(), triggers, shutdown_rx.clone());
    engine.load().await;

    let probe = config.probe_interval.map(|interval| {
        network::spawn_probe(
            network.clone(),
            config.delivery_url.clone(),
            interval,
            shutdown_rx.clone(),
        )
    });

    let corrections = match &config.corrections {
        Some(c) => Some(Corrections {
            provider: Arc::new(HttpCorrectionProvider::new(c.url.clone(), c.timeout)?),
            form_name: c.form_name.clone(),
        }),
        None => None,
    };

    let state: SharedState = Arc::new(AppState {
        engine,
        notifications,
        corrections,
    });

    let addr = SocketAddr::new(config.host, config.port);
    let app = formqueue::build_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    let _ = scheduler.await;
    if let Some(probe) = probe {
        let _ = probe.await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
