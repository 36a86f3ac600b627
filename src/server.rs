use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::accounts::AccountStore;
use crate::api::{self, state::AppState};
use crate::clock::SystemClock;
use crate::config::{Config, StorageProvider};
use crate::observability::Metrics;
use crate::pipeline::PipelineDeps;
use crate::provider::{HttpMeetingProvider, ProviderHttpConfig};
use crate::queue::{
    DownloadQueueWorker, HttpDispatcher, HttpNotificationSender, NotificationStore,
    NotificationWorker, TaskStore,
};
use crate::recordings::{HttpTrimmer, RecordingStore};
use crate::storage::StorageClient;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Wire everything and serve until shutdown.
///
/// The Fjall keyspace is opened exactly once here and every store hangs
/// off it; the queue loops are spawned before the listener starts so a
/// restart resumes pending work immediately.
pub async fn run(address: SocketAddr) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Arc::new(Config::load().map_err(|e| format!("Failed to load config: {e}"))?);

    info!(path = %config.server.store_path.display(), "Opening keyspace");
    let keyspace = fjall::Config::new(&config.server.store_path).open()?;

    let http = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.provider.connect_timeout_secs))
        .timeout(Duration::from_secs(config.provider.request_timeout_secs))
        .build()?;

    let clock = Arc::new(SystemClock);
    let metrics = Arc::new(Metrics::new());

    let accounts = Arc::new(AccountStore::open(
        &keyspace,
        http.clone(),
        config.provider.oauth_token_url.clone(),
    )?);
    let tasks = Arc::new(TaskStore::open(&keyspace)?);
    let notifications = Arc::new(NotificationStore::open(&keyspace)?);
    let recordings = Arc::new(RecordingStore::open(&keyspace)?);

    let storage = Arc::new(match config.storage.provider {
        StorageProvider::Local => StorageClient::local(&config.storage.root)?,
        StorageProvider::Memory => StorageClient::in_memory(),
    });

    let provider = Arc::new(HttpMeetingProvider::new(
        ProviderHttpConfig {
            api_base: config.provider.api_base.clone(),
            connect_timeout: Duration::from_secs(config.provider.connect_timeout_secs),
            request_timeout: Duration::from_secs(config.provider.request_timeout_secs),
        },
        accounts.clone(),
        clock.clone(),
    )?);

    let pipeline = Arc::new(PipelineDeps {
        provider,
        clock: clock.clone(),
        tasks: tasks.clone(),
        recordings: recordings.clone(),
        storage: storage.clone(),
        poll_policy: config.poller.poll_policy(),
        fetch_policy: config.fetcher.fetch_policy(),
        metrics: metrics.clone(),
    });

    // Download queue loop
    let dispatcher = Arc::new(HttpDispatcher::new(
        http.clone(),
        config.queue.dispatch_url.clone(),
    ));
    let download_worker = DownloadQueueWorker::new(
        tasks.clone(),
        dispatcher,
        clock.clone(),
        Duration::from_secs(config.queue.scan_interval_secs),
        Duration::from_secs(config.queue.stale_after_secs),
        metrics.clone(),
    );
    tokio::spawn(download_worker.run());

    // Notification loop + its error-retry sweep, on independent cadences
    let sender = Arc::new(HttpNotificationSender::new(
        http.clone(),
        config.notifications.endpoint.clone(),
    ));
    let notification_worker = Arc::new(NotificationWorker::new(
        notifications,
        sender,
        clock,
        Duration::from_secs(config.notifications.scan_interval_secs),
        Duration::from_secs(config.notifications.error_retry_interval_secs),
        metrics,
    ));
    tokio::spawn(notification_worker.clone().run_main());
    tokio::spawn(notification_worker.run_error_sweep());

    let trimmer = Arc::new(HttpTrimmer::new(http, config.encoder.endpoint.clone()));
    let state = AppState::new(config, pipeline, trimmer);

    let app = api::router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Lectoria API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush the keyspace on the way out
    tasks.persist()?;
    recordings.persist()?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
