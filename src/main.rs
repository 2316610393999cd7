//! Gymwatch - live gym-floor dashboard
//!
//! Main entry point for the dashboard server.

use gymwatch::{
    activity_store::{ActivityStore, MySqlActivityStore},
    audit_log::JsonArrayLog,
    controller::DashboardController,
    forwarder::{ActivityForwarder, HttpForwarder, StoreForwarder},
    ingest_service::{BrokerSettings, IngestService},
    realtime_hub::RealtimeHub,
    snapshot_store::{FileSnapshotStore, Snapshots},
    state::{AppConfig, AppState},
    transport::{Credentials, MqttTransport},
    web_api,
};
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gymwatch=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Gymwatch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        mqtt_url = %config.mqtt_url,
        namespace = %config.mqtt_namespace,
        environment = %config.environment,
        snapshot_dir = %config.snapshot_dir.display(),
        activity_api = config.activity_api_url.as_deref().unwrap_or("direct"),
        "Configuration loaded"
    );

    // Create database pool
    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database_url)
        .await?;

    tracing::info!("Database connected");

    let mysql_store = MySqlActivityStore::new(pool.clone(), config.environment.clone());
    mysql_store.ensure_schema().await?;
    let activity_store: Arc<dyn ActivityStore> = Arc::new(mysql_store);
    tracing::info!("ActivityStore initialized");

    let forwarder: Arc<dyn ActivityForwarder> = match &config.activity_api_url {
        Some(url) => Arc::new(HttpForwarder::new(url)?),
        None => Arc::new(StoreForwarder::new(activity_store.clone())),
    };

    // Snapshot cache; an unusable directory falls back to memory
    let snapshots = match FileSnapshotStore::new(&config.snapshot_dir) {
        Ok(store) => Snapshots::new(Box::new(store)),
        Err(e) => {
            tracing::warn!(
                dir = %config.snapshot_dir.display(),
                error = %e,
                "Snapshot directory unavailable, using in-memory snapshots"
            );
            Snapshots::in_memory()
        }
    };

    let realtime = Arc::new(RealtimeHub::new());
    let controller = Arc::new(DashboardController::restore(
        snapshots,
        forwarder,
        realtime.clone(),
    ));
    tracing::info!("DashboardController initialized");

    // Start ingest service
    let (command_tx, command_rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let broker = BrokerSettings {
        url: config.mqtt_url.clone(),
        client_prefix: config.mqtt_client_prefix.clone(),
        credentials: config.mqtt_username.clone().map(|username| Credentials {
            username,
            password: config.mqtt_password.clone().unwrap_or_default(),
        }),
        topics: config.topics(),
    };
    let ingest = IngestService::new(
        Arc::new(MqttTransport::new()),
        controller.clone(),
        broker,
        config.ingest.clone(),
    )
    .spawn(command_rx, shutdown_rx);
    tracing::info!("IngestService started");

    let state = AppState {
        event_log: Arc::new(JsonArrayLog::new(&config.event_log_path)),
        deployment_log: Arc::new(JsonArrayLog::new(&config.deployment_log_path)),
        config,
        controller,
        activity_store,
        realtime,
        ingest: command_tx,
    };

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown requested");
        })
        .await?;

    shutdown_tx.send(true).ok();
    if let Err(e) = ingest.await {
        tracing::error!(error = %e, "Ingest service task failed");
    }
    pool.close().await;

    Ok(())
}
