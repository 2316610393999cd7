//! Application state
//!
//! Holds configuration and the shared components handed to HTTP handlers

use crate::activity_store::ActivityStore;
use crate::audit_log::JsonArrayLog;
use crate::controller::DashboardController;
use crate::ingest_service::IngestCommand;
use crate::realtime_hub::RealtimeHub;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Topic suffixes subscribed under the deployment namespace
pub const DEFAULT_TOPIC_SUFFIXES: [&str; 7] = [
    "event",
    "sensor_diagnostics",
    "sensor-diagnostics",
    "boxes",
    "alarm",
    "tracking",
    "speed_event",
];

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL
    pub database_url: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Broker endpoint (wss://, ws://, mqtts:// or mqtt://)
    pub mqtt_url: String,
    /// Broker username
    pub mqtt_username: Option<String>,
    /// Broker password
    pub mqtt_password: Option<String>,
    /// Topic namespace, e.g. "Flasheye/flasheye-edge-35"
    pub mqtt_namespace: String,
    /// Client id prefix (a timestamp is appended per connection)
    pub mqtt_client_prefix: String,
    /// Snapshot cache directory
    pub snapshot_dir: PathBuf,
    /// Event log file (JSON array)
    pub event_log_path: PathBuf,
    /// Deployment history file (JSON array)
    pub deployment_log_path: PathBuf,
    /// Remote activity API. When unset, activities are written to the database directly.
    pub activity_api_url: Option<String>,
    /// Deployment environment recorded on persisted activities
    pub environment: String,
    /// Pipeline tuning
    pub ingest: IngestConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "mysql://root@localhost/gymwatch".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            mqtt_url: std::env::var("MQTT_URL")
                .unwrap_or_else(|_| "wss://localhost:8884/mqtt".to_string()),
            mqtt_username: std::env::var("MQTT_USERNAME").ok(),
            mqtt_password: std::env::var("MQTT_PASSWORD").ok(),
            mqtt_namespace: std::env::var("MQTT_NAMESPACE")
                .unwrap_or_else(|_| "Flasheye/flasheye-edge-35".to_string()),
            mqtt_client_prefix: std::env::var("MQTT_CLIENT_PREFIX")
                .unwrap_or_else(|_| "gymwatch".to_string()),
            snapshot_dir: std::env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/gymwatch/snapshots")),
            event_log_path: std::env::var("EVENT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("logs.json")),
            deployment_log_path: std::env::var("DEPLOYMENT_LOG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("deployment-log.json")),
            activity_api_url: std::env::var("ACTIVITY_API_URL").ok(),
            environment: environment_from(std::env::var("APP_ENV").ok().as_deref()),
            ingest: IngestConfig::default(),
        }
    }
}

impl AppConfig {
    /// Full topic names to subscribe on every connect
    pub fn topics(&self) -> Vec<String> {
        let namespace = self.mqtt_namespace.trim_end_matches('/');
        let mut topics: Vec<String> = DEFAULT_TOPIC_SUFFIXES
            .iter()
            .map(|suffix| format!("{}/{}", namespace, suffix))
            .collect();
        topics.push(format!("{}/heartbeat/#", namespace));
        topics
    }
}

/// Anything other than "development" is treated as production
fn environment_from(value: Option<&str>) -> String {
    match value {
        Some("development") => "development".to_string(),
        _ => "production".to_string(),
    }
}

/// Ingest pipeline constants
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay: Duration,
    /// Consecutive reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// A sensor silent for longer than this is offline
    pub liveness_timeout: Duration,
    /// How often the liveness sweep runs
    pub sweep_interval: Duration,
    /// MQTT keep-alive
    pub keep_alive: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 5,
            liveness_timeout: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
            keep_alive: Duration::from_secs(30),
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Owner of the derived dashboard state
    pub controller: Arc<DashboardController>,
    /// Persisted activity store
    pub activity_store: Arc<dyn ActivityStore>,
    /// RealtimeHub (WebSocket)
    pub realtime: Arc<RealtimeHub>,
    /// Commands into the ingest loop
    pub ingest: mpsc::Sender<IngestCommand>,
    /// Client-submitted event log
    pub event_log: Arc<JsonArrayLog>,
    /// Deployment history
    pub deployment_log: Arc<JsonArrayLog>,
}
