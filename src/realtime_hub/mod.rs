//! RealtimeHub - WebSocket Distribution
//!
//! ## Responsibilities
//!
//! - WebSocket connection management
//! - Fan-out of pipeline updates to dashboards
//!
//! Messages are notifications; dashboards fetch full state via
//! GET /api/dashboard on connect.

use crate::aggregates::{AlarmEntry, BallAlert, LayoutState, ZoneActivity, ZoneHeat};
use crate::controller::ResetSummary;
use crate::reconnect_supervisor::ConnectionState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub message types
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HubMessage {
    OccupancyUpdate(OccupancyUpdateMessage),
    ZoneActivity(ZoneActivity),
    Alarm(AlarmEntry),
    SensorStatus(SensorStatusMessage),
    ConnectionStatus(ConnectionStatusMessage),
    LayoutUpdate(LayoutState),
    BallAlert(BallAlert),
    DashboardReset(ResetSummary),
}

impl HubMessage {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::OccupancyUpdate(_) => "occupancy_update",
            Self::ZoneActivity(_) => "zone_activity",
            Self::Alarm(_) => "alarm",
            Self::SensorStatus(_) => "sensor_status",
            Self::ConnectionStatus(_) => "connection_status",
            Self::LayoutUpdate(_) => "layout_update",
            Self::BallAlert(_) => "ball_alert",
            Self::DashboardReset(_) => "dashboard_reset",
        }
    }
}

/// Occupancy counts with heat buckets
#[derive(Debug, Clone, Serialize)]
pub struct OccupancyUpdateMessage {
    pub zones: Vec<ZoneHeat>,
}

/// Sensor online/offline transition
#[derive(Debug, Clone, Serialize)]
pub struct SensorStatusMessage {
    pub sensor_id: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
}

/// Broker connection state change
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatusMessage {
    pub state: ConnectionState,
    pub reason: String,
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new client
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        self.connections
            .write()
            .await
            .insert(id, ClientConnection { id, tx });
        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Dashboard client connected");

        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Dashboard client disconnected");
        }
    }

    /// Broadcast message to all clients
    pub async fn broadcast(&self, message: HubMessage) {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let connections = self.connections.read().await;
        tracing::debug!(
            message_type = message.message_type(),
            client_count = connections.len(),
            "Broadcasting"
        );

        for conn in connections.values() {
            if let Err(e) = conn.tx.send(json.clone()) {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send message");
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
