//! Dashboard Controller
//!
//! ## Responsibilities
//!
//! - Sole owner of [`DashboardState`]
//! - Classify each message, fold it into every aggregate, snapshot what changed
//! - Forward zone events to the activity store
//! - Notify dashboards through the [`RealtimeHub`]
//!
//! Messages are handled one at a time under the state lock, so updates from
//! different messages never interleave. Snapshots are encoded under that lock
//! and written afterwards on the blocking pool, in lock order.

mod view;

pub use view::{ConnectionView, DashboardView, SensorView};

use crate::aggregates::{
    Aggregate, AlarmLog, BallAlert, ConnectionLog, ConnectionStatus, DashboardState, LayoutState,
    MemberPaths, ObjectCounts, Occupancy, PresenceGauges, SensorLiveness, SensorStatusEvent,
    TrackingLog, ZoneActivityLog,
};
use crate::classifier::{classify_all, ClassifiedEvent};
use crate::forwarder::ActivityForwarder;
use crate::realtime_hub::{
    ConnectionStatusMessage, HubMessage, OccupancyUpdateMessage, RealtimeHub, SensorStatusMessage,
};
use crate::reconnect_supervisor::ConnectionState;
use crate::snapshot_store::Snapshots;
use crate::transport::RawMessage;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Aggregates cleared by [`DashboardController::reset`]
pub const RESETTABLE: [&str; 5] = [
    Occupancy::NAME,
    ObjectCounts::NAME,
    ZoneActivityLog::NAME,
    MemberPaths::NAME,
    ConnectionLog::NAME,
];

/// Encoded snapshots waiting to be written, latest value per aggregate
type PendingSnapshots = Vec<(&'static str, Value)>;

/// Outcome of an operator reset
#[derive(Debug, Clone, Serialize)]
pub struct ResetSummary {
    pub cleared: Vec<&'static str>,
    pub timestamp: DateTime<Utc>,
}

/// Broker link as last reported by the ingest loop
#[derive(Debug, Clone, Copy)]
struct LinkStatus {
    state: ConnectionState,
    attempts: u32,
}

pub struct DashboardController {
    state: RwLock<DashboardState>,
    link: RwLock<LinkStatus>,
    snapshots: Arc<Snapshots>,
    /// Orders snapshot writes; taken while the state lock is held
    snapshot_order: Mutex<()>,
    forwarder: Arc<dyn ActivityForwarder>,
    realtime: Arc<RealtimeHub>,
}

impl DashboardController {
    /// Start from empty state
    pub fn new(
        snapshots: Snapshots,
        forwarder: Arc<dyn ActivityForwarder>,
        realtime: Arc<RealtimeHub>,
    ) -> Self {
        Self::with_state(DashboardState::default(), snapshots, forwarder, realtime)
    }

    /// Warm start from stored snapshots
    ///
    /// The ball alert is transient and always starts cleared.
    pub fn restore(
        snapshots: Snapshots,
        forwarder: Arc<dyn ActivityForwarder>,
        realtime: Arc<RealtimeHub>,
    ) -> Self {
        let state = DashboardState {
            occupancy: snapshots.load(),
            zone_activity: snapshots.load(),
            ball_alert: BallAlert::default(),
            object_counts: snapshots.load(),
            presence: snapshots.load(),
            alarms: snapshots.load(),
            tracking: snapshots.load(),
            member_paths: snapshots.load(),
            layout: snapshots.load(),
            sensors: snapshots.load(),
            connection: snapshots.load(),
        };

        tracing::info!(
            zones = state.occupancy.counts().len(),
            activities = state.zone_activity.len(),
            sensors = state.sensors.sensors().len(),
            degraded = snapshots.is_degraded(),
            "Dashboard state restored"
        );

        Self::with_state(state, snapshots, forwarder, realtime)
    }

    fn with_state(
        state: DashboardState,
        snapshots: Snapshots,
        forwarder: Arc<dyn ActivityForwarder>,
        realtime: Arc<RealtimeHub>,
    ) -> Self {
        Self {
            state: RwLock::new(state),
            link: RwLock::new(LinkStatus {
                state: ConnectionState::Disconnected,
                attempts: 0,
            }),
            snapshots: Arc::new(snapshots),
            snapshot_order: Mutex::new(()),
            forwarder,
            realtime,
        }
    }

    /// Classify and fold one broker message
    ///
    /// Returns the number of classified events applied (0 when dropped).
    pub async fn handle_message(&self, message: &RawMessage, at: DateTime<Utc>) -> usize {
        let events = classify_all(&message.topic, &message.payload);
        if events.is_empty() {
            return 0;
        }

        let mut notices = Vec::new();
        let mut pending = PendingSnapshots::new();
        let order = {
            let mut state = self.state.write().await;

            for event in &events {
                let recovering = match event {
                    ClassifiedEvent::Diagnostics(d) => state
                        .sensors
                        .get(&d.sensor_id)
                        .is_some_and(|record| !record.is_online),
                    _ => false,
                };

                let changed = state.apply(event, at);
                stage(&state, &changed, &mut pending);

                if let ClassifiedEvent::ZoneEvent(zone_event) = event {
                    self.forwarder.forward(zone_event, at);
                }

                notices.extend(notices_for(&state, event, &changed, recovering));
            }
            self.snapshot_order.lock().await
        };
        self.flush(pending, order).await;

        tracing::debug!(
            topic = %message.topic,
            events = events.len(),
            "Message applied"
        );

        for notice in notices {
            self.realtime.broadcast(notice).await;
        }

        events.len()
    }

    /// Mark silent sensors offline; returns their ids
    pub async fn sweep_liveness(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let mut pending = PendingSnapshots::new();
        let (notices, order): (Vec<HubMessage>, _) = {
            let mut state = self.state.write().await;
            let lost = state.sensors.sweep(now, timeout);
            if lost.is_empty() {
                return Vec::new();
            }
            stage(&state, &[SensorLiveness::NAME], &mut pending);

            let notices = lost
                .iter()
                .filter(|(_, event)| *event == SensorStatusEvent::Lost)
                .filter_map(|(sensor_id, _)| {
                    state.sensors.get(sensor_id).map(|record| {
                        HubMessage::SensorStatus(SensorStatusMessage {
                            sensor_id: sensor_id.clone(),
                            online: false,
                            last_seen: record.last_seen,
                        })
                    })
                })
                .collect();
            (notices, self.snapshot_order.lock().await)
        };
        self.flush(pending, order).await;

        let mut offline = Vec::with_capacity(notices.len());
        for notice in notices {
            if let HubMessage::SensorStatus(status) = &notice {
                offline.push(status.sensor_id.clone());
            }
            self.realtime.broadcast(notice).await;
        }
        offline
    }

    /// Record a broker connection state change reported by the ingest loop
    pub async fn record_connection(
        &self,
        connection_state: ConnectionState,
        attempts: u32,
        reason: &str,
        at: DateTime<Utc>,
    ) {
        *self.link.write().await = LinkStatus {
            state: connection_state,
            attempts,
        };

        let status = match connection_state {
            ConnectionState::Connected => Some(ConnectionStatus::Online),
            ConnectionState::Disconnected | ConnectionState::Offline => {
                Some(ConnectionStatus::Offline)
            }
            ConnectionState::Connecting => None,
        };

        if let Some(status) = status {
            let mut pending = PendingSnapshots::new();
            let order = {
                let mut state = self.state.write().await;
                if state.connection.record(status, reason, at) {
                    stage(&state, &[ConnectionLog::NAME], &mut pending);
                }
                self.snapshot_order.lock().await
            };
            self.flush(pending, order).await;
        }

        self.realtime
            .broadcast(HubMessage::ConnectionStatus(ConnectionStatusMessage {
                state: connection_state,
                reason: reason.to_string(),
                attempts,
                timestamp: at,
            }))
            .await;
    }

    /// Clear the ball alert; false if none was raised
    pub async fn dismiss_ball_alert(&self) -> bool {
        let alert = {
            let mut state = self.state.write().await;
            if !state.ball_alert.dismiss() {
                return false;
            }
            state.ball_alert.clone()
        };
        self.realtime.broadcast(HubMessage::BallAlert(alert)).await;
        true
    }

    /// Clear attendance, object counts, zone activity, member paths and the
    /// last-update time. Layout, presence, alarms, sensors and the status log
    /// are kept.
    pub async fn reset(&self, at: DateTime<Utc>) -> ResetSummary {
        let mut pending = PendingSnapshots::new();
        let (zones, order) = {
            let mut state = self.state.write().await;
            state.occupancy = Occupancy::default();
            state.object_counts = ObjectCounts::default();
            state.zone_activity = ZoneActivityLog::default();
            state.member_paths = MemberPaths::default();
            state.connection.last_update = None;

            stage(&state, &RESETTABLE, &mut pending);
            (state.occupancy.heatmap(), self.snapshot_order.lock().await)
        };
        self.flush(pending, order).await;

        tracing::info!("Dashboard data reset");

        let summary = ResetSummary {
            cleared: RESETTABLE.to_vec(),
            timestamp: at,
        };
        self.realtime
            .broadcast(HubMessage::DashboardReset(summary.clone()))
            .await;
        self.realtime
            .broadcast(HubMessage::OccupancyUpdate(OccupancyUpdateMessage { zones }))
            .await;
        summary
    }

    /// Full dashboard read model
    pub async fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let link = *self.link.read().await;
        let state = self.state.read().await;
        DashboardView::build(&state, link.state, link.attempts, now)
    }

    pub async fn sensors(&self) -> Vec<SensorView> {
        SensorView::list(&self.state.read().await.sensors)
    }

    pub async fn connection(&self) -> ConnectionView {
        let link = *self.link.read().await;
        let state = self.state.read().await;
        ConnectionView::build(&state.connection, link.state, link.attempts)
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.link.read().await.state
    }

    /// Write staged snapshots off the runtime thread, then release `order`
    async fn flush(&self, pending: PendingSnapshots, order: MutexGuard<'_, ()>) {
        if !pending.is_empty() {
            let snapshots = self.snapshots.clone();
            let written = tokio::task::spawn_blocking(move || {
                for (name, value) in &pending {
                    snapshots.write(name, value);
                }
            })
            .await;
            if let Err(e) = written {
                tracing::error!(error = %e, "Snapshot write task failed");
            }
        }
        drop(order);
    }
}

/// Encode every changed aggregate that has a snapshot
fn stage(state: &DashboardState, changed: &[&'static str], pending: &mut PendingSnapshots) {
    for name in changed {
        let value = match *name {
            Occupancy::NAME => Snapshots::encode(&state.occupancy),
            ZoneActivityLog::NAME => Snapshots::encode(&state.zone_activity),
            ObjectCounts::NAME => Snapshots::encode(&state.object_counts),
            PresenceGauges::NAME => Snapshots::encode(&state.presence),
            AlarmLog::NAME => Snapshots::encode(&state.alarms),
            TrackingLog::NAME => Snapshots::encode(&state.tracking),
            MemberPaths::NAME => Snapshots::encode(&state.member_paths),
            LayoutState::NAME => Snapshots::encode(&state.layout),
            SensorLiveness::NAME => Snapshots::encode(&state.sensors),
            ConnectionLog::NAME => Snapshots::encode(&state.connection),
            // transient
            BallAlert::NAME => None,
            other => {
                tracing::warn!(aggregate = other, "No snapshot mapping");
                None
            }
        };

        if let Some(value) = value {
            pending.retain(|(staged, _)| staged != name);
            pending.push((*name, value));
        }
    }
}

fn notices_for(
    state: &DashboardState,
    event: &ClassifiedEvent,
    changed: &[&'static str],
    recovering: bool,
) -> Vec<HubMessage> {
    let mut notices = Vec::new();

    if changed.contains(&Occupancy::NAME) {
        notices.push(HubMessage::OccupancyUpdate(OccupancyUpdateMessage {
            zones: state.occupancy.heatmap(),
        }));
    }

    match event {
        ClassifiedEvent::ZoneEvent(_) => {
            if let Some(head) = state.zone_activity.head() {
                notices.push(HubMessage::ZoneActivity(head.clone()));
            }
            if changed.contains(&BallAlert::NAME) {
                notices.push(HubMessage::BallAlert(state.ball_alert.clone()));
            }
        }
        ClassifiedEvent::Alarm(_) => {
            if let Some(latest) = state.alarms.latest() {
                notices.push(HubMessage::Alarm(latest.clone()));
            }
        }
        ClassifiedEvent::Layout(_) => {
            notices.push(HubMessage::LayoutUpdate(state.layout.clone()));
        }
        ClassifiedEvent::Diagnostics(d) if recovering => {
            if let Some(record) = state.sensors.get(&d.sensor_id) {
                notices.push(HubMessage::SensorStatus(SensorStatusMessage {
                    sensor_id: d.sensor_id.clone(),
                    online: true,
                    last_seen: record.last_seen,
                }));
            }
        }
        _ => {}
    }

    notices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ZoneEvent;
    use crate::snapshot_store::MemorySnapshotStore;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingForwarder {
        calls: Mutex<Vec<ZoneEvent>>,
    }

    impl ActivityForwarder for RecordingForwarder {
        fn forward(&self, event: &ZoneEvent, _at: DateTime<Utc>) {
            self.calls.lock().unwrap().push(event.clone());
        }
    }

    fn controller() -> (DashboardController, Arc<RecordingForwarder>) {
        let forwarder = Arc::new(RecordingForwarder::default());
        let controller = DashboardController::new(
            Snapshots::in_memory(),
            forwarder.clone(),
            Arc::new(RealtimeHub::new()),
        );
        (controller, forwarder)
    }

    fn message(suffix: &str, payload: serde_json::Value) -> RawMessage {
        RawMessage {
            topic: format!("Flasheye/flasheye-edge-35/{}", suffix),
            payload: serde_json::to_vec(&payload).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_zone_event_updates_state_and_forwards() {
        let (controller, forwarder) = controller();
        let applied = controller
            .handle_message(
                &message(
                    "event",
                    json!({"zone_name": "Cardio Area", "object_class": "person", "object_id": "42", "event": "start"}),
                ),
                Utc::now(),
            )
            .await;
        assert_eq!(applied, 1);

        let view = controller.view(Utc::now()).await;
        assert_eq!(view.occupancy["Cardio Area"], 1);
        let head = &view.zone_activity[0];
        assert_eq!(head.zone, "Cardio Area");
        assert_eq!(head.object_class, "person");
        assert_eq!(head.object_id.as_deref(), Some("42"));
        assert_eq!(head.event_kind, "start");

        let calls = forwarder.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].zone, "Cardio Area");
        assert_eq!(calls[0].object_id.as_deref(), Some("42"));
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let (controller, forwarder) = controller();
        let raw = RawMessage {
            topic: "Flasheye/flasheye-edge-35/event".into(),
            payload: b"{broken".to_vec(),
        };
        assert_eq!(controller.handle_message(&raw, Utc::now()).await, 0);
        assert!(forwarder.calls.lock().unwrap().is_empty());
        assert!(controller.view(Utc::now()).await.occupancy.is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_survive_restart() {
        let store = Arc::new(MemorySnapshotStore::new());
        let forwarder: Arc<dyn ActivityForwarder> = Arc::new(RecordingForwarder::default());

        struct Shared(Arc<MemorySnapshotStore>);
        impl crate::snapshot_store::SnapshotStore for Shared {
            fn save(&self, name: &str, value: &serde_json::Value) -> crate::Result<()> {
                self.0.save(name, value)
            }
            fn load(&self, name: &str) -> crate::Result<Option<serde_json::Value>> {
                self.0.load(name)
            }
        }

        let first = DashboardController::new(
            Snapshots::new(Box::new(Shared(store.clone()))),
            forwarder.clone(),
            Arc::new(RealtimeHub::new()),
        );
        first
            .handle_message(
                &message("event", json!({"zone_name": "Pool", "object_class": "ball", "object_id": "1"})),
                Utc::now(),
            )
            .await;
        first
            .handle_message(&message("sensor_diagnostics", json!({"sensor_namespace": "lidar-1"})), Utc::now())
            .await;

        let second = DashboardController::restore(
            Snapshots::new(Box::new(Shared(store))),
            forwarder,
            Arc::new(RealtimeHub::new()),
        );
        let view = second.view(Utc::now()).await;
        assert_eq!(view.occupancy["Pool"], 1);
        assert_eq!(view.sensors.len(), 1);
        assert!(!view.ball_alert.active);
    }

    #[tokio::test]
    async fn test_sweep_and_recovery_broadcast() {
        let realtime = Arc::new(RealtimeHub::new());
        let controller = DashboardController::new(
            Snapshots::in_memory(),
            Arc::new(RecordingForwarder::default()),
            realtime.clone(),
        );
        let (_id, mut rx) = realtime.register().await;
        let now = Utc::now();

        controller
            .handle_message(
                &message("sensor_diagnostics", json!({"sensor_namespace": "lidar-1"})),
                now - chrono::Duration::minutes(6),
            )
            .await;

        let offline = controller.sweep_liveness(now, Duration::from_secs(300)).await;
        assert_eq!(offline, vec!["lidar-1".to_string()]);
        let notice: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(notice["type"], "sensor_status");
        assert_eq!(notice["data"]["online"], false);

        controller
            .handle_message(&message("heartbeat/lidar-1", json!({})), now)
            .await;
        let notice: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(notice["data"]["online"], true);
    }

    #[tokio::test]
    async fn test_connection_log_records_transitions() {
        let (controller, _) = controller();
        let now = Utc::now();

        controller.record_connection(ConnectionState::Connecting, 0, "Connecting", now).await;
        controller.record_connection(ConnectionState::Connected, 0, "Connected", now).await;
        controller.record_connection(ConnectionState::Disconnected, 1, "Connection closed", now).await;
        controller.record_connection(ConnectionState::Offline, 5, "Reconnect attempts exhausted", now).await;

        let view = controller.connection().await;
        assert_eq!(view.state, ConnectionState::Offline);
        assert_eq!(view.attempts, 5);
        assert_eq!(view.log.len(), 2);
        assert_eq!(view.log[0].status, ConnectionStatus::Offline);
    }

    #[tokio::test]
    async fn test_dismiss_ball_alert() {
        let (controller, _) = controller();
        assert!(!controller.dismiss_ball_alert().await);
        controller
            .handle_message(
                &message("event", json!({"zone_name": "Studio 2", "object_class": "Ball"})),
                Utc::now(),
            )
            .await;
        assert!(controller.view(Utc::now()).await.ball_alert.active);
        assert!(controller.dismiss_ball_alert().await);
        assert!(!controller.view(Utc::now()).await.ball_alert.active);
    }

    #[tokio::test]
    async fn test_reset_clears_activity_aggregates_and_keeps_layout() {
        let store = Arc::new(MemorySnapshotStore::new());

        struct Shared(Arc<MemorySnapshotStore>);
        impl crate::snapshot_store::SnapshotStore for Shared {
            fn save(&self, name: &str, value: &serde_json::Value) -> crate::Result<()> {
                self.0.save(name, value)
            }
            fn load(&self, name: &str) -> crate::Result<Option<serde_json::Value>> {
                self.0.load(name)
            }
        }

        let realtime = Arc::new(RealtimeHub::new());
        let controller = DashboardController::new(
            Snapshots::new(Box::new(Shared(store.clone()))),
            Arc::new(RecordingForwarder::default()),
            realtime.clone(),
        );
        let now = Utc::now();
        controller
            .handle_message(
                &message(
                    "event",
                    json!({"zone_name": "Cardio Area", "object_class": "person", "object_id": "42"}),
                ),
                now,
            )
            .await;
        controller
            .handle_message(
                &message("boxes", json!({"box": [{"id": 12, "name": "Free Weights"}]})),
                now,
            )
            .await;
        controller
            .handle_message(&message("event", json!({"zone_name": "Studio 1", "detection_value": 1})), now)
            .await;

        let (_id, mut rx) = realtime.register().await;
        let summary = controller.reset(now).await;
        assert_eq!(summary.cleared.len(), RESETTABLE.len());

        let view = controller.view(now).await;
        assert!(view.occupancy.is_empty());
        assert!(view.object_counts.is_empty());
        assert!(view.zone_activity.is_empty());
        assert!(view.member_paths.is_empty());
        assert!(view.connection.last_update.is_none());
        assert_eq!(view.layout.boxes.len(), 1);
        assert_eq!(view.presence["Studio 1"], 1);

        let notice: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(notice["type"], "dashboard_reset");

        // Snapshots were overwritten, so a restart stays cleared
        let restarted = DashboardController::restore(
            Snapshots::new(Box::new(Shared(store))),
            Arc::new(RecordingForwarder::default()),
            Arc::new(RealtimeHub::new()),
        );
        let view = restarted.view(now).await;
        assert!(view.occupancy.is_empty());
        assert!(view.member_paths.is_empty());
        assert_eq!(view.layout.boxes.len(), 1);
    }
}
