//! Read models served to dashboards

use crate::aggregates::{
    AlarmEntry, BallAlert, ConnectionLog, ConnectionStatus, DashboardState, LayoutState, PathStep,
    SensorLiveness, SensorMetrics, StatusLogEntry, TrackingEntry, ZoneActivity, ZoneHeat,
};
use crate::reconnect_supervisor::ConnectionState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct SensorView {
    pub sensor_id: String,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
    pub metrics: SensorMetrics,
}

impl SensorView {
    pub fn list(sensors: &SensorLiveness) -> Vec<Self> {
        sensors
            .sensors()
            .iter()
            .map(|(id, record)| Self {
                sensor_id: id.clone(),
                online: record.is_online,
                last_seen: record.last_seen,
                metrics: record.metrics.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionView {
    pub state: ConnectionState,
    pub status: ConnectionStatus,
    pub attempts: u32,
    pub last_update: Option<DateTime<Utc>>,
    pub log: Vec<StatusLogEntry>,
}

impl ConnectionView {
    pub fn build(log: &ConnectionLog, state: ConnectionState, attempts: u32) -> Self {
        Self {
            state,
            status: log.status,
            attempts,
            last_update: log.last_update,
            log: log.entries.iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub occupancy: BTreeMap<String, u64>,
    pub heatmap: Vec<ZoneHeat>,
    pub zone_activity: Vec<ZoneActivity>,
    pub ball_alert: BallAlert,
    pub object_counts: BTreeMap<String, u64>,
    pub presence: BTreeMap<String, u8>,
    pub alarms: Vec<AlarmEntry>,
    pub tracking: Vec<TrackingEntry>,
    pub member_paths: BTreeMap<String, Vec<PathStep>>,
    pub layout: LayoutState,
    pub sensors: Vec<SensorView>,
    pub connection: ConnectionView,
}

impl DashboardView {
    pub fn build(
        state: &DashboardState,
        link_state: ConnectionState,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            generated_at: now,
            occupancy: state.occupancy.counts().clone(),
            heatmap: state.occupancy.heatmap(),
            zone_activity: state.zone_activity.entries().iter().cloned().collect(),
            ball_alert: state.ball_alert.clone(),
            object_counts: state.object_counts.counts().clone(),
            presence: state.presence.zones().clone(),
            alarms: state.alarms.entries().iter().cloned().collect(),
            tracking: state.tracking.entries().iter().cloned().collect(),
            member_paths: state
                .member_paths
                .members()
                .filter_map(|id| {
                    state
                        .member_paths
                        .path(id)
                        .map(|path| (id.clone(), path.iter().cloned().collect()))
                })
                .collect(),
            layout: state.layout.clone(),
            sensors: SensorView::list(&state.sensors),
            connection: ConnectionView::build(&state.connection, link_state, attempts),
        }
    }
}
