//! Sensor Liveness
//!
//! Tracks last-seen time per sensor and detects online/offline transitions.
//! Only transitions are reported, so callers can log/broadcast without spam.
//!
//! Offline is computed lazily by [`SensorLiveness::sweep`]; receiving a
//! diagnostics message or heartbeat brings a sensor back online immediately.

use super::Aggregate;
use crate::classifier::{ClassifiedEvent, DiagnosticsMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latest health figures. Fields missing from a report keep their previous value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorMetrics {
    pub non_zero_points_reference: f64,
    pub non_zero_points: f64,
    pub mean_intensity_reference: f64,
    pub mean_intensity: f64,
}

impl SensorMetrics {
    fn merge(&mut self, report: &DiagnosticsMetrics) {
        if let Some(v) = report.non_zero_points_reference {
            self.non_zero_points_reference = v;
        }
        if let Some(v) = report.non_zero_points {
            self.non_zero_points = v;
        }
        if let Some(v) = report.mean_intensity_reference {
            self.mean_intensity_reference = v;
        }
        if let Some(v) = report.mean_intensity {
            self.mean_intensity = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub last_seen: DateTime<Utc>,
    pub is_online: bool,
    pub metrics: SensorMetrics,
}

/// Sensor status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatusEvent {
    /// Online -> offline (silent past the timeout)
    Lost,
    /// Offline -> online (message received)
    Recovered,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorLiveness {
    sensors: BTreeMap<String, SensorRecord>,
}

impl SensorLiveness {
    pub fn get(&self, sensor_id: &str) -> Option<&SensorRecord> {
        self.sensors.get(sensor_id)
    }

    pub fn sensors(&self) -> &BTreeMap<String, SensorRecord> {
        &self.sensors
    }

    /// Record a message from `sensor_id`
    ///
    /// Returns `Some(Recovered)` when the sensor was previously offline.
    /// A first sighting is not a transition.
    pub fn observe(
        &mut self,
        sensor_id: &str,
        metrics: &DiagnosticsMetrics,
        at: DateTime<Utc>,
    ) -> Option<SensorStatusEvent> {
        match self.sensors.get_mut(sensor_id) {
            Some(record) => {
                // lastSeen only moves forward
                if at > record.last_seen {
                    record.last_seen = at;
                }
                record.metrics.merge(metrics);

                if record.is_online {
                    return None;
                }
                record.is_online = true;
                tracing::info!(sensor_id = %sensor_id, "Sensor back online");
                Some(SensorStatusEvent::Recovered)
            }
            None => {
                let mut record = SensorRecord {
                    last_seen: at,
                    is_online: true,
                    metrics: SensorMetrics::default(),
                };
                record.metrics.merge(metrics);
                self.sensors.insert(sensor_id.to_string(), record);
                tracing::info!(sensor_id = %sensor_id, "New sensor seen");
                None
            }
        }
    }

    /// Mark sensors silent for longer than `timeout` as offline
    ///
    /// Returns the sensors that transitioned on this sweep.
    pub fn sweep(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<(String, SensorStatusEvent)> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or_else(|_| chrono::Duration::days(365));
        let mut lost = Vec::new();

        for (sensor_id, record) in self.sensors.iter_mut() {
            if record.is_online && now.signed_duration_since(record.last_seen) > timeout {
                record.is_online = false;
                tracing::warn!(
                    sensor_id = %sensor_id,
                    last_seen = %record.last_seen,
                    "Sensor offline"
                );
                lost.push((sensor_id.clone(), SensorStatusEvent::Lost));
            }
        }

        lost
    }

    /// Sensors currently marked offline
    pub fn offline(&self) -> Vec<String> {
        self.sensors
            .iter()
            .filter(|(_, record)| !record.is_online)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Aggregate for SensorLiveness {
    const NAME: &'static str = "sensors";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::Diagnostics(d) = event else {
            return false;
        };
        self.observe(&d.sensor_id, &d.metrics, at);
        true
    }
}
