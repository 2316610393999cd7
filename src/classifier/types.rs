//! Classified event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One typed interpretation of a broker message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedEvent {
    Diagnostics(Diagnostics),
    ZoneEvent(ZoneEvent),
    Presence(Presence),
    Layout(Layout),
    Alarm(Alarm),
    Tracking(Tracking),
}

impl ClassifiedEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Diagnostics(_) => "diagnostics",
            Self::ZoneEvent(_) => "zone_event",
            Self::Presence(_) => "presence",
            Self::Layout(_) => "layout",
            Self::Alarm(_) => "alarm",
            Self::Tracking(_) => "tracking",
        }
    }
}

/// Sensor health report or heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub sensor_id: String,
    pub metrics: DiagnosticsMetrics,
    /// True for heartbeat topics (no metrics expected)
    pub heartbeat: bool,
}

/// Point-cloud health figures, compared against the sensor's reference frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsMetrics {
    pub non_zero_points_reference: Option<f64>,
    pub non_zero_points: Option<f64>,
    pub mean_intensity_reference: Option<f64>,
    pub mean_intensity: Option<f64>,
}

/// An object entering/acting in a zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub zone: String,
    pub object_class: String,
    pub object_id: Option<String>,
    /// "start", "stop", ... ("unknown" when absent)
    pub event_kind: String,
    pub equipment: Option<String>,
    /// Sensor-side time (`unix_time`), if sent
    pub occurred_at: Option<DateTime<Utc>>,
}

impl ZoneEvent {
    pub fn is_ball(&self) -> bool {
        self.object_class.eq_ignore_ascii_case("ball")
    }
}

/// Zone presence level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub zone: String,
    /// 0 or 1
    pub value: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A named detection volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub id: Option<i64>,
    pub name: String,
    pub dimensions: Vec3,
    pub position: Vec3,
}

/// Full replacement of the sensor's box layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub boxes: Vec<LayoutBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub zone: String,
    pub object_class: String,
    pub object_id: Option<String>,
    pub event_kind: String,
    pub severity: String,
    pub details: serde_json::Value,
}

/// Object position/zone update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub object_id: String,
    pub object_class: String,
    pub zone: Option<String>,
    pub position: Option<Vec3>,
}
