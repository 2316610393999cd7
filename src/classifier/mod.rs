//! Event Classifier
//!
//! Turns a raw broker message into typed [`ClassifiedEvent`]s.
//!
//! ## Precedence
//!
//! 1. Diagnostics topic (`sensor_diagnostics`, `sensor-diagnostics`, `heartbeat/<id>`) - exclusive
//! 2. Zone event: event/alarm topic with `zone_name` + `object_class`
//! 3. Presence: `detection_value` present
//! 4. Layout: `boxes` topic
//! 5. Alarm: `alarm` topic
//! 6. Tracking: `tracking` topic
//! 7. Path fallback: `zone_name` + `object_id` on event/speed_event/tracking topics
//!
//! A message may yield more than one event (an alarm-topic message carrying
//! `zone_name` + `object_class` is both a zone event and an alarm).
//! Undecodable or incomplete payloads yield nothing.

mod payload;
mod types;

pub use types::*;

use chrono::{DateTime, Utc};
use payload::{WireBox, WirePayload};
use serde_json::Value;

/// Box ids the sensor publishes for scene-wide/noise volumes
pub const EXCLUDED_BOX_IDS: [i64; 1] = [33];

/// Topic category, from the last topic segment(s)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Event,
    SensorDiagnostics,
    Heartbeat,
    Boxes,
    Alarm,
    Tracking,
    SpeedEvent,
    Other,
}

impl TopicKind {
    pub fn of(topic: &str) -> Self {
        let mut segments = topic.rsplit('/');
        let last = segments.next().unwrap_or_default();
        let parent = segments.next();

        if parent == Some("heartbeat") {
            return Self::Heartbeat;
        }

        match last {
            "event" => Self::Event,
            "sensor_diagnostics" | "sensor-diagnostics" => Self::SensorDiagnostics,
            "boxes" => Self::Boxes,
            "alarm" => Self::Alarm,
            "tracking" => Self::Tracking,
            "speed_event" => Self::SpeedEvent,
            _ => Self::Other,
        }
    }

    fn is_diagnostics(self) -> bool {
        matches!(self, Self::SensorDiagnostics | Self::Heartbeat)
    }

    /// Topics whose payloads are zone entries (the persisted subset)
    fn carries_zone_events(self) -> bool {
        matches!(self, Self::Event | Self::SpeedEvent | Self::Alarm)
    }

    fn carries_path_steps(self) -> bool {
        matches!(self, Self::Event | Self::SpeedEvent | Self::Tracking)
    }
}

/// Highest-precedence interpretation of a message
pub fn classify(topic: &str, payload: &[u8]) -> Option<ClassifiedEvent> {
    classify_all(topic, payload).into_iter().next()
}

/// Every interpretation of a message, in precedence order
pub fn classify_all(topic: &str, payload: &[u8]) -> Vec<ClassifiedEvent> {
    let kind = TopicKind::of(topic);

    let wire = match decode(payload) {
        Ok(wire) => wire,
        Err(e) => {
            tracing::debug!(topic = %topic, error = %e, "Undecodable payload dropped");
            return Vec::new();
        }
    };

    if kind.is_diagnostics() {
        return diagnostics(topic, kind, &wire)
            .map(ClassifiedEvent::Diagnostics)
            .into_iter()
            .collect();
    }

    let mut events = Vec::new();

    let zone_event = if kind.carries_zone_events() {
        zone_event(&wire)
    } else {
        None
    };
    let has_zone_event = zone_event.is_some();
    events.extend(zone_event.map(ClassifiedEvent::ZoneEvent));

    if let Some(presence) = presence(&wire) {
        events.push(ClassifiedEvent::Presence(presence));
    }

    if kind == TopicKind::Boxes {
        if let Some(layout) = layout(&wire) {
            events.push(ClassifiedEvent::Layout(layout));
        }
    }

    if kind == TopicKind::Alarm {
        if let Some(alarm) = alarm(&wire) {
            events.push(ClassifiedEvent::Alarm(alarm));
        }
    }

    let mut tracked = false;
    if kind == TopicKind::Tracking {
        if let Some(tracking) = tracking(&wire) {
            tracked = true;
            events.push(ClassifiedEvent::Tracking(tracking));
        }
    }

    // Zone events already feed member paths, so the fallback only covers the rest
    if !has_zone_event && !tracked && kind.carries_path_steps() {
        if let Some(step) = path_step(&wire) {
            events.push(ClassifiedEvent::Tracking(step));
        }
    }

    if events.is_empty() {
        tracing::debug!(topic = %topic, "Message matched no known shape");
    }

    events
}

/// Payloads must be JSON objects; arrays and scalars are rejected up front
fn decode(payload: &[u8]) -> serde_json::Result<WirePayload> {
    match serde_json::from_slice::<Value>(payload)? {
        value @ Value::Object(_) => serde_json::from_value(value),
        _ => Err(serde::de::Error::custom("payload is not a JSON object")),
    }
}

fn diagnostics(topic: &str, kind: TopicKind, wire: &WirePayload) -> Option<Diagnostics> {
    let sensor_id = match (non_empty(&wire.sensor_namespace), kind) {
        (Some(ns), _) => ns,
        (None, TopicKind::Heartbeat) => topic.rsplit('/').next().filter(|s| !s.is_empty())?.to_string(),
        (None, _) => return None,
    };

    Some(Diagnostics {
        sensor_id,
        metrics: DiagnosticsMetrics {
            non_zero_points_reference: wire.non_zero_points_reference,
            non_zero_points: wire.non_zero_points,
            mean_intensity_reference: wire.mean_intensity_reference,
            mean_intensity: wire.mean_intensity,
        },
        heartbeat: kind == TopicKind::Heartbeat,
    })
}

fn zone_event(wire: &WirePayload) -> Option<ZoneEvent> {
    let zone = non_empty(&wire.zone_name)?;
    let object_class = non_empty(&wire.object_class)?;

    Some(ZoneEvent {
        zone,
        object_class,
        object_id: wire.object_id.as_ref().and_then(id_string),
        event_kind: non_empty(&wire.event).unwrap_or_else(|| "unknown".to_string()),
        equipment: non_empty(&wire.equipment),
        occurred_at: wire.unix_time.and_then(unix_seconds),
    })
}

fn presence(wire: &WirePayload) -> Option<Presence> {
    let raw = wire.detection_value.as_ref()?;
    let zone = non_empty(&wire.zone_name)?;

    let occupied = match raw {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v > 0.0)?,
        Value::String(s) => s.trim().parse::<f64>().ok().map(|v| v > 0.0)?,
        _ => return None,
    };

    Some(Presence {
        zone,
        value: u8::from(occupied),
    })
}

fn layout(wire: &WirePayload) -> Option<Layout> {
    let boxes = wire.boxes.as_ref()?;

    Some(Layout {
        boxes: boxes.iter().filter_map(layout_box).collect(),
    })
}

fn layout_box(wire: &WireBox) -> Option<LayoutBox> {
    let id = wire.id.as_ref().and_then(|v| match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    if id.is_some_and(|id| EXCLUDED_BOX_IDS.contains(&id)) {
        return None;
    }

    Some(LayoutBox {
        id,
        name: non_empty(&wire.name)?,
        dimensions: Vec3 {
            x: wire.dimensions_x.unwrap_or_default(),
            y: wire.dimensions_y.unwrap_or_default(),
            z: wire.dimensions_z.unwrap_or_default(),
        },
        position: Vec3 {
            x: wire.position_x.unwrap_or_default(),
            y: wire.position_y.unwrap_or_default(),
            z: wire.position_z.unwrap_or_default(),
        },
    })
}

fn alarm(wire: &WirePayload) -> Option<Alarm> {
    let zone = non_empty(&wire.zone_name)?;

    Some(Alarm {
        zone,
        object_class: non_empty(&wire.object_class).unwrap_or_else(|| "unknown".to_string()),
        object_id: wire.object_id.as_ref().and_then(id_string),
        event_kind: non_empty(&wire.event).unwrap_or_else(|| "alarm".to_string()),
        severity: wire
            .severity
            .as_ref()
            .and_then(id_string)
            .unwrap_or_else(|| "unknown".to_string()),
        details: wire.details.clone().unwrap_or(Value::Null),
    })
}

fn tracking(wire: &WirePayload) -> Option<Tracking> {
    let object_id = wire.object_id.as_ref().and_then(id_string)?;

    Some(Tracking {
        object_id,
        object_class: non_empty(&wire.object_class).unwrap_or_else(|| "unknown".to_string()),
        zone: non_empty(&wire.zone_name),
        position: position(wire),
    })
}

fn path_step(wire: &WirePayload) -> Option<Tracking> {
    let zone = non_empty(&wire.zone_name)?;
    let mut step = tracking(wire)?;
    step.zone = Some(zone);
    Some(step)
}

fn position(wire: &WirePayload) -> Option<Vec3> {
    match (wire.pos_x, wire.pos_y) {
        (Some(x), Some(y)) => Some(Vec3 {
            x,
            y,
            z: wire.pos_z.unwrap_or_default(),
        }),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids arrive as either JSON strings or numbers
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn unix_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}
