//! Tracking ring buffer (newest first)

use super::{push_capped, Aggregate};
use crate::classifier::{ClassifiedEvent, Vec3};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const TRACKING_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub object_id: String,
    pub object_class: String,
    pub zone: Option<String>,
    pub position: Option<Vec3>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingLog {
    entries: VecDeque<TrackingEntry>,
}

impl TrackingLog {
    pub fn entries(&self) -> &VecDeque<TrackingEntry> {
        &self.entries
    }
}

impl Aggregate for TrackingLog {
    const NAME: &'static str = "tracking";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::Tracking(t) = event else {
            return false;
        };

        push_capped(
            &mut self.entries,
            TrackingEntry {
                object_id: t.object_id.clone(),
                object_class: t.object_class.clone(),
                zone: t.zone.clone(),
                position: t.position,
                received_at: at,
            },
            TRACKING_LOG_CAPACITY,
        );
        true
    }
}
