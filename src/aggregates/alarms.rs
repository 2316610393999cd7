//! Alarm ring buffer (newest first)

use super::{push_capped, Aggregate};
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ALARM_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmEntry {
    pub zone: String,
    pub object_class: String,
    pub object_id: Option<String>,
    pub event_kind: String,
    pub severity: String,
    pub details: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlarmLog {
    entries: VecDeque<AlarmEntry>,
}

impl AlarmLog {
    pub fn entries(&self) -> &VecDeque<AlarmEntry> {
        &self.entries
    }

    pub fn latest(&self) -> Option<&AlarmEntry> {
        self.entries.front()
    }
}

impl Aggregate for AlarmLog {
    const NAME: &'static str = "alarms";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::Alarm(alarm) = event else {
            return false;
        };

        push_capped(
            &mut self.entries,
            AlarmEntry {
                zone: alarm.zone.clone(),
                object_class: alarm.object_class.clone(),
                object_id: alarm.object_id.clone(),
                event_kind: alarm.event_kind.clone(),
                severity: alarm.severity.clone(),
                details: alarm.details.clone(),
                received_at: at,
            },
            ALARM_LOG_CAPACITY,
        );
        true
    }
}
