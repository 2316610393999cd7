//! Zone activity log
//!
//! Most-recent-first, at most one entry per (zone, object_id).

use super::{push_capped, Aggregate};
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const ZONE_ACTIVITY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneActivity {
    pub zone: String,
    pub object_class: String,
    pub object_id: Option<String>,
    pub event_kind: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneActivityLog {
    entries: VecDeque<ZoneActivity>,
}

impl ZoneActivityLog {
    pub fn entries(&self) -> &VecDeque<ZoneActivity> {
        &self.entries
    }

    pub fn head(&self) -> Option<&ZoneActivity> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Aggregate for ZoneActivityLog {
    const NAME: &'static str = "zone_activity";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::ZoneEvent(e) = event else {
            return false;
        };

        self.entries
            .retain(|entry| !(entry.zone == e.zone && entry.object_id == e.object_id));

        push_capped(
            &mut self.entries,
            ZoneActivity {
                zone: e.zone.clone(),
                object_class: e.object_class.clone(),
                object_id: e.object_id.clone(),
                event_kind: e.event_kind.clone(),
                time: e.occurred_at.unwrap_or(at),
            },
            ZONE_ACTIVITY_CAPACITY,
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ZoneEvent;
    use std::collections::HashSet;

    fn event(zone: &str, id: Option<&str>, kind: &str) -> ClassifiedEvent {
        ClassifiedEvent::ZoneEvent(ZoneEvent {
            zone: zone.to_string(),
            object_class: "person".to_string(),
            object_id: id.map(str::to_string),
            event_kind: kind.to_string(),
            equipment: None,
            occurred_at: None,
        })
    }

    #[test]
    fn test_same_pair_evicts_previous_entry() {
        let mut log = ZoneActivityLog::default();
        let now = Utc::now();

        log.apply(&event("Cardio Area", Some("42"), "start"), now);
        log.apply(&event("Pool", Some("42"), "start"), now);
        log.apply(&event("Cardio Area", Some("42"), "stop"), now);

        assert_eq!(log.len(), 2);
        let head = log.head().unwrap();
        assert_eq!(head.zone, "Cardio Area");
        assert_eq!(head.event_kind, "stop");
        assert_eq!(log.entries()[1].zone, "Pool");
    }

    #[test]
    fn test_pairs_stay_unique_over_mixed_sequence() {
        let mut log = ZoneActivityLog::default();
        let now = Utc::now();
        let zones = ["A", "B", "C"];
        let ids = [Some("1"), Some("2"), None];

        for i in 0..60 {
            let zone = zones[i % zones.len()];
            let id = ids[(i / 2) % ids.len()];
            log.apply(&event(zone, id, "start"), now);

            let mut seen = HashSet::new();
            for entry in log.entries() {
                assert!(seen.insert((entry.zone.clone(), entry.object_id.clone())));
            }
        }
    }

    #[test]
    fn test_capacity() {
        let mut log = ZoneActivityLog::default();
        let now = Utc::now();
        for i in 0..(ZONE_ACTIVITY_CAPACITY + 25) {
            log.apply(&event("Gym Area", Some(&i.to_string()), "start"), now);
        }
        assert_eq!(log.len(), ZONE_ACTIVITY_CAPACITY);
        let expected_head = (ZONE_ACTIVITY_CAPACITY + 24).to_string();
        assert_eq!(log.head().unwrap().object_id.as_deref(), Some(expected_head.as_str()));
    }
}
