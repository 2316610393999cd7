//! Presence gauges
//!
//! A zone stays occupied until an explicit 0 for that zone arrives.

use super::Aggregate;
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresenceGauges {
    zones: BTreeMap<String, u8>,
}

impl PresenceGauges {
    /// Current value; unknown zones read as 0
    pub fn value(&self, zone: &str) -> u8 {
        self.zones.get(zone).copied().unwrap_or(0)
    }

    pub fn zones(&self) -> &BTreeMap<String, u8> {
        &self.zones
    }
}

impl Aggregate for PresenceGauges {
    const NAME: &'static str = "presence";

    fn apply(&mut self, event: &ClassifiedEvent, _at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::Presence(p) = event else {
            return false;
        };
        let value = p.value.min(1);
        self.zones.insert(p.zone.clone(), value) != Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifiedEvent, Presence, ZoneEvent};

    fn presence(zone: &str, value: u8) -> ClassifiedEvent {
        ClassifiedEvent::Presence(Presence {
            zone: zone.into(),
            value,
        })
    }

    #[test]
    fn test_value_is_sticky_until_explicit_zero() {
        let mut gauges = PresenceGauges::default();
        let now = Utc::now();

        assert!(gauges.apply(&presence("Studio 1", 1), now));
        // Other zones and other events leave it alone
        gauges.apply(&presence("Studio 2", 0), now);
        gauges.apply(
            &ClassifiedEvent::ZoneEvent(ZoneEvent {
                zone: "Studio 1".into(),
                object_class: "person".into(),
                object_id: None,
                event_kind: "stop".into(),
                equipment: None,
                occurred_at: None,
            }),
            now,
        );
        assert_eq!(gauges.value("Studio 1"), 1);

        assert!(!gauges.apply(&presence("Studio 1", 1), now));
        assert!(gauges.apply(&presence("Studio 1", 0), now));
        assert_eq!(gauges.value("Studio 1"), 0);
    }
}
