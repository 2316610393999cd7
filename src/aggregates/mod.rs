//! Aggregate Updaters
//!
//! ## Responsibilities
//!
//! - One fold per derived dashboard view
//! - Each aggregate owns its state and only changes through [`Aggregate::apply`]
//! - [`DashboardState`] groups them for the controller; nothing else mutates it
//!
//! Occupancy is never decremented: "stop" events count like any other event.

mod alarms;
mod ball_alert;
mod connection_log;
mod layout;
mod member_path;
mod object_counts;
mod occupancy;
mod presence;
mod sensor_liveness;
mod tracking;
mod zone_activity;

pub use alarms::{AlarmEntry, AlarmLog, ALARM_LOG_CAPACITY};
pub use ball_alert::BallAlert;
pub use connection_log::{ConnectionLog, ConnectionStatus, StatusLogEntry, STATUS_LOG_CAPACITY};
pub use layout::LayoutState;
pub use member_path::{MemberPaths, PathStep, MEMBER_PATH_CAPACITY};
pub use object_counts::ObjectCounts;
pub use occupancy::{HeatLevel, Occupancy, ZoneHeat};
pub use presence::PresenceGauges;
pub use sensor_liveness::{SensorLiveness, SensorMetrics, SensorRecord, SensorStatusEvent};
pub use tracking::{TrackingEntry, TrackingLog, TRACKING_LOG_CAPACITY};
pub use zone_activity::{ZoneActivity, ZoneActivityLog, ZONE_ACTIVITY_CAPACITY};

use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::VecDeque;

/// A derived view folded from classified events
pub trait Aggregate: Serialize + DeserializeOwned + Default {
    /// Snapshot key
    const NAME: &'static str;

    /// Fold one event. Returns true when the state changed.
    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool;
}

/// Push to the front (newest first), dropping the oldest past `capacity`
pub(crate) fn push_capped<T>(items: &mut VecDeque<T>, item: T, capacity: usize) {
    items.push_front(item);
    items.truncate(capacity);
}

/// All aggregates, owned by a single controller
#[derive(Debug, Default)]
pub struct DashboardState {
    pub occupancy: Occupancy,
    pub zone_activity: ZoneActivityLog,
    pub ball_alert: BallAlert,
    pub object_counts: ObjectCounts,
    pub presence: PresenceGauges,
    pub alarms: AlarmLog,
    pub tracking: TrackingLog,
    pub member_paths: MemberPaths,
    pub layout: LayoutState,
    pub sensors: SensorLiveness,
    pub connection: ConnectionLog,
}

impl DashboardState {
    /// Fold one event into every aggregate; returns names of those that changed
    pub fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> Vec<&'static str> {
        let mut changed = Vec::new();

        macro_rules! fold {
            ($($field:ident),+) => {
                $(
                    if self.$field.apply(event, at) {
                        changed.push(aggregate_name(&self.$field));
                    }
                )+
            };
        }

        fold!(
            occupancy,
            zone_activity,
            ball_alert,
            object_counts,
            presence,
            alarms,
            tracking,
            member_paths,
            layout,
            sensors,
            connection
        );

        changed
    }
}

fn aggregate_name<A: Aggregate>(_: &A) -> &'static str {
    A::NAME
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Presence, ZoneEvent};

    fn zone_event(zone: &str, id: &str) -> ClassifiedEvent {
        ClassifiedEvent::ZoneEvent(ZoneEvent {
            zone: zone.to_string(),
            object_class: "person".to_string(),
            object_id: Some(id.to_string()),
            event_kind: "start".to_string(),
            equipment: None,
            occurred_at: None,
        })
    }

    #[test]
    fn test_push_capped_keeps_newest() {
        let mut items = VecDeque::new();
        for i in 0..5 {
            push_capped(&mut items, i, 3);
        }
        assert_eq!(items, VecDeque::from(vec![4, 3, 2]));
    }

    #[test]
    fn test_zone_event_touches_expected_aggregates() {
        let mut state = DashboardState::default();
        let changed = state.apply(&zone_event("Gym Area", "1"), Utc::now());

        assert_eq!(
            changed,
            vec![
                Occupancy::NAME,
                ZoneActivityLog::NAME,
                ObjectCounts::NAME,
                MemberPaths::NAME,
                ConnectionLog::NAME
            ]
        );
    }

    #[test]
    fn test_presence_only_touches_gauges() {
        let mut state = DashboardState::default();
        let event = ClassifiedEvent::Presence(Presence {
            zone: "Studio 1".into(),
            value: 1,
        });
        assert_eq!(state.apply(&event, Utc::now()), vec![PresenceGauges::NAME, ConnectionLog::NAME]);
    }
}
