//! Transient "ball detected" alert, independent of the activity log

use super::Aggregate;
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BallAlert {
    pub active: bool,
    pub zone: Option<String>,
    pub raised_at: Option<DateTime<Utc>>,
}

impl BallAlert {
    /// Clear the flag; returns false if it was not raised
    pub fn dismiss(&mut self) -> bool {
        if !self.active {
            return false;
        }
        *self = Self::default();
        true
    }
}

impl Aggregate for BallAlert {
    const NAME: &'static str = "ball_alert";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        match event {
            ClassifiedEvent::ZoneEvent(e) if e.is_ball() => {
                self.active = true;
                self.zone = Some(e.zone.clone());
                self.raised_at = Some(at);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ZoneEvent;

    fn event(class: &str) -> ClassifiedEvent {
        ClassifiedEvent::ZoneEvent(ZoneEvent {
            zone: "Squat Rack".into(),
            object_class: class.into(),
            object_id: None,
            event_kind: "start".into(),
            equipment: None,
            occurred_at: None,
        })
    }

    #[test]
    fn test_ball_class_is_case_insensitive() {
        let mut alert = BallAlert::default();
        assert!(!alert.apply(&event("person"), Utc::now()));
        assert!(alert.apply(&event("BALL"), Utc::now()));
        assert!(alert.active);
        assert_eq!(alert.zone.as_deref(), Some("Squat Rack"));
    }

    #[test]
    fn test_dismiss() {
        let mut alert = BallAlert::default();
        assert!(!alert.dismiss());
        alert.apply(&event("Ball"), Utc::now());
        assert!(alert.dismiss());
        assert!(!alert.active);
        assert!(alert.zone.is_none());
    }
}
