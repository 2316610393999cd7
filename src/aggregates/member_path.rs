//! Per-member zone history
//!
//! A zone is appended only when it differs from the member's current zone.
//! Each path keeps the last [`MEMBER_PATH_CAPACITY`] steps, oldest first.

use super::Aggregate;
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

pub const MEMBER_PATH_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub zone: String,
    pub time: DateTime<Utc>,
    pub object_class: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberPaths {
    paths: BTreeMap<String, VecDeque<PathStep>>,
}

impl MemberPaths {
    pub fn path(&self, object_id: &str) -> Option<&VecDeque<PathStep>> {
        self.paths.get(object_id)
    }

    pub fn members(&self) -> impl Iterator<Item = &String> {
        self.paths.keys()
    }

    fn step(&mut self, object_id: &str, zone: &str, object_class: &str, at: DateTime<Utc>) -> bool {
        let path = self.paths.entry(object_id.to_string()).or_default();

        if path.back().is_some_and(|last| last.zone == zone) {
            return false;
        }

        path.push_back(PathStep {
            zone: zone.to_string(),
            time: at,
            object_class: object_class.to_string(),
        });
        while path.len() > MEMBER_PATH_CAPACITY {
            path.pop_front();
        }
        true
    }
}

impl Aggregate for MemberPaths {
    const NAME: &'static str = "member_paths";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        match event {
            ClassifiedEvent::ZoneEvent(e) => match &e.object_id {
                Some(id) => self.step(id, &e.zone, &e.object_class, e.occurred_at.unwrap_or(at)),
                None => false,
            },
            ClassifiedEvent::Tracking(t) => match &t.zone {
                Some(zone) => self.step(&t.object_id, zone, &t.object_class, at),
                None => false,
            },
            _ => false,
        }
    }
}
