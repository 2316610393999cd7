//! Zone events per object class (lowercased)

use super::Aggregate;
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectCounts {
    counts: BTreeMap<String, u64>,
}

impl ObjectCounts {
    pub fn count(&self, class: &str) -> u64 {
        self.counts.get(&class.to_lowercase()).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }
}

impl Aggregate for ObjectCounts {
    const NAME: &'static str = "object_counts";

    fn apply(&mut self, event: &ClassifiedEvent, _at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::ZoneEvent(e) = event else {
            return false;
        };
        *self.counts.entry(e.object_class.to_lowercase()).or_insert(0) += 1;
        true
    }
}
