//! Per-zone occupancy counters and the derived heatmap

use super::Aggregate;
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running event count per zone. Increment only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Occupancy {
    counts: BTreeMap<String, u64>,
}

/// Heat bucket for a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLevel {
    Low,
    Medium,
    High,
}

impl HeatLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio <= 0.33 {
            Self::Low
        } else if ratio <= 0.66 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneHeat {
    pub zone: String,
    pub count: u64,
    /// count / busiest zone count
    pub heat: f64,
    pub level: HeatLevel,
}

impl Occupancy {
    pub fn count(&self, zone: &str) -> u64 {
        self.counts.get(zone).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    fn increment(&mut self, zone: &str) {
        *self.counts.entry(zone.to_string()).or_insert(0) += 1;
    }

    /// Heat per zone relative to the busiest zone
    pub fn heatmap(&self) -> Vec<ZoneHeat> {
        let max = self.counts.values().copied().max().unwrap_or(0);

        self.counts
            .iter()
            .map(|(zone, &count)| {
                let heat = if max == 0 {
                    0.0
                } else {
                    count as f64 / max as f64
                };
                ZoneHeat {
                    zone: zone.clone(),
                    count,
                    heat,
                    level: HeatLevel::from_ratio(heat),
                }
            })
            .collect()
    }
}

impl Aggregate for Occupancy {
    const NAME: &'static str = "occupancy";

    fn apply(&mut self, event: &ClassifiedEvent, _at: DateTime<Utc>) -> bool {
        match event {
            ClassifiedEvent::ZoneEvent(e) => {
                self.increment(&e.zone);
                true
            }
            ClassifiedEvent::Tracking(t) => match &t.zone {
                Some(zone) => {
                    self.increment(zone);
                    true
                }
                None => false,
            },
            _ => false,
        }
    }
}
