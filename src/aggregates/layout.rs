//! Current box layout. Replaced wholesale, never merged.

use super::Aggregate;
use crate::classifier::{ClassifiedEvent, LayoutBox};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutState {
    pub boxes: Vec<LayoutBox>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LayoutState {
    pub fn by_name(&self, name: &str) -> Option<&LayoutBox> {
        self.boxes.iter().find(|b| b.name == name)
    }
}

impl Aggregate for LayoutState {
    const NAME: &'static str = "layout";

    fn apply(&mut self, event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        let ClassifiedEvent::Layout(layout) = event else {
            return false;
        };
        self.boxes = layout.boxes.clone();
        self.updated_at = Some(at);
        true
    }
}
