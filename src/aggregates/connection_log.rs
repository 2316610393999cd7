//! Broker connection status log

use super::{push_capped, Aggregate};
use crate::classifier::ClassifiedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const STATUS_LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Online,
    #[default]
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLogEntry {
    pub timestamp: DateTime<Utc>,
    pub status: ConnectionStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionLog {
    pub status: ConnectionStatus,
    /// Most recent first
    pub entries: VecDeque<StatusLogEntry>,
    /// Last time any sensor data arrived
    pub last_update: Option<DateTime<Utc>>,
}

impl ConnectionLog {
    /// Record a status; only changes are appended
    pub fn record(&mut self, status: ConnectionStatus, reason: &str, at: DateTime<Utc>) -> bool {
        if self.status == status && !self.entries.is_empty() {
            return false;
        }
        self.status = status;
        push_capped(
            &mut self.entries,
            StatusLogEntry {
                timestamp: at,
                status,
                reason: reason.to_string(),
            },
            STATUS_LOG_CAPACITY,
        );
        true
    }
}

impl Aggregate for ConnectionLog {
    const NAME: &'static str = "connection";

    /// Any classified event counts as data received
    fn apply(&mut self, _event: &ClassifiedEvent, at: DateTime<Utc>) -> bool {
        self.last_update = Some(at);
        true
    }
}
