//! Snapshot Store
//!
//! ## Responsibilities
//!
//! - Durable cache of aggregate state, written on every change
//! - Read once at startup to warm the dashboard
//! - Storage failures never reach the pipeline: a failed write degrades the
//!   store to memory for the rest of the process lifetime
//! - Unreadable snapshots load as the aggregate's default and are replaced
//!   by the next write
//!
//! Single writer. No partial-write protection (last write wins).

mod file;
mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

use crate::aggregates::Aggregate;
use crate::error::Result;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Named JSON snapshots
pub trait SnapshotStore: Send + Sync {
    fn save(&self, name: &str, value: &Value) -> Result<()>;
    fn load(&self, name: &str) -> Result<Option<Value>>;
}

/// Snapshot access used by the controller
///
/// Wraps a backing store; after its first failed write every later call
/// goes to an in-memory store instead.
pub struct Snapshots {
    backing: Box<dyn SnapshotStore>,
    fallback: MemorySnapshotStore,
    degraded: AtomicBool,
}

impl Snapshots {
    pub fn new(backing: Box<dyn SnapshotStore>) -> Self {
        Self {
            backing,
            fallback: MemorySnapshotStore::new(),
            degraded: AtomicBool::new(false),
        }
    }

    /// Memory only
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySnapshotStore::new()))
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self, name: &str, error: &crate::Error) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                aggregate = %name,
                error = %error,
                "Snapshot storage failed; keeping snapshots in memory for this session"
            );
        }
    }

    /// Serialized form of an aggregate, ready for [`Snapshots::write`]
    pub fn encode<A: Aggregate>(aggregate: &A) -> Option<Value> {
        match serde_json::to_value(aggregate) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(aggregate = A::NAME, error = %e, "Failed to serialize snapshot");
                None
            }
        }
    }

    pub fn save<A: Aggregate>(&self, aggregate: &A) {
        if let Some(value) = Self::encode(aggregate) {
            self.write(A::NAME, &value);
        }
    }

    /// Store one encoded snapshot
    pub fn write(&self, name: &str, value: &Value) {
        if !self.is_degraded() {
            match self.backing.save(name, value) {
                Ok(()) => return,
                Err(e) => self.degrade(name, &e),
            }
        }

        // Memory store cannot fail
        let _ = self.fallback.save(name, value);
    }

    /// Stored state, or the aggregate's default when missing or unreadable
    pub fn load<A: Aggregate>(&self) -> A {
        let stored = if self.is_degraded() {
            self.fallback.load(A::NAME)
        } else {
            self.backing.load(A::NAME)
        };

        match stored {
            Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(aggregate = A::NAME, error = %e, "Discarding unreadable snapshot");
                A::default()
            }),
            Ok(None) => A::default(),
            Err(e) => {
                tracing::warn!(aggregate = A::NAME, error = %e, "Snapshot read failed, starting empty");
                A::default()
            }
        }
    }
}
