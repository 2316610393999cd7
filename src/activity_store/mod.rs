//! Activity Store
//!
//! ## Responsibilities
//!
//! - Persist zone activities with a ±2 s dedup window on
//!   (member_id, zone, activity_type, object_type)
//! - List activities newest first within an optional time range
//!
//! The dedup check and insert are serialized inside one store instance, so a
//! burst of identical events persists exactly one record.

mod memory;
mod mysql;
mod types;

pub use memory::MemoryActivityStore;
pub use mysql::MySqlActivityStore;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Insert unless a matching record exists inside the dedup window
    async fn insert_deduplicated(&self, activity: NewActivity) -> Result<InsertOutcome>;

    /// Records in range, newest first
    async fn list(&self, range: &ActivityRange) -> Result<Vec<PersistedActivity>>;
}
