//! MySQL activity repository
//!
//! ## Tables
//! - activities: one row per persisted zone activity

use super::{
    ActivityRange, ActivityStore, InsertOutcome, NewActivity, PersistedActivity, DEDUP_WINDOW_MS,
};
use crate::error::Result;
use async_trait::async_trait;
use chrono::Duration;
use sqlx::MySqlPool;
use tokio::sync::Mutex;
use tracing::{debug, info};

const SCHEMA: &str = include_str!("../../migrations/001_activities.sql");

pub struct MySqlActivityStore {
    pool: MySqlPool,
    environment: String,
    /// Serializes the window check with its insert
    write_lock: Mutex<()>,
}

impl MySqlActivityStore {
    pub fn new(pool: MySqlPool, environment: impl Into<String>) -> Self {
        Self {
            pool,
            environment: environment.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create the activities table if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| crate::Error::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for MySqlActivityStore {
    async fn insert_deduplicated(&self, activity: NewActivity) -> Result<InsertOutcome> {
        let _guard = self.write_lock.lock().await;

        let window = Duration::milliseconds(DEDUP_WINDOW_MS);
        // <=> so that NULL member/zone/object_type compare equal
        let existing: Option<(u64,)> = sqlx::query_as(
            r#"
            SELECT id FROM activities
            WHERE member_id <=> ?
              AND zone <=> ?
              AND activity_type = ?
              AND object_type <=> ?
              AND timestamp BETWEEN ? AND ?
            LIMIT 1
            "#,
        )
        .bind(&activity.member_id)
        .bind(&activity.zone)
        .bind(&activity.activity_type)
        .bind(&activity.object_type)
        .bind(activity.timestamp - window)
        .bind(activity.timestamp + window)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| crate::Error::Database(e.to_string()))?;

        if let Some((id,)) = existing {
            debug!(
                existing_id = id,
                member_id = ?activity.member_id,
                zone = ?activity.zone,
                activity_type = %activity.activity_type,
                "Duplicate activity skipped"
            );
            return Ok(InsertOutcome::Duplicate);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO activities
                (member_id, activity_type, equipment, zone, object_type, timestamp, environment)
            VALUES
                (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.member_id)
        .bind(&activity.activity_type)
        .bind(&activity.equipment)
        .bind(&activity.zone)
        .bind(&activity.object_type)
        .bind(activity.timestamp)
        .bind(&self.environment)
        .execute(&self.pool)
        .await
        .map_err(|e| crate::Error::Database(e.to_string()))?;

        let id = result.last_insert_id();

        info!(
            id = id,
            member_id = ?activity.member_id,
            zone = ?activity.zone,
            activity_type = %activity.activity_type,
            "Activity saved"
        );

        Ok(InsertOutcome::Inserted(PersistedActivity {
            id,
            member_id: activity.member_id,
            activity_type: activity.activity_type,
            equipment: activity.equipment,
            zone: activity.zone,
            object_type: activity.object_type,
            timestamp: activity.timestamp,
            environment: self.environment.clone(),
        }))
    }

    async fn list(&self, range: &ActivityRange) -> Result<Vec<PersistedActivity>> {
        let rows = sqlx::query_as::<_, PersistedActivity>(
            r#"
            SELECT id, member_id, activity_type, equipment, zone, object_type, timestamp, environment
            FROM activities
            WHERE (? IS NULL OR timestamp >= ?)
              AND (? IS NULL OR timestamp <= ?)
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(range.start)
        .bind(range.start)
        .bind(range.end)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| crate::Error::Database(e.to_string()))?;

        Ok(rows)
    }
}
