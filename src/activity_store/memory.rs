use super::{ActivityRange, ActivityStore, InsertOutcome, NewActivity, PersistedActivity};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-process activity store
pub struct MemoryActivityStore {
    environment: String,
    records: RwLock<Vec<PersistedActivity>>,
}

impl MemoryActivityStore {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            records: RwLock::new(Vec::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl ActivityStore for MemoryActivityStore {
    async fn insert_deduplicated(&self, activity: NewActivity) -> Result<InsertOutcome> {
        let mut records = self.records.write().await;

        if records.iter().any(|r| activity.matches(r)) {
            return Ok(InsertOutcome::Duplicate);
        }

        let record = PersistedActivity {
            id: records.len() as u64 + 1,
            member_id: activity.member_id,
            activity_type: activity.activity_type,
            equipment: activity.equipment,
            zone: activity.zone,
            object_type: activity.object_type,
            timestamp: activity.timestamp,
            environment: self.environment.clone(),
        };
        records.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn list(&self, range: &ActivityRange) -> Result<Vec<PersistedActivity>> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .iter()
            .filter(|r| range.contains(r.timestamp))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    fn activity(member: &str, at: chrono::DateTime<Utc>) -> NewActivity {
        NewActivity {
            member_id: Some(member.to_string()),
            activity_type: "start".into(),
            equipment: Some("Treadmill".into()),
            zone: Some("Cardio Area".into()),
            object_type: Some("person".into()),
            timestamp: at,
        }
    }

    #[tokio::test]
    async fn test_burst_persists_one_record() {
        let store = Arc::new(MemoryActivityStore::new("production"));
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let at = now + Duration::milliseconds(i * 200);
            handles.push(tokio::spawn(async move {
                store.insert_deduplicated(activity("42", at)).await.unwrap()
            }));
        }

        let mut inserted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), InsertOutcome::Inserted(_)) {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_outside_window_or_other_member_inserts() {
        let store = MemoryActivityStore::new("development");
        let now = Utc::now();

        store.insert_deduplicated(activity("42", now)).await.unwrap();
        let later = store
            .insert_deduplicated(activity("42", now + Duration::seconds(3)))
            .await
            .unwrap();
        let other = store.insert_deduplicated(activity("7", now)).await.unwrap();

        assert!(matches!(later, InsertOutcome::Inserted(_)));
        match other {
            InsertOutcome::Inserted(record) => assert_eq!(record.environment, "development"),
            InsertOutcome::Duplicate => panic!("expected insert"),
        }
    }

    #[tokio::test]
    async fn test_list_newest_first_in_range() {
        let store = MemoryActivityStore::new("production");
        let now = Utc::now();

        store.insert_deduplicated(activity("1", now - Duration::days(2))).await.unwrap();
        store.insert_deduplicated(activity("2", now - Duration::hours(1))).await.unwrap();
        store.insert_deduplicated(activity("3", now)).await.unwrap();

        let all = store.list(&ActivityRange::default()).await.unwrap();
        let members: Vec<_> = all.iter().filter_map(|r| r.member_id.as_deref()).collect();
        assert_eq!(members, vec!["3", "2", "1"]);

        let recent = store
            .list(&ActivityRange {
                start: Some(now - Duration::days(1)),
                end: None,
            })
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);
    }
}
