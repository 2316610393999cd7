//! Activity record types

use crate::classifier::ZoneEvent;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Two writes with the same key closer than this are one activity
pub const DEDUP_WINDOW_MS: i64 = 2_000;

/// Activity to persist
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub member_id: Option<String>,
    pub activity_type: String,
    pub equipment: Option<String>,
    pub zone: Option<String>,
    pub object_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NewActivity {
    /// Activity for a zone event received at `at` (sensor time wins when present)
    pub fn from_zone_event(event: &ZoneEvent, at: DateTime<Utc>) -> Self {
        Self {
            member_id: event.object_id.clone(),
            activity_type: event.event_kind.clone(),
            equipment: event.equipment.clone(),
            zone: Some(event.zone.clone()),
            object_type: Some(event.object_class.clone()),
            timestamp: event.occurred_at.unwrap_or(at),
        }
    }

    /// Same dedup key and within the window
    pub fn matches(&self, other: &PersistedActivity) -> bool {
        self.member_id == other.member_id
            && self.zone == other.zone
            && self.activity_type == other.activity_type
            && self.object_type == other.object_type
            && (self.timestamp - other.timestamp).num_milliseconds().abs() <= DEDUP_WINDOW_MS
    }
}

/// Activity API request body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(default)]
    pub activity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equipment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
}

impl From<&NewActivity> for ActivityRequest {
    fn from(activity: &NewActivity) -> Self {
        Self {
            member_id: activity.member_id.clone(),
            activity_type: Some(activity.activity_type.clone()),
            equipment: activity.equipment.clone(),
            zone: activity.zone.clone(),
            timestamp: Some(activity.timestamp),
            object_type: activity.object_type.clone(),
        }
    }
}

impl ActivityRequest {
    /// Validate; a missing timestamp means `now`
    pub fn into_new_activity(self, now: DateTime<Utc>) -> Result<NewActivity> {
        let activity_type = self
            .activity_type
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Validation("Missing required field: activityType".to_string()))?;

        Ok(NewActivity {
            member_id: self.member_id,
            activity_type,
            equipment: self.equipment,
            zone: self.zone,
            object_type: self.object_type,
            timestamp: self.timestamp.unwrap_or(now),
        })
    }
}

/// Stored activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PersistedActivity {
    pub id: u64,
    pub member_id: Option<String>,
    pub activity_type: String,
    pub equipment: Option<String>,
    pub zone: Option<String>,
    pub object_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
}

/// Result of a deduplicated insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(PersistedActivity),
    /// A matching record already exists inside the window
    Duplicate,
}

/// Inclusive time bounds for listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ActivityRange {
    /// Parse `start`/`end` query values (RFC 3339 or `YYYY-MM-DD`)
    ///
    /// A date-only `end` covers the whole day (up to 23:59:59.999).
    pub fn from_query(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = match start.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_bound(s, NaiveTime::MIN)?),
            None => None,
        };

        let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
            .ok_or_else(|| Error::Internal("invalid end-of-day time".to_string()))?;
        let end = match end.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(parse_bound(s, end_of_day)?),
            None => None,
        };

        Ok(Self { start, end })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |start| at >= start) && self.end.map_or(true, |end| at <= end)
    }
}

fn parse_bound(value: &str, date_only_time: NaiveTime) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(date_only_time)))
        .map_err(|_| Error::Validation(format!("Invalid date: {}", value)))
}

/// Drop records whose (member_id, activity_type, zone, object_type, timestamp)
/// repeats an earlier record, keeping order
pub fn suppress_exact_duplicates(records: Vec<PersistedActivity>) -> Vec<PersistedActivity> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| {
            seen.insert((
                r.member_id.clone(),
                r.activity_type.clone(),
                r.zone.clone(),
                r.object_type.clone(),
                r.timestamp,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted(id: u64, member: &str, at: DateTime<Utc>) -> PersistedActivity {
        PersistedActivity {
            id,
            member_id: Some(member.to_string()),
            activity_type: "start".into(),
            equipment: None,
            zone: Some("Cardio Area".into()),
            object_type: Some("person".into()),
            timestamp: at,
            environment: "production".into(),
        }
    }

    #[test]
    fn test_missing_activity_type_is_rejected() {
        let err = ActivityRequest::default().into_new_activity(Utc::now()).unwrap_err();
        assert!(matches!(err, Error::Validation(ref m) if m == "Missing required field: activityType"));
    }

    #[test]
    fn test_request_defaults_timestamp_to_now() {
        let now = Utc::now();
        let request: ActivityRequest =
            serde_json::from_value(serde_json::json!({"activityType": "start", "memberId": "42"})).unwrap();
        let activity = request.into_new_activity(now).unwrap();
        assert_eq!(activity.timestamp, now);
        assert_eq!(activity.member_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_dedup_window_edges() {
        let at = Utc::now();
        let new = NewActivity {
            member_id: Some("42".into()),
            activity_type: "start".into(),
            equipment: None,
            zone: Some("Cardio Area".into()),
            object_type: Some("person".into()),
            timestamp: at,
        };

        assert!(new.matches(&persisted(1, "42", at + chrono::Duration::milliseconds(2_000))));
        assert!(new.matches(&persisted(1, "42", at - chrono::Duration::milliseconds(1_500))));
        assert!(!new.matches(&persisted(1, "42", at + chrono::Duration::milliseconds(2_001))));
        assert!(!new.matches(&persisted(1, "7", at)));
    }

    #[test]
    fn test_range_date_only_end_covers_whole_day() {
        let range = ActivityRange::from_query(Some("2024-03-01"), Some("2024-03-01")).unwrap();
        let start = range.start.unwrap();
        let end = range.end.unwrap();

        assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert_eq!(end - start, chrono::Duration::milliseconds(86_399_999));
        assert!(range.contains(start + chrono::Duration::hours(23)));
    }

    #[test]
    fn test_range_accepts_rfc3339_and_rejects_garbage() {
        let range = ActivityRange::from_query(None, Some("2024-03-01T10:00:00+09:00")).unwrap();
        assert!(range.start.is_none());
        assert_eq!(range.end.unwrap().to_rfc3339(), "2024-03-01T01:00:00+00:00");

        assert!(matches!(
            ActivityRange::from_query(Some("yesterday"), None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_exact_duplicates_suppressed() {
        let at = Utc::now();
        let records = vec![
            persisted(3, "42", at),
            persisted(2, "42", at),
            persisted(1, "42", at - chrono::Duration::seconds(1)),
        ];
        let ids: Vec<u64> = suppress_exact_duplicates(records).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }
}
