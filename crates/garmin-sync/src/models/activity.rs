//! Activity data models for the Garmin Connect activity list
//!
//! These structures represent the summaries returned by the activity search
//! endpoint. Garmin is inconsistent about some shapes (the activity type in
//! particular), so decoding is deliberately lenient.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Activity type key used when the remote summary carries none we understand
pub const UNKNOWN_ACTIVITY_TYPE: &str = "unknown";

/// Activity summary returned from the activity list endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// Unique activity identifier
    pub activity_id: i64,

    /// User-provided or auto-generated activity name
    #[serde(default)]
    pub activity_name: Option<String>,

    /// Start time in the activity's local timezone ("YYYY-MM-DD HH:MM:SS")
    #[serde(default)]
    pub start_time_local: Option<String>,

    /// Start time in GMT
    #[serde(default, rename = "startTimeGMT")]
    pub start_time_gmt: Option<String>,

    /// Activity type, in whichever shape the endpoint chose
    #[serde(default)]
    pub activity_type: Option<ActivityTypeTag>,

    /// Distance in meters
    #[serde(default)]
    pub distance: Option<f64>,

    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<f64>,

    #[serde(default)]
    pub calories: Option<f64>,

    /// Average heart rate in bpm
    #[serde(default, rename = "averageHR", alias = "avgHR")]
    pub average_hr: Option<f64>,

    /// Maximum heart rate in bpm
    #[serde(default, rename = "maxHR")]
    pub max_hr: Option<f64>,

    /// Average power in watts
    #[serde(default)]
    pub avg_power: Option<f64>,

    /// Total elevation gain in meters
    #[serde(default)]
    pub elevation_gain: Option<f64>,

    /// Total elevation loss in meters
    #[serde(default)]
    pub elevation_loss: Option<f64>,

    #[serde(default)]
    pub steps: Option<f64>,

    #[serde(default)]
    pub start_latitude: Option<f64>,

    #[serde(default)]
    pub start_longitude: Option<f64>,
}

/// Activity type as it appears in list responses.
///
/// Usually an object with a `typeKey`, occasionally a bare string, and on
/// some older endpoints something else entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivityTypeTag {
    Keyed(ActivityType),
    Name(String),
    Other(serde_json::Value),
}

/// Activity type information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityType {
    /// Type key (e.g., "running", "cycling", "walking")
    pub type_key: String,

    #[serde(default)]
    pub type_id: Option<u64>,

    #[serde(default)]
    pub parent_type_id: Option<u64>,
}

impl ActivityTypeTag {
    /// The type key, if the tag carried a usable one
    pub fn type_key(&self) -> Option<&str> {
        let key = match self {
            Self::Keyed(t) => t.type_key.as_str(),
            Self::Name(name) => name.as_str(),
            Self::Other(_) => return None,
        };
        let key = key.trim();
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}

impl ActivitySummary {
    /// Activity type key, falling back to "unknown"
    pub fn type_key(&self) -> String {
        self.activity_type
            .as_ref()
            .and_then(|t| t.type_key())
            .map(|k| k.to_lowercase())
            .unwrap_or_else(|| UNKNOWN_ACTIVITY_TYPE.to_string())
    }

    /// Parsed local start time, `None` when missing or unparseable
    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.start_time_local
            .as_deref()
            .and_then(parse_garmin_datetime)
    }
}

/// Parse the datetime formats Garmin uses in activity summaries
pub fn parse_garmin_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_deserialize_activity_summary() {
        let json = r#"{
            "activityId": 12345678,
            "activityName": "Morning Run",
            "startTimeLocal": "2025-01-15 07:30:00",
            "startTimeGMT": "2025-01-15 06:30:00",
            "activityType": {"typeKey": "running", "typeId": 1},
            "distance": 5000.0,
            "duration": 1800.5,
            "calories": 350.0,
            "averageHR": 145.0,
            "maxHR": 172.0,
            "elevationGain": 42.0,
            "steps": 5400
        }"#;

        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(activity.activity_id, 12345678);
        assert_eq!(activity.activity_name.as_deref(), Some("Morning Run"));
        assert_eq!(activity.type_key(), "running");
        assert_eq!(activity.average_hr, Some(145.0));
        assert_eq!(activity.max_hr, Some(172.0));
        assert_eq!(activity.steps, Some(5400.0));
        assert_eq!(activity.distance, Some(5000.0));
        assert_eq!(activity.start_time().unwrap().to_string(), "2025-01-15 07:30:00");
    }

    #[test]
    fn test_activity_type_as_plain_string() {
        let json = r#"{"activityId": 1, "activityType": "Cycling"}"#;
        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(activity.type_key(), "cycling");
    }

    #[test]
    fn test_activity_type_unusable_shapes() {
        let json = r#"{"activityId": 1, "activityType": {"typeId": 9}}"#;
        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert!(matches!(
            activity.activity_type,
            Some(ActivityTypeTag::Other(_))
        ));
        assert_eq!(activity.type_key(), UNKNOWN_ACTIVITY_TYPE);

        let json = r#"{"activityId": 2, "activityType": null}"#;
        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(activity.type_key(), UNKNOWN_ACTIVITY_TYPE);

        let json = r#"{"activityId": 3, "activityType": "  "}"#;
        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(activity.type_key(), UNKNOWN_ACTIVITY_TYPE);
    }

    #[test]
    fn test_legacy_avg_hr_alias() {
        let json = r#"{"activityId": 7, "avgHR": 133.0}"#;
        let activity: ActivitySummary = serde_json::from_str(json).unwrap();
        assert_eq!(activity.average_hr, Some(133.0));
    }

    #[test]
    fn test_parse_garmin_datetime() {
        let dt = parse_garmin_datetime("2024-03-01 08:00:00").unwrap();
        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.hour(), 8);

        assert!(parse_garmin_datetime("2024-03-01 08:00:00.0").is_some());
        assert!(parse_garmin_datetime("2024-03-01T08:00:00").is_some());
        assert!(parse_garmin_datetime("yesterday").is_none());
    }

    #[test]
    fn test_start_time_missing() {
        let activity = ActivitySummary {
            activity_id: 1,
            ..Default::default()
        };
        assert!(activity.start_time().is_none());
    }
}
