//! Database models matching the activity store tables

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GarminError, Result};

/// One row per distinct remote activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub remote_id: i64,
    /// Local time as reported by Garmin
    pub start_time: NaiveDateTime,
    pub activity_type: String,
    pub activity_name: Option<String>,
    /// Seconds
    pub duration: i64,
    /// Meters
    pub distance: f64,
    pub max_heart_rate: i32,
    pub avg_heart_rate: i32,
    pub avg_power: f64,
    pub calories: i32,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub steps: i32,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub file_path: Option<String>,
    pub file_type: Option<String>,
    pub file_size: i64,
    pub downloaded: bool,
    pub created_at: DateTime<Utc>,
    pub last_sync_at: DateTime<Utc>,
}

impl ActivityRecord {
    /// A fresh, not yet downloaded record
    pub fn new(remote_id: i64, start_time: NaiveDateTime, activity_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            remote_id,
            start_time,
            activity_type: activity_type.into(),
            activity_name: None,
            duration: 0,
            distance: 0.0,
            max_heart_rate: 0,
            avg_heart_rate: 0,
            avg_power: 0.0,
            calories: 0,
            elevation_gain: 0.0,
            elevation_loss: 0.0,
            steps: 0,
            start_latitude: None,
            start_longitude: None,
            file_path: None,
            file_type: None,
            file_size: 0,
            downloaded: false,
            created_at: now,
            last_sync_at: now,
        }
    }

    pub fn distance_km(&self) -> f64 {
        self.distance / 1000.0
    }

    /// Format duration as H:MM:SS or M:SS
    pub fn duration_formatted(&self) -> String {
        let total = self.duration.max(0);
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;
        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }
}

/// Columns that listings may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    StartTime,
    Distance,
    Duration,
    ActivityType,
    AvgHeartRate,
    Calories,
}

impl SortKey {
    pub fn column(&self) -> &'static str {
        match self {
            Self::StartTime => "start_time",
            Self::Distance => "distance",
            Self::Duration => "duration",
            Self::ActivityType => "activity_type",
            Self::AvgHeartRate => "avg_heart_rate",
            Self::Calories => "calories",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Criteria for listing stored activities
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub activity_type: Option<String>,
    /// Inclusive start date
    pub date_from: Option<NaiveDate>,
    /// Inclusive end date
    pub date_to: Option<NaiveDate>,
    /// Meters
    pub min_distance: Option<f64>,
    pub max_distance: Option<f64>,
    /// Seconds
    pub min_duration: Option<i64>,
    pub max_duration: Option<i64>,
    pub downloaded: Option<bool>,
    pub sort_by: SortKey,
    pub order: SortOrder,
    pub limit: Option<u32>,
    pub offset: u32,
}

impl ActivityFilter {
    /// Reject ranges that can never match
    pub fn validate(&self) -> Result<()> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(GarminError::invalid_param(format!(
                    "date range is empty: {} is after {}",
                    from, to
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_distance, self.max_distance) {
            if min > max {
                return Err(GarminError::invalid_param("min distance exceeds max distance"));
            }
        }
        if let (Some(min), Some(max)) = (self.min_duration, self.max_duration) {
            if min > max {
                return Err(GarminError::invalid_param("min duration exceeds max duration"));
            }
        }
        Ok(())
    }
}

/// Store-wide totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCounts {
    pub total: u64,
    pub downloaded: u64,
    pub missing: u64,
}

/// A completed sync run as recorded in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub finished_at: DateTime<Utc>,
    pub total_activities: u32,
    pub new_activities: u32,
    pub downloaded_files: u32,
    pub updated_activities: u32,
    pub error_count: u32,
    pub duration_ms: u64,
}
