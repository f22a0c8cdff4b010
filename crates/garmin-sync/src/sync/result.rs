//! Outcome of one sync run

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::db::models::SyncRun;
use crate::error::GarminError;

/// Counters and per-activity errors collected during a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncResult {
    /// Activities returned by the remote listing
    pub total_activities: u32,
    /// Records created this run
    pub new_activities: u32,
    /// Files fetched and persisted this run
    pub downloaded_files: u32,
    /// Records whose metrics changed after parsing a file
    pub updated_activities: u32,
    /// "activity <id>: <message>", in processing order
    pub errors: Vec<String>,
    /// Set when the run stopped early on cancellation
    pub cancelled: bool,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

impl SyncResult {
    pub(crate) fn record_error(&mut self, remote_id: i64, err: &GarminError) {
        self.errors.push(format!("activity {}: {}", remote_id, err));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Row persisted to `sync_runs` for status queries
    pub fn to_run(&self, finished_at: DateTime<Utc>) -> SyncRun {
        SyncRun {
            finished_at,
            total_activities: self.total_activities,
            new_activities: self.new_activities,
            downloaded_files: self.downloaded_files,
            updated_activities: self.updated_activities,
            error_count: self.errors.len() as u32,
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {}, New: {}, Downloaded: {}, Updated: {}, Errors: {}",
            self.total_activities,
            self.new_activities,
            self.downloaded_files,
            self.updated_activities,
            self.errors.len()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
