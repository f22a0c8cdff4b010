//! Metrics extracted from a downloaded activity file

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Summary metrics decoded from one FIT, TCX, or GPX file.
///
/// Zero means "not present in the file"; the sync merge never lets a zero
/// value replace a known one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetrics {
    /// First recorded timestamp, UTC as written by the device
    pub start_time: Option<NaiveDateTime>,
    /// Normalized activity type, empty when the file does not say
    pub activity_type: String,
    /// Seconds
    pub duration: i64,
    /// Meters
    pub distance: f64,
    pub max_heart_rate: i32,
    pub avg_heart_rate: i32,
    /// Watts
    pub avg_power: f64,
    pub calories: i32,
    /// Meters
    pub elevation_gain: f64,
    /// Meters
    pub elevation_loss: f64,
    pub steps: i32,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
}
