//! Folding extracted metrics into a stored record
//!
//! A zero or missing value means "unknown" and never replaces what the
//! record already holds.

use crate::db::models::ActivityRecord;
use crate::models::{ActivityMetrics, ActivitySummary, UNKNOWN_ACTIVITY_TYPE};

/// Merge `metrics` into `record`, returning whether any field changed.
///
/// The file's activity type only fills a record typed "unknown". The file's
/// start time only replaces the record's when `start_time_is_fallback` says
/// the record's time was made up because the summary had none.
pub fn apply_metrics(
    record: &mut ActivityRecord,
    metrics: &ActivityMetrics,
    start_time_is_fallback: bool,
) -> bool {
    let mut changed = false;

    changed |= merge_int(&mut record.duration, metrics.duration);
    changed |= merge_float(&mut record.distance, metrics.distance);
    changed |= merge_int(&mut record.max_heart_rate, metrics.max_heart_rate);
    changed |= merge_int(&mut record.avg_heart_rate, metrics.avg_heart_rate);
    changed |= merge_float(&mut record.avg_power, metrics.avg_power);
    changed |= merge_int(&mut record.calories, metrics.calories);
    changed |= merge_float(&mut record.elevation_gain, metrics.elevation_gain);
    changed |= merge_float(&mut record.elevation_loss, metrics.elevation_loss);
    changed |= merge_int(&mut record.steps, metrics.steps);
    changed |= merge_coordinate(&mut record.start_latitude, metrics.start_latitude);
    changed |= merge_coordinate(&mut record.start_longitude, metrics.start_longitude);

    if record.activity_type == UNKNOWN_ACTIVITY_TYPE
        && !metrics.activity_type.is_empty()
        && metrics.activity_type != UNKNOWN_ACTIVITY_TYPE
    {
        record.activity_type = metrics.activity_type.clone();
        changed = true;
    }
    if start_time_is_fallback {
        if let Some(start) = metrics.start_time.filter(|s| *s != record.start_time) {
            record.start_time = start;
            changed = true;
        }
    }

    changed
}

/// Best-effort metrics carried by a list summary, in record units
pub fn metrics_from_summary(summary: &ActivitySummary) -> ActivityMetrics {
    let float = |v: Option<f64>| v.filter(|v| v.is_finite()).unwrap_or(0.0);
    let int = |v: Option<f64>| float(v).round() as i32;

    ActivityMetrics {
        start_time: summary.start_time(),
        activity_type: String::new(),
        duration: float(summary.duration).round() as i64,
        distance: float(summary.distance),
        max_heart_rate: int(summary.max_hr),
        avg_heart_rate: int(summary.average_hr),
        avg_power: float(summary.avg_power),
        calories: int(summary.calories),
        elevation_gain: float(summary.elevation_gain),
        elevation_loss: float(summary.elevation_loss),
        steps: int(summary.steps),
        start_latitude: summary.start_latitude.filter(|v| v.is_finite()),
        start_longitude: summary.start_longitude.filter(|v| v.is_finite()),
    }
}

fn merge_int<T: Copy + PartialEq + Default>(field: &mut T, value: T) -> bool {
    if value == T::default() || *field == value {
        return false;
    }
    *field = value;
    true
}

fn merge_float(field: &mut f64, value: f64) -> bool {
    if !value.is_finite() || value == 0.0 || *field == value {
        return false;
    }
    *field = value;
    true
}

fn merge_coordinate(field: &mut Option<f64>, value: Option<f64>) -> bool {
    match value {
        Some(v) if v.is_finite() && *field != Some(v) => {
            *field = Some(v);
            true
        }
        _ => false,
    }
}
