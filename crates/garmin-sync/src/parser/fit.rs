//! FIT decoding via `fitparser`
//!
//! Session messages carry the device's own totals, so they are preferred.
//! Files without sessions (some partial exports) fall back to lap messages.

use chrono::NaiveDateTime;
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};

use super::{normalize_sport, Totals};
use crate::error::{GarminError, Result};
use crate::models::ActivityMetrics;

/// Degrees per semicircle, the FIT unit for positions
const SEMICIRCLE_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

pub fn parse(bytes: &[u8]) -> Result<ActivityMetrics> {
    let records = fitparser::from_bytes(bytes).map_err(|e| GarminError::decode(e.to_string()))?;

    let sessions: Vec<&FitDataRecord> = records
        .iter()
        .filter(|r| r.kind() == MesgNum::Session)
        .collect();
    let summaries = if sessions.is_empty() {
        records
            .iter()
            .filter(|r| r.kind() == MesgNum::Lap)
            .collect::<Vec<_>>()
    } else {
        sessions
    };

    if summaries.is_empty() {
        return Err(GarminError::malformed(
            "FIT file contains no session or lap messages",
        ));
    }

    let mut metrics = ActivityMetrics::default();
    let mut totals = Totals::default();
    let mut power_sum = 0.0;
    let mut power_count = 0u32;
    let mut steps = 0.0;

    for msg in &summaries {
        let duration = field_f64(msg, "total_timer_time")
            .or_else(|| field_f64(msg, "total_elapsed_time"))
            .unwrap_or(0.0);
        totals.add_lap(
            duration,
            field_f64(msg, "total_distance").unwrap_or(0.0),
            field_f64(msg, "total_calories").unwrap_or(0.0),
        );
        if let Some(hr) = field_f64(msg, "avg_heart_rate") {
            totals.add_average_heart_rate(hr);
        }
        if let Some(hr) = field_f64(msg, "max_heart_rate") {
            totals.observe_max_heart_rate(hr);
        }
        if let Some(power) = field_f64(msg, "avg_power").filter(|p| *p > 0.0) {
            power_sum += power;
            power_count += 1;
        }

        metrics.elevation_gain += field_f64(msg, "total_ascent").unwrap_or(0.0);
        metrics.elevation_loss += field_f64(msg, "total_descent").unwrap_or(0.0);
        steps += field_f64(msg, "total_strides").unwrap_or(0.0) * 2.0;

        if let Some(start) = field_timestamp(msg, "start_time") {
            metrics.start_time = Some(match metrics.start_time {
                Some(current) if current < start => current,
                _ => start,
            });
        }
        if metrics.activity_type.is_empty() {
            if let Some(sport) = field_string(msg, "sport") {
                metrics.activity_type = normalize_sport(&sport);
            }
        }
        if metrics.start_latitude.is_none() {
            if let (Some(lat), Some(lon)) = (
                field_f64(msg, "start_position_lat"),
                field_f64(msg, "start_position_long"),
            ) {
                metrics.start_latitude = Some(lat * SEMICIRCLE_TO_DEGREES);
                metrics.start_longitude = Some(lon * SEMICIRCLE_TO_DEGREES);
            }
        }
    }

    totals.apply(&mut metrics);
    if power_count > 0 {
        metrics.avg_power = power_sum / power_count as f64;
    }
    metrics.steps = steps.round() as i32;

    Ok(metrics)
}

fn field<'a>(record: &'a FitDataRecord, name: &str) -> Option<&'a Value> {
    record
        .fields()
        .iter()
        .find(|f| f.name() == name)
        .map(|f| f.value())
}

fn field_f64(record: &FitDataRecord, name: &str) -> Option<f64> {
    field(record, name).and_then(value_as_f64)
}

fn field_string(record: &FitDataRecord, name: &str) -> Option<String> {
    match field(record, name)? {
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn field_timestamp(record: &FitDataRecord, name: &str) -> Option<NaiveDateTime> {
    match field(record, name)? {
        Value::Timestamp(ts) => Some(ts.naive_utc()),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Byte(v) => Some(f64::from(*v)),
        Value::Enum(v) => Some(f64::from(*v)),
        Value::UInt8(v) => Some(f64::from(*v)),
        Value::UInt8z(v) => Some(f64::from(*v)),
        Value::SInt8(v) => Some(f64::from(*v)),
        Value::UInt16(v) => Some(f64::from(*v)),
        Value::UInt16z(v) => Some(f64::from(*v)),
        Value::SInt16(v) => Some(f64::from(*v)),
        Value::UInt32(v) => Some(f64::from(*v)),
        Value::UInt32z(v) => Some(f64::from(*v)),
        Value::SInt32(v) => Some(f64::from(*v)),
        Value::UInt64(v) => Some(*v as f64),
        Value::UInt64z(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::Float32(v) => Some(f64::from(*v)),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}
