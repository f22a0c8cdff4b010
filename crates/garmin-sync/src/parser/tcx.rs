//! Training Center XML decoding

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;

use super::geo::{elevation_gain, elevation_loss, path_distance};
use super::{normalize_sport, Totals};
use crate::error::{GarminError, Result};
use crate::models::ActivityMetrics;

#[derive(Debug, Deserialize)]
struct TrainingCenterDatabase {
    #[serde(rename = "Activities", default)]
    activities: Option<Activities>,
}

#[derive(Debug, Deserialize)]
struct Activities {
    #[serde(rename = "Activity", default)]
    activity: Vec<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    #[serde(rename = "@Sport", default)]
    sport: Option<String>,
    #[serde(rename = "Id", default)]
    id: Option<String>,
    #[serde(rename = "Lap", default)]
    laps: Vec<Lap>,
}

#[derive(Debug, Deserialize)]
struct Lap {
    #[serde(rename = "@StartTime", default)]
    start_time: Option<String>,
    #[serde(rename = "TotalTimeSeconds", default)]
    total_time_seconds: Option<f64>,
    #[serde(rename = "DistanceMeters", default)]
    distance_meters: Option<f64>,
    #[serde(rename = "Calories", default)]
    calories: Option<f64>,
    #[serde(rename = "AverageHeartRateBpm", default)]
    average_heart_rate: Option<HeartRate>,
    #[serde(rename = "MaximumHeartRateBpm", default)]
    maximum_heart_rate: Option<HeartRate>,
    #[serde(rename = "Track", default)]
    tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct HeartRate {
    #[serde(rename = "Value")]
    value: f64,
}

#[derive(Debug, Deserialize)]
struct Track {
    #[serde(rename = "Trackpoint", default)]
    points: Vec<Trackpoint>,
}

#[derive(Debug, Deserialize)]
struct Trackpoint {
    #[serde(rename = "Position", default)]
    position: Option<Position>,
    #[serde(rename = "AltitudeMeters", default)]
    altitude: Option<f64>,
    #[serde(rename = "HeartRateBpm", default)]
    heart_rate: Option<HeartRate>,
}

#[derive(Debug, Deserialize)]
struct Position {
    #[serde(rename = "LatitudeDegrees")]
    latitude: f64,
    #[serde(rename = "LongitudeDegrees")]
    longitude: f64,
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.naive_utc())
}

pub fn parse(bytes: &[u8]) -> Result<ActivityMetrics> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| GarminError::decode(format!("TCX is not valid UTF-8: {}", e)))?;
    let doc: TrainingCenterDatabase =
        quick_xml::de::from_str(text).map_err(|e| GarminError::decode(e.to_string()))?;

    let activities = doc.activities.map(|a| a.activity).unwrap_or_default();
    if activities.iter().all(|a| a.laps.is_empty()) {
        return Err(GarminError::malformed("TCX file contains no laps"));
    }

    let mut metrics = ActivityMetrics::default();
    let mut totals = Totals::default();
    let mut positions = Vec::new();
    let mut altitudes = Vec::new();

    for activity in &activities {
        if metrics.activity_type.is_empty() {
            if let Some(sport) = activity.sport.as_deref() {
                metrics.activity_type = normalize_sport(sport);
            }
        }
        if metrics.start_time.is_none() {
            metrics.start_time = activity.id.as_deref().and_then(parse_timestamp);
        }

        for lap in &activity.laps {
            if let Some(start) = lap.start_time.as_deref().and_then(parse_timestamp) {
                metrics.start_time = Some(match metrics.start_time {
                    Some(current) if current < start => current,
                    _ => start,
                });
            }

            totals.add_lap(
                lap.total_time_seconds.unwrap_or(0.0),
                lap.distance_meters.unwrap_or(0.0),
                lap.calories.unwrap_or(0.0),
            );
            if let Some(hr) = &lap.average_heart_rate {
                totals.add_average_heart_rate(hr.value);
            }
            if let Some(hr) = &lap.maximum_heart_rate {
                totals.observe_max_heart_rate(hr.value);
            }

            for point in lap.tracks.iter().flat_map(|t| t.points.iter()) {
                if let Some(hr) = &point.heart_rate {
                    totals.add_heart_rate_sample(hr.value);
                }
                if let Some(pos) = &point.position {
                    positions.push((pos.latitude, pos.longitude));
                }
                if let Some(alt) = point.altitude {
                    altitudes.push(alt);
                }
            }
        }
    }

    totals.apply(&mut metrics);
    if totals.distance() <= 0.0 {
        metrics.distance = path_distance(&positions);
    }
    metrics.elevation_gain = elevation_gain(&altitudes);
    metrics.elevation_loss = elevation_loss(&altitudes);
    if let Some(&(lat, lon)) = positions.first() {
        metrics.start_latitude = Some(lat);
        metrics.start_longitude = Some(lon);
    }

    Ok(metrics)
}
