//! GPX track decoding
//!
//! GPX exports carry points only, so distance and elevation come from the
//! track geometry. Heart rate lives in vendor extensions that the `gpx`
//! crate does not expose; those fields stay zero.

use std::io::BufReader;

use chrono::{DateTime, NaiveDateTime};

use super::geo::{elevation_gain, elevation_loss, path_distance};
use super::normalize_sport;
use crate::error::{GarminError, Result};
use crate::models::ActivityMetrics;

pub fn parse(bytes: &[u8]) -> Result<ActivityMetrics> {
    let doc = ::gpx::read(BufReader::new(bytes)).map_err(|e| GarminError::decode(e.to_string()))?;

    let mut metrics = ActivityMetrics::default();
    let mut first_time: Option<NaiveDateTime> = None;
    let mut last_time: Option<NaiveDateTime> = None;
    let mut point_count = 0usize;

    for track in &doc.tracks {
        if metrics.activity_type.is_empty() {
            if let Some(kind) = track.type_.as_deref() {
                metrics.activity_type = normalize_sport(kind);
            }
        }

        for segment in &track.segments {
            let mut positions = Vec::with_capacity(segment.points.len());
            let mut elevations = Vec::with_capacity(segment.points.len());

            for point in &segment.points {
                let p = point.point();
                if metrics.start_latitude.is_none() {
                    metrics.start_latitude = Some(p.y());
                    metrics.start_longitude = Some(p.x());
                }
                positions.push((p.y(), p.x()));

                if let Some(ele) = point.elevation {
                    elevations.push(ele);
                }

                let time = point
                    .time
                    .as_ref()
                    .and_then(|t| t.format().ok())
                    .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                    .map(|dt| dt.naive_utc());
                if let Some(t) = time {
                    first_time.get_or_insert(t);
                    last_time = Some(t);
                }
            }

            point_count += segment.points.len();
            metrics.distance += path_distance(&positions);
            metrics.elevation_gain += elevation_gain(&elevations);
            metrics.elevation_loss += elevation_loss(&elevations);
        }
    }

    if point_count == 0 {
        return Err(GarminError::malformed("GPX file contains no track points"));
    }

    metrics.start_time = first_time;
    if let (Some(start), Some(end)) = (first_time, last_time) {
        metrics.duration = (end - start).num_seconds().max(0);
    }

    Ok(metrics)
}
