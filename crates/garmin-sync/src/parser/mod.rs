//! Activity file decoding
//!
//! Downloaded files arrive as raw bytes. [`detect_format`] sniffs the leading
//! bytes to pick a decoder, and [`parse`] turns the file into
//! [`ActivityMetrics`]. All decoders aggregate laps the same way through
//! [`Totals`].

pub mod fit;
pub mod geo;
pub mod gpx;
pub mod tcx;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GarminError, Result};
use crate::models::ActivityMetrics;

/// Number of leading bytes inspected when sniffing XML formats
pub const DETECTION_WINDOW: usize = 512;

/// Activity file formats we can download and decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Fit,
    Tcx,
    Gpx,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fit => "fit",
            Self::Tcx => "tcx",
            Self::Gpx => "gpx",
        }
    }

    /// File extension used when persisting a file of this format
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileFormat {
    type Err = GarminError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fit" => Ok(Self::Fit),
            "tcx" => Ok(Self::Tcx),
            "gpx" => Ok(Self::Gpx),
            other => Err(GarminError::invalid_param(format!(
                "Unknown format: {}. Supported: fit, tcx, gpx",
                other
            ))),
        }
    }
}

/// Identify the format of a file from its leading bytes
pub fn detect_format(bytes: &[u8]) -> Result<FileFormat> {
    if bytes.len() >= 12 && &bytes[8..12] == b".FIT" {
        return Ok(FileFormat::Fit);
    }

    let window = &bytes[..bytes.len().min(DETECTION_WINDOW)];
    let head = String::from_utf8_lossy(window);

    if head.contains("<gpx") || head.contains("topografix.com/GPX") {
        Ok(FileFormat::Gpx)
    } else if head.contains("TrainingCenterDatabase") {
        Ok(FileFormat::Tcx)
    } else {
        Err(GarminError::UnrecognizedFormat)
    }
}

/// Decode a file of a known format
pub fn parse(bytes: &[u8], format: FileFormat) -> Result<ActivityMetrics> {
    match format {
        FileFormat::Fit => fit::parse(bytes),
        FileFormat::Tcx => tcx::parse(bytes),
        FileFormat::Gpx => gpx::parse(bytes),
    }
}

/// Detect and decode a file.
///
/// The detected format wins over `hint`; the hint is only used when the
/// content cannot be identified.
pub fn extract_metrics(bytes: &[u8], hint: Option<FileFormat>) -> Result<(FileFormat, ActivityMetrics)> {
    let format = match (detect_format(bytes), hint) {
        (Ok(detected), Some(hinted)) if detected != hinted => {
            debug!(%detected, %hinted, "File content does not match requested format");
            detected
        }
        (Ok(detected), _) => detected,
        (Err(_), Some(hinted)) => hinted,
        (Err(e), None) => return Err(e),
    };

    Ok((format, parse(bytes, format)?))
}

/// Map a sport name from a file onto our activity type keys
pub(crate) fn normalize_sport(sport: &str) -> String {
    match sport.trim().to_lowercase().as_str() {
        "" | "other" | "generic" | "all" | "invalid" => String::new(),
        "biking" | "cycling" => "cycling".to_string(),
        other => other.to_string(),
    }
}

/// Running totals across laps, sessions, and track points.
///
/// Average heart rate is the plain mean of every reading fed in, lap
/// averages and instantaneous samples alike, regardless of how long each
/// lap lasted.
#[derive(Debug, Default)]
pub(crate) struct Totals {
    duration: f64,
    distance: f64,
    calories: f64,
    max_heart_rate: f64,
    heart_rate_sum: f64,
    heart_rate_count: u32,
}

impl Totals {
    pub fn add_lap(&mut self, duration: f64, distance: f64, calories: f64) {
        self.duration += duration.max(0.0);
        self.distance += distance.max(0.0);
        self.calories += calories.max(0.0);
    }

    /// A lap or session average; counts towards the mean only
    pub fn add_average_heart_rate(&mut self, bpm: f64) {
        if bpm > 0.0 {
            self.heart_rate_sum += bpm;
            self.heart_rate_count += 1;
        }
    }

    /// An instantaneous reading; counts towards the mean and the maximum
    pub fn add_heart_rate_sample(&mut self, bpm: f64) {
        self.add_average_heart_rate(bpm);
        self.observe_max_heart_rate(bpm);
    }

    pub fn observe_max_heart_rate(&mut self, bpm: f64) {
        if bpm > self.max_heart_rate {
            self.max_heart_rate = bpm;
        }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn average_heart_rate(&self) -> i32 {
        if self.heart_rate_count == 0 {
            0
        } else {
            (self.heart_rate_sum / self.heart_rate_count as f64).round() as i32
        }
    }

    /// Copy the accumulated values onto `metrics`
    pub fn apply(&self, metrics: &mut ActivityMetrics) {
        metrics.duration = self.duration.round() as i64;
        metrics.distance = self.distance;
        metrics.calories = self.calories.round() as i32;
        metrics.max_heart_rate = self.max_heart_rate.round() as i32;
        metrics.avg_heart_rate = self.average_heart_rate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_fit_marker() {
        let mut bytes = vec![14u8, 0x10, 0x54, 0x08, 0, 0, 0, 0];
        bytes.extend_from_slice(b".FIT");
        bytes.extend_from_slice(&[0, 0]);
        assert_eq!(detect_format(&bytes).unwrap(), FileFormat::Fit);
    }

    #[test]
    fn test_detect_gpx() {
        let gpx = br#"<?xml version="1.0"?><gpx version="1.1" creator="x"></gpx>"#;
        assert_eq!(detect_format(gpx).unwrap(), FileFormat::Gpx);

        let ns_only = br#"<?xml version="1.0"?><g:root xmlns:g="http://www.topografix.com/GPX/1/1"/>"#;
        assert_eq!(detect_format(ns_only).unwrap(), FileFormat::Gpx);
    }

    #[test]
    fn test_detect_tcx() {
        let tcx = br#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"></TrainingCenterDatabase>"#;
        assert_eq!(detect_format(tcx).unwrap(), FileFormat::Tcx);
    }

    #[test]
    fn test_detect_only_looks_at_window() {
        let mut bytes = vec![b' '; DETECTION_WINDOW];
        bytes.extend_from_slice(b"<gpx version=\"1.1\">");
        assert!(matches!(
            detect_format(&bytes),
            Err(GarminError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn test_detect_unrecognized() {
        assert!(matches!(
            detect_format(b"PK\x03\x04 not an activity"),
            Err(GarminError::UnrecognizedFormat)
        ));
        assert!(matches!(detect_format(b""), Err(GarminError::UnrecognizedFormat)));
    }

    #[test]
    fn test_extract_metrics_prefers_detected_format() {
        let gpx = br#"<?xml version="1.0"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="0.0" lon="0.0"><ele>10</ele></trkpt>
    <trkpt lat="0.0" lon="1.0"><ele>20</ele></trkpt>
  </trkseg></trk>
</gpx>"#;
        let (format, metrics) = extract_metrics(gpx, Some(FileFormat::Fit)).unwrap();
        assert_eq!(format, FileFormat::Gpx);
        assert_eq!(metrics.elevation_gain, 10.0);
    }

    #[test]
    fn test_extract_metrics_unrecognized_without_hint() {
        assert!(matches!(
            extract_metrics(b"garbage", None),
            Err(GarminError::UnrecognizedFormat)
        ));
    }

    #[test]
    fn test_file_format_from_str() {
        assert_eq!("FIT".parse::<FileFormat>().unwrap(), FileFormat::Fit);
        assert_eq!(" gpx ".parse::<FileFormat>().unwrap(), FileFormat::Gpx);
        assert!("kml".parse::<FileFormat>().is_err());
        assert_eq!(FileFormat::Tcx.extension(), "tcx");
    }

    #[test]
    fn test_normalize_sport() {
        assert_eq!(normalize_sport("Running"), "running");
        assert_eq!(normalize_sport("Biking"), "cycling");
        assert_eq!(normalize_sport("Other"), "");
        assert_eq!(normalize_sport("generic"), "");
    }

    #[test]
    fn test_totals_unweighted_heart_rate_mean() {
        let mut totals = Totals::default();
        totals.add_lap(600.0, 2000.0, 100.0);
        totals.add_lap(60.0, 200.0, 10.0);
        totals.add_average_heart_rate(150.0);
        totals.add_average_heart_rate(130.0);
        totals.add_heart_rate_sample(0.0);

        let mut metrics = ActivityMetrics::default();
        totals.apply(&mut metrics);

        assert_eq!(metrics.duration, 660);
        assert_eq!(metrics.distance, 2200.0);
        assert_eq!(metrics.calories, 110);
        // A 10 minute lap and a 1 minute lap weigh the same
        assert_eq!(metrics.avg_heart_rate, 140);
        assert_eq!(metrics.max_heart_rate, 0);
    }
}
