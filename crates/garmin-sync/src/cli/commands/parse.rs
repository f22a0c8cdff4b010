//! Decode a local activity file

use std::path::Path;

use serde::Serialize;

use crate::cli::{print_json, OutputFormat};
use crate::error::Result;
use crate::models::ActivityMetrics;
use crate::parser::{self, FileFormat};

#[derive(Debug, Serialize)]
struct ParsedFile<'a> {
    path: &'a str,
    format: FileFormat,
    metrics: ActivityMetrics,
}

/// Detect the format of `path` and print the metrics extracted from it
pub async fn parse_file(path: &Path, format: Option<FileFormat>, output: OutputFormat) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let (format, metrics) = parser::extract_metrics(&bytes, format)?;

    let display_path = path.display().to_string();
    if output == OutputFormat::Json {
        return print_json(&ParsedFile {
            path: &display_path,
            format,
            metrics,
        });
    }

    println!("File:      {} ({})", display_path, format);
    println!(
        "Type:      {}",
        if metrics.activity_type.is_empty() {
            "-"
        } else {
            metrics.activity_type.as_str()
        }
    );
    match metrics.start_time {
        Some(start) => println!("Start:     {} UTC", start.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Start:     unknown"),
    }
    println!("Duration:  {} s", metrics.duration);
    println!("Distance:  {:.1} m", metrics.distance);
    println!("Avg HR:    {}", metrics.avg_heart_rate);
    println!("Max HR:    {}", metrics.max_heart_rate);
    println!("Avg power: {:.0} W", metrics.avg_power);
    println!("Calories:  {}", metrics.calories);
    println!(
        "Elevation: +{:.1} m / -{:.1} m",
        metrics.elevation_gain, metrics.elevation_loss
    );
    println!("Steps:     {}", metrics.steps);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GarminError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_parse_file_rejects_unknown_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "just some notes").unwrap();

        assert!(matches!(
            parse_file(&path, None, OutputFormat::Json).await,
            Err(GarminError::UnrecognizedFormat)
        ));
    }

    #[tokio::test]
    async fn test_parse_file_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            parse_file(&dir.path().join("absent.fit"), None, OutputFormat::Table).await,
            Err(GarminError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_parse_file_gpx() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("walk.gpx");
        std::fs::write(
            &path,
            r#"<?xml version="1.0"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><type>walking</type><trkseg>
    <trkpt lat="0.0" lon="0.0"><time>2024-03-01T08:00:00Z</time></trkpt>
    <trkpt lat="0.0" lon="0.01"><time>2024-03-01T08:15:00Z</time></trkpt>
  </trkseg></trk>
</gpx>"#,
        )
        .unwrap();

        assert!(parse_file(&path, None, OutputFormat::Json).await.is_ok());
    }
}
