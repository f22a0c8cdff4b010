//! Local activity queries for garmin-sync

use chrono::NaiveDate;

use crate::cli::{print_json, OutputFormat};
use crate::config::AppConfig;
use crate::db::models::{ActivityFilter, ActivityRecord};
use crate::error::{GarminError, Result};
use crate::storage::{ActivityDb, ActivityStore};

/// List stored activities matching `filter`
pub async fn list(config: &AppConfig, output: OutputFormat, filter: ActivityFilter) -> Result<()> {
    let db = ActivityDb::open(&config.db_path)?;
    let activities = db.list_filtered(&filter)?;

    if output == OutputFormat::Json {
        return print_json(&activities);
    }

    if activities.is_empty() {
        println!("No activities found.");
        return Ok(());
    }

    println!(
        "{:<12} {:<10} {:<15} {:>10} {:>10} {:>6} {:<5}",
        "ID", "Date", "Type", "Distance", "Duration", "HR", "File"
    );
    println!("{}", "-".repeat(75));

    for activity in &activities {
        println!(
            "{:<12} {:<10} {:<15} {:>10} {:>10} {:>6} {:<5}",
            activity.remote_id,
            activity.start_time.format("%Y-%m-%d"),
            truncate(&activity.activity_type, 15),
            format_distance(activity),
            activity.duration_formatted(),
            format_heart_rate(activity.avg_heart_rate),
            activity.file_type.as_deref().unwrap_or("-"),
        );
    }

    println!("\nShowing {} activities", activities.len());

    Ok(())
}

/// Show one stored activity
pub async fn show(config: &AppConfig, output: OutputFormat, id: i64) -> Result<()> {
    let db = ActivityDb::open(&config.db_path)?;
    let activity = db.get(id)?;

    if output == OutputFormat::Json {
        return print_json(&activity);
    }

    println!("Activity {}", activity.remote_id);
    if let Some(name) = &activity.activity_name {
        println!("  Name:           {}", name);
    }
    println!("  Type:           {}", activity.activity_type);
    println!("  Start:          {}", activity.start_time.format("%Y-%m-%d %H:%M:%S"));
    println!("  Duration:       {}", activity.duration_formatted());
    println!("  Distance:       {}", format_distance(&activity));
    println!("  Avg HR:         {}", format_heart_rate(activity.avg_heart_rate));
    println!("  Max HR:         {}", format_heart_rate(activity.max_heart_rate));
    if activity.avg_power > 0.0 {
        println!("  Avg power:      {:.0} W", activity.avg_power);
    }
    println!("  Calories:       {}", activity.calories);
    println!(
        "  Elevation:      +{:.0} m / -{:.0} m",
        activity.elevation_gain, activity.elevation_loss
    );
    if activity.steps > 0 {
        println!("  Steps:          {}", activity.steps);
    }
    if let (Some(lat), Some(lon)) = (activity.start_latitude, activity.start_longitude) {
        println!("  Start position: {:.5}, {:.5}", lat, lon);
    }
    match &activity.file_path {
        Some(path) if activity.downloaded => println!(
            "  File:           {} ({}, {} bytes)",
            path,
            activity.file_type.as_deref().unwrap_or("?"),
            activity.file_size
        ),
        _ => println!("  File:           not downloaded"),
    }
    println!(
        "  Last synced:    {}",
        activity.last_sync_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

/// Parse a date string (YYYY-MM-DD)
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| GarminError::invalid_param(format!("Invalid date {:?}, expected YYYY-MM-DD", s)))
}

fn format_distance(activity: &ActivityRecord) -> String {
    if activity.distance > 0.0 {
        format!("{:.2} km", activity.distance_km())
    } else {
        "-".to_string()
    }
}

fn format_heart_rate(bpm: i32) -> String {
    if bpm > 0 {
        bpm.to_string()
    } else {
        "-".to_string()
    }
}

/// Truncate string to max length
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
