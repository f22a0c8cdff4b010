//! Sync commands for garmin-sync

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{build_engine, print_json, OutputFormat};
use crate::config::AppConfig;
use crate::db::models::{ActivityCounts, SyncRun};
use crate::error::Result;
use crate::parser::FileFormat;
use crate::storage::{ActivityDb, ActivityStore};
use crate::sync::SyncResult;

/// Run one sync pass; Ctrl-C stops it between activities
pub async fn run(
    config: &AppConfig,
    output: OutputFormat,
    format: Option<FileFormat>,
    start: Option<u32>,
    limit: Option<u32>,
) -> Result<()> {
    let mut options = config.sync_options();
    if let Some(format) = format {
        options.format = format;
    }
    if let Some(start) = start {
        options.page_offset = start;
    }
    if let Some(limit) = limit {
        options.page_size = limit;
    }

    let engine = build_engine(config, options)?;

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing the current activity");
                cancel.cancel();
            }
        })
    };

    if output == OutputFormat::Table {
        println!("Using database: {}", config.db_path.display());
    }
    let result = engine.run(&cancel).await;
    ctrl_c.abort();

    print_result(&result?, output)
}

fn print_result(result: &SyncResult, output: OutputFormat) -> Result<()> {
    if output == OutputFormat::Json {
        return print_json(result);
    }

    println!(
        "\nSync {}: {}",
        if result.cancelled { "cancelled" } else { "complete" },
        result
    );
    println!("Took {:.1}s", result.duration.as_secs_f64());
    if result.has_errors() {
        println!("\nErrors:");
        for error in &result.errors {
            println!("  {}", error);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport {
    database: String,
    counts: ActivityCounts,
    last_run: Option<SyncRun>,
}

/// Show stored counts and the last completed run
pub async fn status(config: &AppConfig, output: OutputFormat) -> Result<()> {
    if !config.db_path.exists() {
        println!("No database found at: {}", config.db_path.display());
        println!("Run 'garmin-sync sync run' to create one.");
        return Ok(());
    }

    let db = ActivityDb::open(&config.db_path)?;
    let report = StatusReport {
        database: config.db_path.display().to_string(),
        counts: db.aggregate_counts()?,
        last_run: db.last_run()?,
    };

    if output == OutputFormat::Json {
        return print_json(&report);
    }

    println!("Database: {}", report.database);
    println!();
    println!("Activities:");
    println!("  Total:       {:>8}", report.counts.total);
    println!("  Downloaded:  {:>8}", report.counts.downloaded);
    println!("  Missing:     {:>8}", report.counts.missing);
    println!();
    match &report.last_run {
        Some(run) => {
            println!(
                "Last sync: {}",
                run.finished_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "  {} listed, {} new, {} downloaded, {} updated, {} errors ({:.1}s)",
                run.total_activities,
                run.new_activities,
                run.downloaded_files,
                run.updated_activities,
                run.error_count,
                run.duration_ms as f64 / 1000.0
            );
        }
        None => println!("Last sync: never"),
    }

    Ok(())
}
