use std::path::PathBuf;

use clap::{Parser, Subcommand};
use garmin_sync::cli::{commands, OutputFormat};
use garmin_sync::config::{AppConfig, ENV_DB_PATH};
use garmin_sync::db::models::{ActivityFilter, SortKey, SortOrder};
use garmin_sync::parser::FileFormat;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "garmin-sync")]
#[command(author, version, about = "Sync Garmin Connect activities into a local archive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Profile to use
    #[arg(short, long, global = true, env = "GARMIN_PROFILE")]
    profile: Option<String>,

    /// Data directory for the database, activity files, and credentials
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Database file path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync activities from Garmin Connect
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Run sync on a fixed interval until interrupted
    Daemon {
        /// Interval between runs (e.g. 30s, 5m, 1h)
        #[arg(short, long)]
        interval: Option<String>,
    },
    /// Query synced activities
    Activities {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    /// Extract metrics from a local FIT, TCX, or GPX file
    Parse {
        /// File path
        file: PathBuf,
        /// Format to assume when the content cannot be identified
        #[arg(short = 't', long = "type")]
        format: Option<FileFormat>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Run one sync pass
    Run {
        /// File format to download (fit, tcx, gpx)
        #[arg(short = 't', long = "type", visible_alias = "format")]
        format: Option<FileFormat>,
        /// Starting offset in the remote activity list
        #[arg(short, long)]
        start: Option<u32>,
        /// Number of activities to process
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show sync status
    Status,
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// List synced activities
    List {
        /// Activity type (e.g. running)
        #[arg(long = "type")]
        activity_type: Option<String>,
        /// Earliest start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Latest start date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
        /// Minimum distance in km
        #[arg(long)]
        min_km: Option<f64>,
        /// Maximum distance in km
        #[arg(long)]
        max_km: Option<f64>,
        /// Minimum duration in minutes
        #[arg(long)]
        min_minutes: Option<i64>,
        /// Maximum duration in minutes
        #[arg(long)]
        max_minutes: Option<i64>,
        /// Only activities whose file has been downloaded
        #[arg(long, conflicts_with = "missing")]
        downloaded: bool,
        /// Only activities whose file is still missing
        #[arg(long)]
        missing: bool,
        /// Sort column
        #[arg(long, value_enum, default_value = "start-time")]
        sort: SortKey,
        /// Sort direction
        #[arg(long, value_enum, default_value = "desc")]
        order: SortOrder,
        /// Number of activities to show
        #[arg(short, long, default_value = "20")]
        limit: u32,
        /// Starting offset
        #[arg(short, long, default_value = "0")]
        start: u32,
    },
    /// Show one synced activity
    Show {
        /// Activity ID
        id: i64,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "garmin_sync=debug" } else { "garmin_sync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> garmin_sync::Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        if std::env::var_os(ENV_DB_PATH).is_none() {
            config.db_path = dir.join("garmin.db");
        }
        config.data_dir = dir.clone();
    }
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if cli.profile.is_some() {
        config.profile = cli.profile.clone();
    }
    Ok(config)
}

async fn execute(cli: Cli, config: AppConfig) -> garmin_sync::Result<()> {
    let output = cli.output;
    match cli.command {
        Commands::Sync { command } => match command {
            SyncCommands::Run { format, start, limit } => {
                commands::sync_run(&config, output, format, start, limit).await
            }
            SyncCommands::Status => commands::sync_status(&config, output).await,
        },
        Commands::Daemon { interval } => commands::daemon(&config, interval).await,
        Commands::Activities { command } => match command {
            ActivityCommands::List {
                activity_type,
                from,
                to,
                min_km,
                max_km,
                min_minutes,
                max_minutes,
                downloaded,
                missing,
                sort,
                order,
                limit,
                start,
            } => {
                let filter = ActivityFilter {
                    activity_type,
                    date_from: from.as_deref().map(commands::parse_date).transpose()?,
                    date_to: to.as_deref().map(commands::parse_date).transpose()?,
                    min_distance: min_km.map(|km| km * 1000.0),
                    max_distance: max_km.map(|km| km * 1000.0),
                    min_duration: min_minutes.map(|m| m * 60),
                    max_duration: max_minutes.map(|m| m * 60),
                    downloaded: match (downloaded, missing) {
                        (true, _) => Some(true),
                        (_, true) => Some(false),
                        _ => None,
                    },
                    sort_by: sort,
                    order,
                    limit: Some(limit),
                    offset: start,
                };
                commands::list_activities(&config, output, filter).await
            }
            ActivityCommands::Show { id } => commands::show_activity(&config, output, id).await,
        },
        Commands::Parse { file, format } => commands::parse_file(&file, format, output).await,
    }
}

#[tokio::main]
async fn main() -> garmin_sync::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let result = match load_config(&cli) {
        Ok(config) => execute(cli, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", garmin_sync::error::format_user_error(&e));
        std::process::exit(1);
    }

    Ok(())
}
