//! Command implementations behind the `garmin-sync` binary

pub mod commands;

use crate::client::GarminClient;
use crate::config::AppConfig;
use crate::error::Result;
use crate::storage::{ActivityDb, FileStore};
use crate::sync::{SyncEngine, SyncOptions};

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// The production engine: Garmin Connect into SQLite
pub type GarminSyncEngine = SyncEngine<GarminClient, ActivityDb>;

/// Build an engine from configuration, loading the stored token
pub fn build_engine(config: &AppConfig, options: SyncOptions) -> Result<GarminSyncEngine> {
    let token = config.credentials()?.require_token()?;
    let client = GarminClient::new(&config.domain, token, config.request_timeout)?;
    let store = ActivityDb::open(&config.db_path)?;
    let files = FileStore::new(&config.data_dir);

    Ok(SyncEngine::new(client, store, files, options))
}

/// Print a serializable value as pretty JSON
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
