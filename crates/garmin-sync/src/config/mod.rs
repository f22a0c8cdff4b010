//! Runtime configuration from the environment (and an optional `.env` file)

mod credentials;

pub use credentials::CredentialStore;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{GarminError, Result};
use crate::parser::FileFormat;
use crate::storage::default_storage_path;
use crate::sync::SyncOptions;

pub const ENV_DATA_DIR: &str = "GARMIN_SYNC_DATA_DIR";
pub const ENV_DB_PATH: &str = "GARMIN_SYNC_DB_PATH";
pub const ENV_DOMAIN: &str = "GARMIN_DOMAIN";
pub const ENV_PROFILE: &str = "GARMIN_PROFILE";
pub const ENV_PAGE_SIZE: &str = "GARMIN_SYNC_PAGE_SIZE";
pub const ENV_FORMAT: &str = "GARMIN_SYNC_FORMAT";
pub const ENV_REQUEST_DELAY_MS: &str = "GARMIN_SYNC_REQUEST_DELAY_MS";
pub const ENV_TIMEOUT_SECS: &str = "GARMIN_SYNC_TIMEOUT_SECS";
pub const ENV_INTERVAL: &str = "GARMIN_SYNC_INTERVAL";

const DEFAULT_DOMAIN: &str = "garmin.com";
const DEFAULT_PAGE_SIZE: u32 = 100;
const DEFAULT_REQUEST_DELAY_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_INTERVAL: &str = "1h";

/// Application configuration, loaded once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Root for the database, activity files, and credentials
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    /// Garmin Connect domain (garmin.com or garmin.cn)
    pub domain: String,
    pub profile: Option<String>,
    /// Activities requested per sync run
    pub page_size: u32,
    /// Format requested when downloading activity files
    pub format: FileFormat,
    /// Minimum pause between remote calls
    pub request_delay: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Daemon trigger interval
    pub interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_storage_path();
        Self {
            db_path: data_dir.join("garmin.db"),
            data_dir,
            domain: DEFAULT_DOMAIN.to_string(),
            profile: None,
            page_size: DEFAULT_PAGE_SIZE,
            format: FileFormat::Fit,
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            interval: Duration::from_secs(60 * 60),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = get(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_storage_path);
        let db_path = get(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("garmin.db"));

        let page_size = parse_number(ENV_PAGE_SIZE, get(ENV_PAGE_SIZE), u64::from(DEFAULT_PAGE_SIZE))?;
        if page_size == 0 || page_size > 1000 {
            return Err(GarminError::config(format!(
                "{} must be between 1 and 1000",
                ENV_PAGE_SIZE
            )));
        }

        let format = match get(ENV_FORMAT) {
            Some(v) => FileFormat::from_str(&v)
                .map_err(|_| GarminError::config(format!("{} must be fit, tcx, or gpx", ENV_FORMAT)))?,
            None => FileFormat::Fit,
        };

        let timeout_secs = parse_number(ENV_TIMEOUT_SECS, get(ENV_TIMEOUT_SECS), DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(GarminError::config(format!("{} must be greater than 0", ENV_TIMEOUT_SECS)));
        }

        let interval = parse_interval(&get(ENV_INTERVAL).unwrap_or_else(|| DEFAULT_INTERVAL.to_string()))
            .map_err(|e| GarminError::config(format!("{}: {}", ENV_INTERVAL, e)))?;

        Ok(Self {
            data_dir,
            db_path,
            domain: get(ENV_DOMAIN).unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            profile: get(ENV_PROFILE),
            page_size: page_size as u32,
            format,
            request_delay: Duration::from_millis(parse_number(
                ENV_REQUEST_DELAY_MS,
                get(ENV_REQUEST_DELAY_MS),
                DEFAULT_REQUEST_DELAY_MS,
            )?),
            request_timeout: Duration::from_secs(timeout_secs),
            interval,
        })
    }

    /// Options for a sync run starting at the newest activity
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_offset: 0,
            page_size: self.page_size,
            format: self.format,
            request_delay: self.request_delay,
        }
    }

    /// Credential store for the configured profile
    pub fn credentials(&self) -> Result<CredentialStore> {
        CredentialStore::new(&self.data_dir, self.profile.clone())
    }
}

fn parse_number(key: &str, value: Option<String>, default: u64) -> Result<u64> {
    match value {
        Some(v) => v
            .parse()
            .map_err(|_| GarminError::config(format!("{} must be a non-negative integer, got {:?}", key, v))),
        None => Ok(default),
    }
}

/// Parse an interval such as "30s", "5m", or "1h"
pub fn parse_interval(input: &str) -> Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(GarminError::invalid_param("Interval is required"));
    }

    let (unit_at, unit) = input
        .char_indices()
        .last()
        .ok_or_else(|| GarminError::invalid_param("Interval is required"))?;
    let value: u64 = input[..unit_at].parse().map_err(|_| {
        GarminError::invalid_param("Interval must be a number followed by s, m, or h")
    })?;

    if value == 0 {
        return Err(GarminError::invalid_param("Interval must be greater than 0"));
    }

    let multiplier: u64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        _ => {
            return Err(GarminError::invalid_param(
                "Interval must end with s, m, or h",
            ))
        }
    };
    let seconds = value
        .checked_mul(multiplier)
        .ok_or_else(|| GarminError::invalid_param(format!("Interval {:?} is too large", input)))?;

    Ok(Duration::from_secs(seconds))
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
