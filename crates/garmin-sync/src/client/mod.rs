pub mod api;
pub mod tokens;

pub use api::GarminClient;
pub use tokens::OAuth2Token;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::models::ActivitySummary;
use crate::parser::FileFormat;

/// A remote service that lists activities and serves their files.
///
/// Both calls are read-only and safe to repeat.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Fetch one page of activity summaries, newest first on Garmin
    async fn list_activities(&self, offset: u32, limit: u32) -> Result<Vec<ActivitySummary>>;

    /// Fetch the raw file for one activity
    async fn download_activity(&self, remote_id: i64, format: FileFormat) -> Result<Bytes>;
}
