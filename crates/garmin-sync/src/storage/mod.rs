//! Storage layer for synced activities
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/garmin-sync/
//! ├── garmin.db                          # SQLite: activities + sync_runs
//! └── activities/
//!     ├── 2024-03/
//!     │   ├── 555_2024-03-01.fit
//!     │   └── 556_2024-03-02.gpx
//!     └── ...
//! ```
//!
//! Activity files are written atomically (temp file + rename), so a reader
//! never sees a half-written file.

mod activity_db;
mod files;

pub use activity_db::ActivityDb;
pub use files::{FileStore, SavedFile};

use std::path::PathBuf;
use std::sync::Arc;

use crate::db::models::{ActivityCounts, ActivityFilter, ActivityRecord, SyncRun};
use crate::error::Result;

/// Get the default storage path
pub fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("garmin-sync")
}

/// Get the default activity database path
pub fn default_db_path() -> PathBuf {
    default_storage_path().join("garmin.db")
}

/// Persistent activity records.
///
/// Calls are synchronous and each write is atomic. Implementations must be
/// shareable across tasks so status queries can run alongside a sync.
pub trait ActivityStore: Send + Sync {
    fn exists(&self, remote_id: i64) -> Result<bool>;

    /// Fails with `NotFound` when no record exists
    fn get(&self, remote_id: i64) -> Result<ActivityRecord>;

    /// Fails with `DuplicateActivity` when the remote id is already stored
    fn create(&self, record: &ActivityRecord) -> Result<()>;

    /// Replace all mutable fields and set `last_sync_at` to now
    fn update(&self, record: &ActivityRecord) -> Result<()>;

    fn list_filtered(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>>;

    fn aggregate_counts(&self) -> Result<ActivityCounts>;

    fn record_run(&self, run: &SyncRun) -> Result<()>;

    fn last_run(&self) -> Result<Option<SyncRun>>;
}

impl<T: ActivityStore + ?Sized> ActivityStore for Arc<T> {
    fn exists(&self, remote_id: i64) -> Result<bool> {
        (**self).exists(remote_id)
    }

    fn get(&self, remote_id: i64) -> Result<ActivityRecord> {
        (**self).get(remote_id)
    }

    fn create(&self, record: &ActivityRecord) -> Result<()> {
        (**self).create(record)
    }

    fn update(&self, record: &ActivityRecord) -> Result<()> {
        (**self).update(record)
    }

    fn list_filtered(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>> {
        (**self).list_filtered(filter)
    }

    fn aggregate_counts(&self) -> Result<ActivityCounts> {
        (**self).aggregate_counts()
    }

    fn record_run(&self, run: &SyncRun) -> Result<()> {
        (**self).record_run(run)
    }

    fn last_run(&self) -> Result<Option<SyncRun>> {
        (**self).last_run()
    }
}
