//! Sync module for Garmin activity reconciliation
//!
//! Provides:
//! - One sequential, rate-limited pass over a page of remote activities
//! - Create / download / parse / merge per activity, with per-activity error isolation
//! - A single-run guard and in-memory status for triggers and status queries
//! - Cooperative cancellation between activities
//!
//! Per activity the engine moves a record through
//! `Unseen -> Created -> Downloaded -> Enriched`; a record that is already
//! downloaded is skipped, and any failure leaves it in its last persisted
//! state for the next run to pick up.

pub mod merge;
pub mod rate_limiter;
pub mod result;
pub mod status;

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use tokio::sync::Mutex as TokioMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::ActivitySource;
use crate::db::models::ActivityRecord;
use crate::models::ActivitySummary;
use crate::parser::{self, FileFormat};
use crate::storage::{ActivityStore, FileStore};
use crate::{GarminError, Result};

pub use rate_limiter::RateLimiter;
pub use result::SyncResult;
pub use status::{StatusSnapshot, SyncStatus};

/// Options for a sync run
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Offset into the remote activity list
    pub page_offset: u32,
    /// Number of activities requested per run
    pub page_size: u32,
    /// Format requested when downloading files
    pub format: FileFormat,
    /// Minimum pause between remote calls
    pub request_delay: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_offset: 0,
            page_size: 100,
            format: FileFormat::Fit,
            request_delay: rate_limiter::DEFAULT_MIN_DELAY,
        }
    }
}

/// Sync engine reconciling a remote activity source into a local store
pub struct SyncEngine<S, D> {
    source: S,
    store: D,
    files: FileStore,
    options: SyncOptions,
    rate_limiter: TokioMutex<RateLimiter>,
    status: SyncStatus,
}

impl<S, D> SyncEngine<S, D>
where
    S: ActivitySource,
    D: ActivityStore,
{
    pub fn new(source: S, store: D, files: FileStore, options: SyncOptions) -> Self {
        let rate_limiter = TokioMutex::new(RateLimiter::new(options.request_delay));
        Self {
            source,
            store,
            files,
            options,
            rate_limiter,
            status: SyncStatus::default(),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    /// Whether a run is active and when the last one in this process finished
    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Run once to completion
    pub async fn run_sync(&self) -> Result<SyncResult> {
        self.run(&CancellationToken::new()).await
    }

    /// Run once, stopping between activities if `cancel` fires.
    ///
    /// Fails only when another run is active or the remote listing fails;
    /// everything else is reported in [`SyncResult::errors`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SyncResult> {
        let guard = self.status.try_begin()?;
        let started = Instant::now();

        info!(
            offset = self.options.page_offset,
            limit = self.options.page_size,
            format = %self.options.format,
            "Starting sync run"
        );

        let summaries = self
            .remote(|| {
                self.source
                    .list_activities(self.options.page_offset, self.options.page_size)
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to list activities");
                e
            })?;

        let mut result = SyncResult {
            total_activities: summaries.len() as u32,
            ..Default::default()
        };

        for summary in &summaries {
            if cancel.is_cancelled() {
                warn!("Sync cancelled, stopping before activity {}", summary.activity_id);
                result.cancelled = true;
                break;
            }

            if let Err(e) = self.reconcile(summary, &mut result).await {
                warn!(activity_id = summary.activity_id, error = %e, "Activity sync failed");
                result.record_error(summary.activity_id, &e);
            }
        }

        result.duration = started.elapsed();
        let finished_at = Utc::now();
        if let Err(e) = self.store.record_run(&result.to_run(finished_at)) {
            warn!(error = %e, "Failed to record sync run");
        }
        guard.complete(finished_at);

        info!(
            total = result.total_activities,
            new = result.new_activities,
            downloaded = result.downloaded_files,
            updated = result.updated_activities,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis() as u64,
            "Sync run finished"
        );
        Ok(result)
    }

    /// Drive one activity as far through its states as it will go
    async fn reconcile(&self, summary: &ActivitySummary, result: &mut SyncResult) -> Result<()> {
        let activity_id = summary.activity_id;
        let start_time_is_fallback = summary.start_time().is_none();

        let mut record = match self.store.get(activity_id) {
            Ok(record) if record.downloaded => {
                debug!(activity_id, "Already downloaded, skipping");
                return Ok(());
            }
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                let record = record_from_summary(summary);
                self.store.create(&record)?;
                result.new_activities += 1;
                debug!(activity_id, activity_type = %record.activity_type, "Created activity record");
                record
            }
            Err(e) => return Err(e),
        };

        let format = self.options.format;
        let bytes = self
            .remote(|| self.source.download_activity(activity_id, format))
            .await?;

        let detected = parser::detect_format(&bytes).unwrap_or(format);

        // Merge first so a start time taken from the file also names the file
        let mut parse_error = None;
        let changed = match parser::extract_metrics(&bytes, Some(format)) {
            Ok((_, metrics)) => merge::apply_metrics(&mut record, &metrics, start_time_is_fallback),
            Err(e) => {
                warn!(activity_id, error = %e, "Failed to parse activity file");
                parse_error = Some(e);
                false
            }
        };

        let saved = self.files.save(activity_id, record.start_time, detected, &bytes)?;
        debug!(activity_id, path = %saved.path.display(), size = saved.size, "Saved activity file");

        record.file_path = Some(saved.path.to_string_lossy().into_owned());
        record.file_type = Some(detected.as_str().to_string());
        record.file_size = saved.size as i64;
        record.downloaded = true;
        self.store.update(&record)?;

        result.downloaded_files += 1;
        if changed {
            result.updated_activities += 1;
        }
        if let Some(e) = parse_error {
            result.record_error(activity_id, &e);
        }

        info!(activity_id, format = %detected, updated = changed, "Activity synced");
        Ok(())
    }

    /// Pace a remote call and feed its outcome to the rate limiter
    async fn remote<T, F, Fut>(&self, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.rate_limiter.lock().await.wait().await;
        let outcome = call().await;

        let mut limiter = self.rate_limiter.lock().await;
        match &outcome {
            Ok(_) => limiter.on_success(),
            Err(GarminError::RateLimited) => {
                limiter.on_rate_limit();
                if limiter.should_pause() {
                    warn!(
                        backoff_ms = limiter.current_backoff().as_millis() as u64,
                        "Repeatedly rate limited"
                    );
                } else {
                    debug!(backoff_ms = limiter.current_backoff().as_millis() as u64, "Rate limited");
                }
            }
            Err(_) => {}
        }
        outcome
    }
}

/// A fresh record for an activity seen for the first time.
///
/// An unparseable start time falls back to now rather than failing.
fn record_from_summary(summary: &ActivitySummary) -> ActivityRecord {
    let start_time = summary.start_time().unwrap_or_else(|| {
        warn!(
            activity_id = summary.activity_id,
            start_time_local = ?summary.start_time_local,
            "Unparseable start time, using current time"
        );
        Local::now().naive_local()
    });

    let mut record = ActivityRecord::new(summary.activity_id, start_time, summary.type_key());
    record.activity_name = summary.activity_name.clone();
    merge::apply_metrics(&mut record, &merge::metrics_from_summary(summary), false);
    record
}
