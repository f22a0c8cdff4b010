//! In-process run state: whether a sync is active and when the last one ended

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{GarminError, Result};

/// Point-in-time view of [`SyncStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub last_completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct SyncStatus {
    running: AtomicBool,
    last_completed: Mutex<Option<DateTime<Utc>>>,
}

impl SyncStatus {
    /// Claim the run slot, failing with `AlreadyRunning` if it is taken
    pub fn try_begin(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GarminError::AlreadyRunning)?;
        Ok(RunGuard { status: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.is_running(),
            last_completed: *self.last_completed_slot(),
        }
    }

    fn last_completed_slot(&self) -> std::sync::MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_completed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Releases the run slot when dropped, on every exit path
#[derive(Debug)]
pub struct RunGuard<'a> {
    status: &'a SyncStatus,
}

impl RunGuard<'_> {
    /// Mark the run finished at `at` and release the slot
    pub fn complete(self, at: DateTime<Utc>) {
        *self.status.last_completed_slot() = Some(at);
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.status.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_rejected() {
        let status = SyncStatus::default();
        let guard = status.try_begin().unwrap();
        assert!(status.is_running());
        assert!(matches!(status.try_begin(), Err(GarminError::AlreadyRunning)));
        drop(guard);
        assert!(!status.is_running());
        assert!(status.try_begin().is_ok());
    }

    #[test]
    fn test_complete_records_time() {
        let status = SyncStatus::default();
        assert_eq!(status.snapshot().last_completed, None);

        let now = Utc::now();
        status.try_begin().unwrap().complete(now);

        let snapshot = status.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.last_completed, Some(now));
    }

    #[test]
    fn test_abandoned_run_keeps_previous_completion() {
        let status = SyncStatus::default();
        let first = Utc::now();
        status.try_begin().unwrap().complete(first);

        let guard = status.try_begin().unwrap();
        drop(guard);
        assert_eq!(status.snapshot().last_completed, Some(first));
    }
}
