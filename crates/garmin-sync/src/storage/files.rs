//! On-disk archive of downloaded activity files
//!
//! Files live under `activities/<YYYY-MM>/<remoteId>_<YYYY-MM-DD>.<ext>` so
//! the path is a pure function of the activity, and re-downloads overwrite
//! in place.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{GarminError, Result};
use crate::parser::FileFormat;

const ACTIVITIES_DIR: &str = "activities";

/// A file persisted by [`FileStore::save`]
#[derive(Debug, Clone, PartialEq)]
pub struct SavedFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Writes activity files beneath a base directory
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Deterministic location for an activity's file
    pub fn path_for(&self, remote_id: i64, start_time: NaiveDateTime, format: FileFormat) -> PathBuf {
        self.base_path
            .join(ACTIVITIES_DIR)
            .join(start_time.format("%Y-%m").to_string())
            .join(format!(
                "{}_{}.{}",
                remote_id,
                start_time.format("%Y-%m-%d"),
                format.extension()
            ))
    }

    /// Write `bytes` atomically (temp file + rename)
    pub fn save(
        &self,
        remote_id: i64,
        start_time: NaiveDateTime,
        format: FileFormat,
        bytes: &[u8],
    ) -> Result<SavedFile> {
        let path = self.path_for(remote_id, start_time, format);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GarminError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {}: {}", parent.display(), e),
                ))
            })?;
        }

        let temp_path = path.with_extension(format!("{}.tmp", format.extension()));
        fs::write(&temp_path, bytes)?;
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(SavedFile {
            path,
            size: bytes.len() as u64,
        })
    }
}
