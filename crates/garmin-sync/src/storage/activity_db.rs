//! SQLite-backed activity store
//!
//! Tables:
//! - activities: one row per remote activity, keyed by `remote_id`
//! - sync_runs: completed reconciliation runs, for status reporting

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};

use super::ActivityStore;
use crate::db::models::{ActivityCounts, ActivityFilter, ActivityRecord, SyncRun};
use crate::error::{GarminError, Result};

const START_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const RECORD_COLUMNS: &str = "remote_id, start_time, activity_type, activity_name, duration, distance,
     max_heart_rate, avg_heart_rate, avg_power, calories, elevation_gain, elevation_loss, steps,
     start_latitude, start_longitude, file_path, file_type, file_size, downloaded,
     created_at, last_sync_at";

/// SQLite database holding activity records
pub struct ActivityDb {
    conn: Mutex<Connection>,
}

impl ActivityDb {
    /// Open or create the activity database
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| GarminError::Database(format!("Failed to open activity database: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GarminError::Database(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| GarminError::Database("Activity database lock poisoned".to_string()))
    }

    /// Run migrations
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS activities (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    remote_id INTEGER NOT NULL UNIQUE,
                    start_time TEXT NOT NULL,
                    activity_type TEXT NOT NULL DEFAULT 'unknown',
                    activity_name TEXT,
                    duration INTEGER NOT NULL DEFAULT 0,
                    distance REAL NOT NULL DEFAULT 0,
                    max_heart_rate INTEGER NOT NULL DEFAULT 0,
                    avg_heart_rate INTEGER NOT NULL DEFAULT 0,
                    avg_power REAL NOT NULL DEFAULT 0,
                    calories INTEGER NOT NULL DEFAULT 0,
                    elevation_gain REAL NOT NULL DEFAULT 0,
                    elevation_loss REAL NOT NULL DEFAULT 0,
                    steps INTEGER NOT NULL DEFAULT 0,
                    start_latitude REAL,
                    start_longitude REAL,
                    file_path TEXT,
                    file_type TEXT,
                    file_size INTEGER NOT NULL DEFAULT 0,
                    downloaded INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    last_sync_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_activities_start_time
                ON activities(start_time);

                CREATE INDEX IF NOT EXISTS idx_activities_type
                ON activities(activity_type);

                CREATE INDEX IF NOT EXISTS idx_activities_downloaded
                ON activities(downloaded);

                CREATE TABLE IF NOT EXISTS sync_runs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    finished_at TEXT NOT NULL,
                    total_activities INTEGER NOT NULL,
                    new_activities INTEGER NOT NULL,
                    downloaded_files INTEGER NOT NULL,
                    updated_activities INTEGER NOT NULL,
                    error_count INTEGER NOT NULL,
                    duration_ms INTEGER NOT NULL
                );
                "#,
            )
            .map_err(|e| GarminError::Database(format!("Failed to run migrations: {}", e)))?;

        Ok(())
    }
}

impl ActivityStore for ActivityDb {
    // =========================================================================
    // Lookups
    // =========================================================================

    fn exists(&self, remote_id: i64) -> Result<bool> {
        self.conn()?
            .query_row(
                "SELECT 1 FROM activities WHERE remote_id = ?",
                params![remote_id],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(|e| GarminError::Database(format!("Failed to check activity: {}", e)))
    }

    fn get(&self, remote_id: i64) -> Result<ActivityRecord> {
        let sql = format!("SELECT {} FROM activities WHERE remote_id = ?", RECORD_COLUMNS);
        self.conn()?
            .query_row(&sql, params![remote_id], row_to_record)
            .optional()
            .map_err(|e| GarminError::Database(format!("Failed to get activity: {}", e)))?
            .ok_or_else(|| GarminError::NotFound(format!("activity {}", remote_id)))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn create(&self, record: &ActivityRecord) -> Result<()> {
        let sql = format!(
            "INSERT INTO activities ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            RECORD_COLUMNS
        );
        let result = self.conn()?.execute(
            &sql,
            params![
                record.remote_id,
                record.start_time.format(START_TIME_FORMAT).to_string(),
                record.activity_type,
                record.activity_name,
                record.duration,
                record.distance,
                record.max_heart_rate,
                record.avg_heart_rate,
                record.avg_power,
                record.calories,
                record.elevation_gain,
                record.elevation_loss,
                record.steps,
                record.start_latitude,
                record.start_longitude,
                record.file_path,
                record.file_type,
                record.file_size,
                record.downloaded,
                record.created_at.to_rfc3339(),
                record.last_sync_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(GarminError::DuplicateActivity(record.remote_id))
            }
            Err(e) => Err(GarminError::Database(format!("Failed to create activity: {}", e))),
        }
    }

    fn update(&self, record: &ActivityRecord) -> Result<()> {
        let changed = self
            .conn()?
            .execute(
                "UPDATE activities SET
                     start_time = ?, activity_type = ?, activity_name = ?, duration = ?,
                     distance = ?, max_heart_rate = ?, avg_heart_rate = ?, avg_power = ?,
                     calories = ?, elevation_gain = ?, elevation_loss = ?, steps = ?,
                     start_latitude = ?, start_longitude = ?, file_path = ?, file_type = ?,
                     file_size = ?, downloaded = ?, last_sync_at = ?
                 WHERE remote_id = ?",
                params![
                    record.start_time.format(START_TIME_FORMAT).to_string(),
                    record.activity_type,
                    record.activity_name,
                    record.duration,
                    record.distance,
                    record.max_heart_rate,
                    record.avg_heart_rate,
                    record.avg_power,
                    record.calories,
                    record.elevation_gain,
                    record.elevation_loss,
                    record.steps,
                    record.start_latitude,
                    record.start_longitude,
                    record.file_path,
                    record.file_type,
                    record.file_size,
                    record.downloaded,
                    Utc::now().to_rfc3339(),
                    record.remote_id,
                ],
            )
            .map_err(|e| GarminError::Database(format!("Failed to update activity: {}", e)))?;

        if changed == 0 {
            return Err(GarminError::NotFound(format!("activity {}", record.remote_id)));
        }
        Ok(())
    }

    // =========================================================================
    // Listing
    // =========================================================================

    fn list_filtered(&self, filter: &ActivityFilter) -> Result<Vec<ActivityRecord>> {
        filter.validate()?;

        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(kind) = &filter.activity_type {
            clauses.push("activity_type = ?");
            values.push(Value::Text(kind.clone()));
        }
        if let Some(from) = filter.date_from {
            clauses.push("start_time >= ?");
            values.push(Value::Text(format!("{} 00:00:00", from.format("%Y-%m-%d"))));
        }
        if let Some(to) = filter.date_to.and_then(|d| d.succ_opt()) {
            clauses.push("start_time < ?");
            values.push(Value::Text(format!("{} 00:00:00", to.format("%Y-%m-%d"))));
        }
        if let Some(min) = filter.min_distance {
            clauses.push("distance >= ?");
            values.push(Value::Real(min));
        }
        if let Some(max) = filter.max_distance {
            clauses.push("distance <= ?");
            values.push(Value::Real(max));
        }
        if let Some(min) = filter.min_duration {
            clauses.push("duration >= ?");
            values.push(Value::Integer(min));
        }
        if let Some(max) = filter.max_duration {
            clauses.push("duration <= ?");
            values.push(Value::Integer(max));
        }
        if let Some(downloaded) = filter.downloaded {
            clauses.push("downloaded = ?");
            values.push(Value::Integer(downloaded as i64));
        }

        let mut sql = format!("SELECT {} FROM activities", RECORD_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        // Column and direction come from closed enums, never from user text
        sql.push_str(&format!(
            " ORDER BY {} {}, remote_id {}",
            filter.sort_by.column(),
            filter.order.sql(),
            filter.order.sql()
        ));
        sql.push_str(" LIMIT ? OFFSET ?");
        values.push(Value::Integer(filter.limit.map(i64::from).unwrap_or(-1)));
        values.push(Value::Integer(i64::from(filter.offset)));

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| GarminError::Database(format!("Failed to prepare listing: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), row_to_record)
            .map_err(|e| GarminError::Database(format!("Failed to list activities: {}", e)))?;

        let records = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| GarminError::Database(format!("Failed to read activity row: {}", e)))?;
        Ok(records)
    }

    fn aggregate_counts(&self) -> Result<ActivityCounts> {
        let (total, downloaded): (i64, i64) = self
            .conn()?
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(CASE WHEN downloaded THEN 1 ELSE 0 END), 0)
                 FROM activities",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| GarminError::Database(format!("Failed to count activities: {}", e)))?;

        let total = total.max(0) as u64;
        let downloaded = downloaded.max(0) as u64;
        Ok(ActivityCounts {
            total,
            downloaded,
            missing: total.saturating_sub(downloaded),
        })
    }

    // =========================================================================
    // Run history
    // =========================================================================

    fn record_run(&self, run: &SyncRun) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO sync_runs (finished_at, total_activities, new_activities,
                     downloaded_files, updated_activities, error_count, duration_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    run.finished_at.to_rfc3339(),
                    run.total_activities,
                    run.new_activities,
                    run.downloaded_files,
                    run.updated_activities,
                    run.error_count,
                    run.duration_ms as i64,
                ],
            )
            .map_err(|e| GarminError::Database(format!("Failed to record sync run: {}", e)))?;
        Ok(())
    }

    fn last_run(&self) -> Result<Option<SyncRun>> {
        self.conn()?
            .query_row(
                "SELECT finished_at, total_activities, new_activities, downloaded_files,
                        updated_activities, error_count, duration_ms
                 FROM sync_runs ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(SyncRun {
                        finished_at: parse_utc(0, &row.get::<_, String>(0)?)?,
                        total_activities: row.get(1)?,
                        new_activities: row.get(2)?,
                        downloaded_files: row.get(3)?,
                        updated_activities: row.get(4)?,
                        error_count: row.get(5)?,
                        duration_ms: row.get::<_, i64>(6)?.max(0) as u64,
                    })
                },
            )
            .optional()
            .map_err(|e| GarminError::Database(format!("Failed to get last sync run: {}", e)))
    }
}

fn parse_utc(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<ActivityRecord> {
    let start_time: String = row.get(1)?;
    let start_time = NaiveDateTime::parse_from_str(&start_time, START_TIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(ActivityRecord {
        remote_id: row.get(0)?,
        start_time,
        activity_type: row.get(2)?,
        activity_name: row.get(3)?,
        duration: row.get(4)?,
        distance: row.get(5)?,
        max_heart_rate: row.get(6)?,
        avg_heart_rate: row.get(7)?,
        avg_power: row.get(8)?,
        calories: row.get(9)?,
        elevation_gain: row.get(10)?,
        elevation_loss: row.get(11)?,
        steps: row.get(12)?,
        start_latitude: row.get(13)?,
        start_longitude: row.get(14)?,
        file_path: row.get(15)?,
        file_type: row.get(16)?,
        file_size: row.get(17)?,
        downloaded: row.get(18)?,
        created_at: parse_utc(19, &row.get::<_, String>(19)?)?,
        last_sync_at: parse_utc(20, &row.get::<_, String>(20)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{SortKey, SortOrder};
    use chrono::NaiveDate;

    fn record(remote_id: i64, day: u32, kind: &str, distance: f64) -> ActivityRecord {
        let start = NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut record = ActivityRecord::new(remote_id, start, kind);
        record.distance = distance;
        record
    }

    #[test]
    fn test_create_and_get() {
        let db = ActivityDb::open_in_memory().unwrap();
        let mut rec = record(555, 1, "running", 5000.0);
        rec.activity_name = Some("Morning Run".to_string());
        rec.start_latitude = Some(47.5);

        db.create(&rec).unwrap();
        assert!(db.exists(555).unwrap());
        assert!(!db.exists(556).unwrap());

        let loaded = db.get(555).unwrap();
        assert_eq!(loaded.remote_id, 555);
        assert_eq!(loaded.activity_type, "running");
        assert_eq!(loaded.activity_name.as_deref(), Some("Morning Run"));
        assert_eq!(loaded.start_time, rec.start_time);
        assert_eq!(loaded.start_latitude, Some(47.5));
        assert!(!loaded.downloaded);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let db = ActivityDb::open_in_memory().unwrap();
        assert!(db.get(42).unwrap_err().is_not_found());
    }

    #[test]
    fn test_create_duplicate_fails() {
        let db = ActivityDb::open_in_memory().unwrap();
        db.create(&record(555, 1, "running", 0.0)).unwrap();

        let err = db.create(&record(555, 2, "cycling", 0.0)).unwrap_err();
        assert!(matches!(err, GarminError::DuplicateActivity(555)));
        assert_eq!(db.aggregate_counts().unwrap().total, 1);
    }

    #[test]
    fn test_update_replaces_fields_and_bumps_sync_time() {
        let db = ActivityDb::open_in_memory().unwrap();
        let mut rec = record(555, 1, "running", 0.0);
        rec.last_sync_at = Utc::now() - chrono::Duration::hours(1);
        db.create(&rec).unwrap();

        rec.distance = 5000.0;
        rec.downloaded = true;
        rec.file_path = Some("/tmp/555.fit".to_string());
        rec.file_type = Some("fit".to_string());
        rec.file_size = 1234;
        db.update(&rec).unwrap();

        let loaded = db.get(555).unwrap();
        assert_eq!(loaded.distance, 5000.0);
        assert!(loaded.downloaded);
        assert_eq!(loaded.file_size, 1234);
        assert!(loaded.last_sync_at > rec.last_sync_at);
        assert_eq!(loaded.created_at.timestamp(), rec.created_at.timestamp());
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let db = ActivityDb::open_in_memory().unwrap();
        let err = db.update(&record(9, 1, "running", 0.0)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_aggregate_counts() {
        let db = ActivityDb::open_in_memory().unwrap();
        assert_eq!(db.aggregate_counts().unwrap(), ActivityCounts::default());

        db.create(&record(1, 1, "running", 0.0)).unwrap();
        let mut downloaded = record(2, 2, "running", 0.0);
        downloaded.downloaded = true;
        downloaded.file_path = Some("x".to_string());
        db.create(&downloaded).unwrap();
        db.create(&record(3, 3, "cycling", 0.0)).unwrap();

        let counts = db.aggregate_counts().unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.downloaded, 1);
        assert_eq!(counts.missing, 2);
    }

    #[test]
    fn test_list_filtered() {
        let db = ActivityDb::open_in_memory().unwrap();
        db.create(&record(1, 1, "running", 5000.0)).unwrap();
        db.create(&record(2, 2, "cycling", 30000.0)).unwrap();
        db.create(&record(3, 3, "running", 10000.0)).unwrap();
        db.create(&record(4, 4, "running", 21000.0)).unwrap();

        let runs = db
            .list_filtered(&ActivityFilter {
                activity_type: Some("running".to_string()),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = runs.iter().map(|r| r.remote_id).collect();
        assert_eq!(ids, vec![4, 3, 1]);

        let window = db
            .list_filtered(&ActivityFilter {
                date_from: NaiveDate::from_ymd_opt(2024, 3, 2),
                date_to: NaiveDate::from_ymd_opt(2024, 3, 3),
                order: SortOrder::Asc,
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = window.iter().map(|r| r.remote_id).collect();
        assert_eq!(ids, vec![2, 3]);

        let by_distance = db
            .list_filtered(&ActivityFilter {
                min_distance: Some(6000.0),
                sort_by: SortKey::Distance,
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = by_distance.iter().map(|r| r.remote_id).collect();
        assert_eq!(ids, vec![2, 4]);

        let paged = db
            .list_filtered(&ActivityFilter {
                order: SortOrder::Asc,
                limit: Some(2),
                offset: 2,
                ..Default::default()
            })
            .unwrap();
        let ids: Vec<i64> = paged.iter().map(|r| r.remote_id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_list_filtered_by_download_status() {
        let db = ActivityDb::open_in_memory().unwrap();
        db.create(&record(1, 1, "running", 0.0)).unwrap();
        let mut done = record(2, 2, "running", 0.0);
        done.downloaded = true;
        done.file_path = Some("x".to_string());
        db.create(&done).unwrap();

        let missing = db
            .list_filtered(&ActivityFilter {
                downloaded: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].remote_id, 1);
    }

    #[test]
    fn test_sync_run_history() {
        let db = ActivityDb::open_in_memory().unwrap();
        assert!(db.last_run().unwrap().is_none());

        let first = SyncRun {
            finished_at: Utc::now() - chrono::Duration::hours(1),
            total_activities: 5,
            new_activities: 5,
            downloaded_files: 4,
            updated_activities: 4,
            error_count: 1,
            duration_ms: 12_000,
        };
        let second = SyncRun {
            finished_at: Utc::now(),
            total_activities: 5,
            new_activities: 0,
            downloaded_files: 1,
            updated_activities: 1,
            error_count: 0,
            duration_ms: 3_000,
        };
        db.record_run(&first).unwrap();
        db.record_run(&second).unwrap();

        let last = db.last_run().unwrap().unwrap();
        assert_eq!(last.new_activities, 0);
        assert_eq!(last.duration_ms, 3_000);
    }

    #[test]
    fn test_open_on_disk_persists() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("garmin.db");
        {
            let db = ActivityDb::open(&path).unwrap();
            db.create(&record(7, 1, "walking", 0.0)).unwrap();
        }
        let db = ActivityDb::open(&path).unwrap();
        assert!(db.exists(7).unwrap());
    }
}
