//! End-to-end reconciliation against a mocked Connect API

use std::time::Duration;

use garmin_sync::client::{GarminClient, OAuth2Token};
use garmin_sync::db::models::{ActivityFilter, SortKey, SortOrder};
use garmin_sync::storage::{ActivityDb, ActivityStore, FileStore};
use garmin_sync::sync::{SyncEngine, SyncOptions};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST_PATH: &str = "/activitylist-service/activities/search/activities";

async fn mock_connect() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .and(query_param("start", "0"))
        .and(query_param("limit", "3"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(include_str!("fixtures/activities_page.json")),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download-service/files/activity/555"))
        .respond_with(ResponseTemplate::new(200).set_body_string(include_str!("fixtures/run.tcx")))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/download-service/files/activity/556"))
        .respond_with(ResponseTemplate::new(200).set_body_string(include_str!("fixtures/hike.gpx")))
        .expect(1)
        .mount(&server)
        .await;

    // 557 has no mock and gets wiremock's default 404
    server
}

fn engine(server: &MockServer, dir: &TempDir) -> SyncEngine<GarminClient, ActivityDb> {
    let token = OAuth2Token::bearer("test-access-token", 0);
    let client = GarminClient::new_with_base_url(&server.uri(), token, Duration::from_secs(5)).unwrap();
    let store = ActivityDb::open(dir.path().join("garmin.db")).unwrap();
    let options = SyncOptions {
        page_size: 3,
        request_delay: Duration::ZERO,
        ..Default::default()
    };

    SyncEngine::new(client, store, FileStore::new(dir.path()), options)
}

#[tokio::test]
async fn test_full_reconciliation() {
    let server = mock_connect().await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&server, &dir);

    let result = engine.run_sync().await.unwrap();

    assert_eq!(result.total_activities, 3);
    assert_eq!(result.new_activities, 3);
    assert_eq!(result.downloaded_files, 2);
    assert_eq!(result.updated_activities, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("activity 557: "), "{}", result.errors[0]);

    let store = engine.store();

    let run = store.get(555).unwrap();
    assert!(run.downloaded);
    assert_eq!(run.activity_type, "running");
    assert_eq!(run.activity_name.as_deref(), Some("Morning Run"));
    assert_eq!(run.start_time.to_string(), "2024-03-01 08:00:00");
    assert_eq!(run.distance, 5012.0);
    assert_eq!(run.duration, 1805);
    assert_eq!(run.avg_heart_rate, 146);
    assert_eq!(run.max_heart_rate, 174);
    assert_eq!(run.calories, 352);
    assert_eq!(run.elevation_gain, 12.0);
    assert_eq!(run.start_latitude, Some(47.3769));
    assert_eq!(run.file_type.as_deref(), Some("tcx"));
    assert!(dir.path().join("activities/2024-03/555_2024-03-01.tcx").exists());

    let hike = store.get(556).unwrap();
    assert!(hike.downloaded);
    assert_eq!(hike.activity_type, "hiking");
    assert!((hike.distance - 222_389.85).abs() < 1.0, "got {}", hike.distance);
    assert_eq!(hike.elevation_gain, 13.0);
    assert_eq!(hike.elevation_loss, 3.0);
    // The summary duration is kept; the file agrees
    assert_eq!(hike.duration, 1800);
    assert_eq!(hike.file_type.as_deref(), Some("gpx"));
    assert!(dir.path().join("activities/2024-03/556_2024-03-02.gpx").exists());

    let strength = store.get(557).unwrap();
    assert!(!strength.downloaded);
    assert_eq!(strength.activity_type, "unknown");
    assert_eq!(strength.duration, 2400);
    assert_eq!(strength.calories, 210);
    assert!(strength.file_path.is_none());

    let counts = store.aggregate_counts().unwrap();
    assert_eq!((counts.total, counts.downloaded, counts.missing), (3, 2, 1));
}

#[tokio::test]
async fn test_second_run_downloads_nothing_new() {
    let server = mock_connect().await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&server, &dir);

    engine.run_sync().await.unwrap();
    let second = engine.run_sync().await.unwrap();

    assert_eq!(second.total_activities, 3);
    assert_eq!(second.new_activities, 0);
    assert_eq!(second.downloaded_files, 0);
    assert_eq!(second.updated_activities, 0);
    // 557 is retried and still missing
    assert_eq!(second.errors.len(), 1);

    assert_eq!(engine.store().aggregate_counts().unwrap().total, 3);
    let last = engine.store().last_run().unwrap().unwrap();
    assert_eq!(last.new_activities, 0);
    assert_eq!(last.error_count, 1);

    // Download mocks verify on drop that each file was fetched exactly once
    drop(engine);
    server.verify().await;
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let server = mock_connect().await;
    let dir = TempDir::new().unwrap();
    engine(&server, &dir).run_sync().await.unwrap();

    let reopened = ActivityDb::open(dir.path().join("garmin.db")).unwrap();
    let filter = ActivityFilter {
        downloaded: Some(true),
        sort_by: SortKey::StartTime,
        order: SortOrder::Asc,
        ..Default::default()
    };
    let ids: Vec<i64> = reopened
        .list_filtered(&filter)
        .unwrap()
        .iter()
        .map(|a| a.remote_id)
        .collect();
    assert_eq!(ids, vec![555, 556]);
    assert!(reopened.last_run().unwrap().is_some());
}

#[tokio::test]
async fn test_listing_failure_fails_the_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LIST_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let engine = engine(&server, &dir);

    let err = engine.run_sync().await.unwrap_err();
    assert!(matches!(err, garmin_sync::GarminError::NotAuthenticated));
    assert_eq!(engine.store().aggregate_counts().unwrap().total, 0);
    assert!(!engine.status().running);
}
