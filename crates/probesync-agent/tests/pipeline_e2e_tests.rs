//! End-to-end tests for the extraction-and-delivery pipeline
//!
//! These tests drive full pipeline runs against real capture files in
//! a temporary directory and a mock collector, validating:
//! - watermark progression across runs
//! - incremental extraction (only rows above the watermark)
//! - retirement of drained files and protection of active ones
//! - delivery-failure semantics (no watermark advance, no deletion,
//!   re-delivery on the next run)

use probesync_agent::catalog::FileCatalog;
use probesync_agent::watermark::WatermarkStore;
use probesync_agent::{Config, Pipeline};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

/// Write a capture database with the given client-device rows.
async fn create_capture_db(path: &Path, rows: &[(&str, i64, i64)]) {
    let typed: Vec<(&str, &str, i64, i64)> = rows
        .iter()
        .map(|&(mac, first, last)| (mac, "Wi-Fi Client", first, last))
        .collect();
    create_capture_db_typed(path, &typed).await;
}

/// Write a capture database with explicit device types per row.
async fn create_capture_db_typed(path: &Path, rows: &[(&str, &str, i64, i64)]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();

    sqlx::query(
        "CREATE TABLE devices (devmac TEXT, type TEXT, first_time INTEGER, \
         last_time INTEGER, device BLOB)",
    )
    .execute(&pool)
    .await
    .unwrap();

    for (mac, device_type, first, last) in rows {
        let device = client_device(mac, *first, *last);
        sqlx::query(
            "INSERT INTO devices (devmac, type, first_time, last_time, device) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(mac)
        .bind(device_type)
        .bind(first)
        .bind(last)
        .bind(serde_json::to_vec(&device).unwrap())
        .execute(&pool)
        .await
        .unwrap();
    }

    pool.close().await;
}

fn client_device(mac: &str, first: i64, last: i64) -> Value {
    json!({
        "kismet.device.base.macaddr": mac,
        "kismet.device.base.first_time": first,
        "kismet.device.base.last_time": last,
        "dot11.device": {
            "dot11.device.probed_ssid_map": [
                {
                    "dot11.probedssid.ssid": "testnet",
                    "dot11.probedssid.first_time": first,
                    "dot11.probedssid.last_time": last,
                }
            ]
        },
    })
}

fn test_config(dir: &TempDir, collector_url: String) -> Config {
    let mut config = Config::new(dir.path());
    config.collector_url = collector_url;
    config.sensor_id = Some("test-sensor".to_string());
    config.inter_file_delay_secs = 0;
    config
}

async fn mock_collector(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

// ============================================================================
// Two-file scenario
// ============================================================================

#[tokio::test]
async fn test_two_file_scenario_watermark_and_retirement() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let config = test_config(&dir, server.uri());
    let store = WatermarkStore::new(config.watermark_path());

    // Run 1: only file A exists (all rows at or below 100)
    let file_a = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db(
        &file_a,
        &[("aa:00", 10, 50), ("aa:01", 20, 80), ("aa:02", 30, 100)],
    )
    .await;

    let report = Pipeline::new(config.clone()).unwrap().run().await.unwrap();
    assert_eq!(report.files_processed, 1);
    assert_eq!(report.records_delivered, 3);
    assert_eq!(report.watermark, 100);
    assert_eq!(store.load().unwrap(), 100);
    // A is the newest file, hence active, hence kept
    assert!(file_a.exists());
    assert_eq!(report.files_retired, 0);

    // Run 2: the sensor rotated; file B exists with rows in [90, 200]
    let file_b = dir.path().join("rpi-kismet-2026-01-02.kismet");
    create_capture_db(
        &file_b,
        &[("bb:00", 85, 90), ("bb:01", 95, 150), ("bb:02", 100, 200)],
    )
    .await;

    let report = Pipeline::new(config).unwrap().run().await.unwrap();
    // A has nothing above 100; only B's two qualifying rows ship
    assert_eq!(report.records_delivered, 2);
    assert_eq!(report.watermark, 200);
    assert_eq!(store.load().unwrap(), 200);

    // A is drained and no longer active; B is active
    assert!(!file_a.exists());
    assert!(file_b.exists());
    assert_eq!(report.files_retired, 1);
}

#[tokio::test]
async fn test_file_larger_than_batch_limit_fully_drained() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let mut config = test_config(&dir, server.uri());
    config.batch_limit = 2;

    let file_a = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db(
        &file_a,
        &[("aa:00", 5, 10), ("aa:01", 5, 20), ("aa:02", 5, 150)],
    )
    .await;
    let file_b = dir.path().join("rpi-kismet-2026-01-02.kismet");
    create_capture_db(&file_b, &[("bb:00", 160, 200)]).await;

    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    // All four qualifying rows ship despite the two-row fetch bound,
    // and A is retired only once fully drained
    assert_eq!(report.records_delivered, 4);
    assert_eq!(report.watermark, 200);
    assert!(!file_a.exists());
    assert!(file_b.exists());
    assert_eq!(report.files_retired, 1);
}

// ============================================================================
// Delivery failure
// ============================================================================

#[tokio::test]
async fn test_delivery_failure_preserves_watermark_and_files() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(500).await;
    let config = test_config(&dir, server.uri());
    let store = WatermarkStore::new(config.watermark_path());

    let file = dir.path().join("rpi-kismet-2026-01-01.kismet");
    let rows: Vec<(String, i64, i64)> = (0..10)
        .map(|i| (format!("aa:{i:02}"), 10 + i, 100 + i))
        .collect();
    let row_refs: Vec<(&str, i64, i64)> =
        rows.iter().map(|(m, f, l)| (m.as_str(), *f, *l)).collect();
    create_capture_db(&file, &row_refs).await;

    let result = Pipeline::new(config).unwrap().run().await;

    assert!(result.is_err());
    assert_eq!(store.load().unwrap(), 0);
    assert!(file.exists());
}

#[tokio::test]
async fn test_failed_batch_redelivered_next_run() {
    let dir = TempDir::new().unwrap();
    let config_for = |url: String| test_config(&dir, url);

    let file = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db(&file, &[("aa:00", 10, 50), ("aa:01", 20, 90)]).await;

    // Run 1: collector down, run fails, watermark stays at 0
    let failing = mock_collector(500).await;
    let result = Pipeline::new(config_for(failing.uri())).unwrap().run().await;
    assert!(result.is_err());

    // Run 2: collector recovered; the same records ship (at-least-once)
    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&healthy)
        .await;

    let report = Pipeline::new(config_for(healthy.uri()))
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.records_delivered, 2);
    assert_eq!(report.watermark, 90);
}

// ============================================================================
// Retirement safety
// ============================================================================

#[tokio::test]
async fn test_active_file_survives_any_watermark() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let config = test_config(&dir, server.uri());

    // Watermark already far past the file's contents
    WatermarkStore::new(config.watermark_path())
        .save(1_000_000)
        .unwrap();

    let file = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db(&file, &[("aa:00", 10, 50)]).await;

    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    // Fully drained, but it is the newest file, so it stays
    assert_eq!(report.records_delivered, 0);
    assert_eq!(report.files_retired, 0);
    assert!(file.exists());
}

#[tokio::test]
async fn test_journaled_file_survives_retirement() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let config = test_config(&dir, server.uri());

    let file_a = dir.path().join("rpi-kismet-2026-01-01.kismet");
    let file_b = dir.path().join("rpi-kismet-2026-01-02.kismet");
    create_capture_db(&file_a, &[("aa:00", 10, 50)]).await;
    create_capture_db(&file_b, &[("bb:00", 60, 120)]).await;
    // A still has a write-in-progress journal alongside it
    std::fs::write(dir.path().join("rpi-kismet-2026-01-01.kismet-journal"), b"").unwrap();

    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    assert_eq!(report.watermark, 120);
    assert!(file_a.exists());
    assert!(file_b.exists());
    assert_eq!(report.files_retired, 0);
}

// ============================================================================
// Quiet runs
// ============================================================================

#[tokio::test]
async fn test_no_qualifying_rows_means_no_upload() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(&dir, server.uri());
    WatermarkStore::new(config.watermark_path()).save(500).unwrap();

    let file = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db(&file, &[("aa:00", 10, 50), ("aa:01", 20, 400)]).await;

    let report = Pipeline::new(config).unwrap().run().await.unwrap();
    assert_eq!(report.records_delivered, 0);
    assert_eq!(report.watermark, 500);
}

#[tokio::test]
async fn test_filtered_only_file_still_drains() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let config = test_config(&dir, server.uri());

    // File A holds only access-point rows, which never become records
    let file_a = dir.path().join("rpi-kismet-2026-01-01.kismet");
    create_capture_db_typed(&file_a, &[("aa:00", "Wi-Fi AP", 10, 50)]).await;
    let file_b = dir.path().join("rpi-kismet-2026-01-02.kismet");
    create_capture_db(&file_b, &[("bb:00", 60, 120)]).await;

    let report = Pipeline::new(config).unwrap().run().await.unwrap();

    // Nothing to deliver from A, but the watermark passes it and it
    // is retired instead of being re-scanned forever
    assert_eq!(report.records_delivered, 1);
    assert_eq!(report.watermark, 120);
    assert!(!file_a.exists());
    assert!(file_b.exists());
    assert_eq!(report.files_retired, 1);
}

#[tokio::test]
async fn test_unreadable_file_skipped() {
    let dir = TempDir::new().unwrap();
    let server = mock_collector(200).await;
    let config = test_config(&dir, server.uri());

    // Not a SQLite database at all
    std::fs::write(dir.path().join("rpi-kismet-2026-01-01.kismet"), b"garbage").unwrap();
    let file_b = dir.path().join("rpi-kismet-2026-01-02.kismet");
    create_capture_db(&file_b, &[("bb:00", 10, 70)]).await;

    let report = Pipeline::new(config.clone()).unwrap().run().await.unwrap();

    assert_eq!(report.records_delivered, 1);
    assert_eq!(report.watermark, 70);
    // The broken file is skipped, not deleted and not fatal
    let files = FileCatalog::from_config(&config).scan().unwrap();
    assert_eq!(files.len(), 2);
}
