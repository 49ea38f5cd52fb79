//! Extraction engine
//!
//! Reads qualifying device rows from one capture file (a SQLite
//! database written by the sensor process), decodes the embedded
//! observation blob through the normalizer, and assembles the
//! deduplicated probe records for delivery.
//!
//! Row-level failures are logged and skipped; they never abort the
//! rest of the file.

use crate::catalog::CaptureFile;
use crate::dedup::{dedup_record, strip_zero_attrs};
use crate::error::Result;
use crate::normalize;
use probesync_common::types::{ProbeRecord, BSSID_KEY, CLIENT_MAP, PROBED_SSID_MAP, SSID_KEY};
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};

// ============================================================================
// Capture schema constants
// ============================================================================

/// Query for rows above the watermark, oldest first, bounded.
const SELECT_DEVICES: &str = "SELECT devmac, type, first_time, last_time, device \
     FROM devices WHERE last_time > ?1 ORDER BY last_time ASC LIMIT ?2";

/// Query for the file's overall newest observation.
const SELECT_MAX_LAST_SEEN: &str = "SELECT MAX(last_time) AS max_last FROM devices";

/// Placeholder SSID for devices that report probe activity the
/// capture could not attach a readable SSID to.
const HIDDEN_SSID: &str = "HIDDEN_OR_UNKNOWN";

/// Raw entity read from a capture file
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub mac: String,
    pub device_type: String,
    pub first_seen: i64,
    pub last_seen: i64,
    pub device: Vec<u8>,
}

/// Result of extracting one capture file
#[derive(Debug, Default)]
pub struct Extraction {
    /// Normalized, deduplicated records ready for batching
    pub records: Vec<ProbeRecord>,

    /// Highest `last_seen` across all fetched rows; candidate watermark
    pub max_last_seen: i64,

    /// Number of rows fetched (before filtering)
    pub rows_read: usize,
}

/// Reads capture files and produces record batches
#[derive(Debug, Clone)]
pub struct Extractor {
    batch_limit: u32,
}

impl Extractor {
    /// Create an extractor with a per-file row bound
    pub fn new(batch_limit: u32) -> Self {
        Self { batch_limit }
    }

    /// Extract all qualifying rows above the watermark from one file.
    pub async fn extract(&self, file: &CaptureFile, watermark: i64) -> Result<Extraction> {
        let pool = open_read_only(file).await?;

        let rows = sqlx::query(SELECT_DEVICES)
            .bind(watermark)
            .bind(i64::from(self.batch_limit))
            .fetch_all(&pool)
            .await?;
        pool.close().await;

        let mut extraction = Extraction {
            rows_read: rows.len(),
            max_last_seen: watermark,
            ..Default::default()
        };

        for row in rows {
            let device_row = match decode_row(&row) {
                Ok(device_row) => device_row,
                Err(e) => {
                    warn!(file = %file.name, error = %e, "skipping undecodable row");
                    continue;
                },
            };

            extraction.max_last_seen = extraction.max_last_seen.max(device_row.last_seen);

            // Access points carry no probe-request data of interest
            if is_access_point(&device_row.device_type) {
                continue;
            }

            match build_record(&device_row) {
                Some(record) => extraction.records.push(record),
                None => {
                    debug!(file = %file.name, mac = %device_row.mac, "row has no structured data");
                },
            }
        }

        debug!(
            file = %file.name,
            rows = extraction.rows_read,
            records = extraction.records.len(),
            max_last_seen = extraction.max_last_seen,
            "extraction finished"
        );

        Ok(extraction)
    }

    /// Newest observation anywhere in the file, regardless of watermark.
    /// Used by retirement to decide whether a file is fully drained.
    pub async fn file_max_last_seen(&self, file: &CaptureFile) -> Result<i64> {
        let pool = open_read_only(file).await?;
        let row = sqlx::query(SELECT_MAX_LAST_SEEN).fetch_one(&pool).await?;
        pool.close().await;

        let max: Option<i64> = row.try_get("max_last")?;
        Ok(max.unwrap_or(0))
    }
}

async fn open_read_only(file: &CaptureFile) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(&file.path)
        .read_only(true);
    Ok(SqlitePool::connect_with(options).await?)
}

fn decode_row(row: &sqlx::sqlite::SqliteRow) -> std::result::Result<DeviceRow, sqlx::Error> {
    Ok(DeviceRow {
        mac: row.try_get("devmac")?,
        device_type: row.try_get("type")?,
        first_seen: row.try_get("first_time")?,
        last_seen: row.try_get("last_time")?,
        device: row.try_get("device")?,
    })
}

/// Whether the device type marks a non-client (access point) device
fn is_access_point(device_type: &str) -> bool {
    device_type.contains("AP")
}

/// Assemble a normalized, deduplicated probe record from a raw row.
///
/// Returns `None` when the embedded blob yields no structured data.
fn build_record(row: &DeviceRow) -> Option<ProbeRecord> {
    let raw = parse_blob(&row.device)?;
    let device = normalize::normalize(raw)?;

    let mac = device
        .get("kismet.device.base.macaddr")
        .and_then(Value::as_str)
        .unwrap_or(&row.mac);
    let first = device
        .get("kismet.device.base.first_time")
        .and_then(Value::as_i64)
        .unwrap_or(row.first_seen);
    let last = device
        .get("kismet.device.base.last_time")
        .and_then(Value::as_i64)
        .unwrap_or(row.last_seen);

    let mut record = ProbeRecord::new(mac, first, last);

    if let Some(dot11) = device.get("dot11.device") {
        let ssid_entries = probed_ssid_entries(dot11, first, last);
        if !ssid_entries.is_empty() {
            record
                .attrs
                .insert(PROBED_SSID_MAP.to_string(), Value::Array(ssid_entries));
        }

        let client_entries = client_entries(dot11, first, last);
        if !client_entries.is_empty() {
            record
                .attrs
                .insert(CLIENT_MAP.to_string(), Value::Array(client_entries));
        }
    }

    dedup_record(&mut record);
    strip_zero_attrs(&mut record);

    Some(record)
}

/// The blob is usually raw JSON bytes; fall back to the
/// placeholder-ASCII decode path for non-UTF-8 serializations.
fn parse_blob(blob: &[u8]) -> Option<Value> {
    serde_json::from_slice(blob)
        .ok()
        .or_else(|| normalize::decode_bytes(blob))
}

/// Flatten the dot11 probed-SSID collection into natural-key entries.
///
/// Falls back to the last-probed-SSID record when the map is absent,
/// matching what older sensor firmwares emit.
fn probed_ssid_entries(dot11: &Value, default_first: i64, default_last: i64) -> Vec<Value> {
    let mut entries = Vec::new();

    if let Some(ssid_map) = dot11
        .get("dot11.device.probed_ssid_map")
        .and_then(Value::as_array)
    {
        for raw in ssid_map {
            if let Some(entry) = ssid_entry(raw, default_first, default_last) {
                entries.push(entry);
            }
        }
    }

    if entries.is_empty() {
        if let Some(last_record) = dot11.get("dot11.device.last_probed_ssid_record") {
            if let Some(entry) = ssid_entry(last_record, default_first, default_last) {
                entries.push(entry);
            }
        }
    }

    // Devices that report probe activity without an extractable map
    // still get a placeholder entry carrying the observation window.
    if entries.is_empty()
        && dot11
            .get("dot11.device.num_probed_ssids")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            > 0
    {
        entries.push(json!({
            SSID_KEY: HIDDEN_SSID,
            "first": default_first,
            "last": default_last,
            "crypt": "Unknown",
        }));
    }

    entries
}

fn ssid_entry(raw: &Value, default_first: i64, default_last: i64) -> Option<Value> {
    let ssid = raw.get("dot11.probedssid.ssid").and_then(Value::as_str)?;
    let first = raw
        .get("dot11.probedssid.first_time")
        .and_then(Value::as_i64)
        .unwrap_or(default_first);
    let last = raw
        .get("dot11.probedssid.last_time")
        .and_then(Value::as_i64)
        .unwrap_or(default_last);
    let crypt = raw
        .get("dot11.probedssid.crypt_string")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");

    Some(json!({
        SSID_KEY: ssid,
        "first": first,
        "last": last,
        "crypt": crypt,
    }))
}

/// Flatten the dot11 client collection (map or array form) into
/// natural-key entries.
fn client_entries(dot11: &Value, default_first: i64, default_last: i64) -> Vec<Value> {
    let raw_entries: Vec<&Value> = match dot11.get("dot11.device.client_map") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => return Vec::new(),
    };

    raw_entries
        .into_iter()
        .filter_map(|raw| {
            let bssid = raw.get("dot11.client.bssid").and_then(Value::as_str)?;
            let first = raw
                .get("dot11.client.first_time")
                .and_then(Value::as_i64)
                .unwrap_or(default_first);
            let last = raw
                .get("dot11.client.last_time")
                .and_then(Value::as_i64)
                .unwrap_or(default_last);

            Some(json!({
                BSSID_KEY: bssid,
                "first": first,
                "last": last,
            }))
        })
        .collect()
}
