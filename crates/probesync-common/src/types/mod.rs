//! Common types used across probesync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use uuid::Uuid;

// ============================================================================
// Nested collection field names
// ============================================================================

/// Attribute key for the probed-SSID collection on a probe record.
pub const PROBED_SSID_MAP: &str = "probed_ssid_map";

/// Attribute key for the associated-client collection on a probe record.
pub const CLIENT_MAP: &str = "client_map";

/// Natural key of probed-SSID entries.
pub const SSID_KEY: &str = "ssid";

/// Natural key of client-association entries.
pub const BSSID_KEY: &str = "bssid";

/// Represents a normalized device observation extracted from a capture file.
///
/// The nested `attrs` map carries protocol-specific data, notably the
/// `probed_ssid_map` and `client_map` collections. After deduplication each
/// natural key (SSID, peer BSSID) appears exactly once per collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    /// Device MAC address
    pub mac: String,

    /// Earliest observation time (epoch seconds)
    pub first: i64,

    /// Latest observation time (epoch seconds)
    pub last: i64,

    /// Nested protocol attributes
    #[serde(default)]
    pub attrs: Map<String, Value>,
}

impl ProbeRecord {
    /// Create a record with an empty attribute map
    pub fn new(mac: impl Into<String>, first: i64, last: i64) -> Self {
        Self {
            mac: mac.into(),
            first,
            last,
            attrs: Map::new(),
        }
    }

    /// Distinct SSID strings present in the probed-SSID collection
    pub fn probed_ssids(&self) -> Vec<&str> {
        match self.attrs.get(PROBED_SSID_MAP) {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|e| e.get(SSID_KEY).and_then(Value::as_str))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Aggregate counts carried alongside an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Total probe records in the batch
    pub total_records: usize,

    /// Distinct device MAC addresses
    pub unique_devices: usize,

    /// Distinct SSIDs across all probed-SSID collections
    pub unique_ssids: usize,
}

/// Immutable snapshot of probe records handed to the delivery step.
///
/// Never mutated after creation; the delivery engine serializes it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBatch {
    /// Unique identifier for this batch (idempotency token)
    pub batch_id: Uuid,

    /// Sensor identity (hardware serial or configured override)
    pub sensor: String,

    /// Timestamp when the batch was generated
    pub generated: DateTime<Utc>,

    /// Normalized, deduplicated probe records
    pub records: Vec<ProbeRecord>,

    /// Aggregate counts over `records`
    pub summary: BatchSummary,
}

impl UploadBatch {
    /// Build a batch from records, computing the summary
    pub fn new(sensor: impl Into<String>, records: Vec<ProbeRecord>) -> Self {
        let unique_devices = records
            .iter()
            .map(|r| r.mac.as_str())
            .collect::<HashSet<_>>()
            .len();
        let unique_ssids = records
            .iter()
            .flat_map(|r| r.probed_ssids())
            .collect::<HashSet<_>>()
            .len();

        Self {
            batch_id: Uuid::new_v4(),
            sensor: sensor.into(),
            generated: Utc::now(),
            summary: BatchSummary {
                total_records: records.len(),
                unique_devices,
                unique_ssids,
            },
            records,
        }
    }
}
