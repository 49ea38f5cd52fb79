//! Nested-entry deduplicator
//!
//! A device that probes for the same SSID many times between capture
//! rotations shows up as many entries in its `probed_ssid_map`; the
//! same holds for repeated client associations. This module collapses
//! each nested collection to exactly one entry per natural key,
//! folding the observation window (min `first`, max `last`) across the
//! merged entries, and recomputes the companion count fields.
//!
//! Zero-stripping is a separate, lossy size-reduction step and must
//! run strictly after deduplication so a zero-valued timestamp is
//! never mistaken for "no merge needed".

use probesync_common::types::{ProbeRecord, BSSID_KEY, CLIENT_MAP, PROBED_SSID_MAP, SSID_KEY};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Companion count field recomputed alongside `probed_ssid_map`.
pub const NUM_PROBED_SSIDS: &str = "num_probed_ssids";

/// Companion count field recomputed alongside `client_map`.
pub const NUM_CLIENTS: &str = "num_clients";

/// Collapse repeated nested entries in a probe record.
///
/// Idempotent: applying it to an already-deduplicated record is a
/// no-op.
pub fn dedup_record(record: &mut ProbeRecord) {
    dedup_collection(&mut record.attrs, PROBED_SSID_MAP, SSID_KEY, NUM_PROBED_SSIDS);
    dedup_collection(&mut record.attrs, CLIENT_MAP, BSSID_KEY, NUM_CLIENTS);
}

/// Remove zero-valued attributes from a record, recursively.
///
/// Apply only after [`dedup_record`].
pub fn strip_zero_attrs(record: &mut ProbeRecord) {
    strip_zeros_in_map(&mut record.attrs);
}

fn dedup_collection(
    attrs: &mut Map<String, Value>,
    field: &str,
    natural_key: &str,
    count_field: &str,
) {
    let Some(Value::Array(entries)) = attrs.get_mut(field) else {
        return;
    };

    let mut deduped: Vec<Value> = Vec::with_capacity(entries.len());
    let mut seen: HashMap<String, usize> = HashMap::new();

    for entry in entries.drain(..) {
        let key = entry
            .get(natural_key)
            .and_then(Value::as_str)
            .map(str::to_owned);

        match key {
            Some(key) => {
                if let Some(&index) = seen.get(&key) {
                    merge_window(&mut deduped[index], &entry);
                } else {
                    seen.insert(key, deduped.len());
                    deduped.push(entry);
                }
            },
            // Entries without the natural key cannot be grouped; keep
            // them as-is.
            None => deduped.push(entry),
        }
    }

    let count = deduped.len();
    *entries = deduped;
    attrs.insert(count_field.to_string(), Value::from(count));
}

/// Fold a duplicate entry's observation window into the kept entry:
/// min of `first`, max of `last`. Other fields keep the first-seen
/// values.
fn merge_window(kept: &mut Value, duplicate: &Value) {
    let Some(kept) = kept.as_object_mut() else {
        return;
    };

    if let Some(dup_first) = duplicate.get("first").and_then(Value::as_i64) {
        let first = kept
            .get("first")
            .and_then(Value::as_i64)
            .map_or(dup_first, |f| f.min(dup_first));
        kept.insert("first".to_string(), Value::from(first));
    }

    if let Some(dup_last) = duplicate.get("last").and_then(Value::as_i64) {
        let last = kept
            .get("last")
            .and_then(Value::as_i64)
            .map_or(dup_last, |l| l.max(dup_last));
        kept.insert("last".to_string(), Value::from(last));
    }
}

fn is_zero(value: &Value) -> bool {
    matches!(value.as_f64(), Some(n) if n == 0.0)
}

fn strip_zeros_in_map(map: &mut Map<String, Value>) {
    map.retain(|_, v| !is_zero(v));
    for value in map.values_mut() {
        strip_zeros_in_value(value);
    }
}

fn strip_zeros_in_value(value: &mut Value) {
    match value {
        Value::Object(map) => strip_zeros_in_map(map),
        Value::Array(items) => {
            for item in items {
                strip_zeros_in_value(item);
            }
        },
        _ => {},
    }
}
