//! Record normalizer
//!
//! Capture files store the per-device observation blob in whichever
//! shape the sensor's serializer produced: raw JSON bytes, a mapping
//! from numeric string indices to byte values, or a tagged container
//! (`{"type": "Buffer", "data": [...]}`). This module decodes all of
//! them into native JSON structures.
//!
//! Decoding is deliberately permissive: a payload that fails to parse
//! degrades to `None` ("no structured data for this field") and never
//! produces an error. This is the most failure-prone transformation in
//! the pipeline and a single bad blob must not fail a batch.

use serde_json::{Map, Value};

/// Minimum entry count before an object is treated as an index→byte map.
/// Small objects with numeric keys are far more likely to be real data.
pub const MIN_BYTE_MAP_LEN: usize = 10;

/// Decode a raw value into its native structured form.
///
/// Returns `None` only when the value looked like an encoded byte
/// sequence but did not parse as structured data. Non-compound values
/// and ordinary objects pass through unchanged.
pub fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if let Some(bytes) = index_byte_map(&map) {
                return decode_bytes(&bytes);
            }
            if let Some(bytes) = tagged_byte_container(&map) {
                return decode_bytes(&bytes);
            }
            Some(Value::Object(map))
        },
        other => Some(other),
    }
}

/// Decode a reconstructed byte sequence as JSON.
///
/// Each byte maps to its printable-ASCII character; non-printable bytes
/// become a `.` placeholder. Parse failure yields `None`.
pub fn decode_bytes(bytes: &[u8]) -> Option<Value> {
    let text: String = bytes
        .iter()
        .map(|&b| {
            if (32..=126).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect();

    serde_json::from_str(&text).ok()
}

/// Recognize an object whose keys are all numeric indices and whose
/// values are all byte-sized integers, and reconstruct the ordered
/// byte sequence.
fn index_byte_map(map: &Map<String, Value>) -> Option<Vec<u8>> {
    if map.len() <= MIN_BYTE_MAP_LEN {
        return None;
    }

    let mut entries: Vec<(usize, u8)> = Vec::with_capacity(map.len());
    for (key, value) in map {
        let index: usize = key.parse().ok()?;
        let byte = value.as_u64().filter(|&v| v <= 255)?;
        entries.push((index, byte as u8));
    }

    entries.sort_unstable_by_key(|&(index, _)| index);
    Some(entries.into_iter().map(|(_, byte)| byte).collect())
}

/// Recognize the tagged container form: `{"type": "Buffer", "data": [...]}`.
fn tagged_byte_container(map: &Map<String, Value>) -> Option<Vec<u8>> {
    if map.get("type").and_then(Value::as_str) != Some("Buffer") {
        return None;
    }
    let data = map.get("data")?.as_array()?;

    // Out-of-range entries become placeholder bytes rather than
    // invalidating the container.
    Some(
        data.iter()
            .map(|v| match v.as_u64() {
                Some(b) if b <= 255 => b as u8,
                _ => b'.',
            })
            .collect(),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Encode a JSON payload as the index→byte map form the sensor's
    /// serializer sometimes produces.
    fn encode_as_index_map(payload: &Value) -> Value {
        let text = serde_json::to_string(payload).unwrap();
        let mut map = Map::new();
        for (i, byte) in text.bytes().enumerate() {
            map.insert(i.to_string(), json!(byte));
        }
        Value::Object(map)
    }

    #[test]
    fn test_round_trip_index_map() {
        let payload = json!({
            "kismet.device.base.macaddr": "AA:BB:CC:DD:EE:FF",
            "dot11.device": { "num_probed_ssids": 2 }
        });
        let encoded = encode_as_index_map(&payload);
        assert_eq!(normalize(encoded), Some(payload));
    }

    #[test]
    fn test_tagged_container() {
        let payload = json!({ "ssid": "cafe" });
        let bytes: Vec<Value> = serde_json::to_vec(&payload)
            .unwrap()
            .into_iter()
            .map(|b| json!(b))
            .collect();
        let container = json!({ "type": "Buffer", "data": bytes });
        assert_eq!(normalize(container), Some(payload));
    }

    #[test]
    fn test_unparseable_bytes_degrade_to_none() {
        let garbage = b"not json at all, definitely more than ten bytes";
        let mut map = Map::new();
        for (i, byte) in garbage.iter().enumerate() {
            map.insert(i.to_string(), json!(byte));
        }
        assert_eq!(normalize(Value::Object(map)), None);
    }

    #[test]
    fn test_non_compound_passes_through() {
        assert_eq!(normalize(json!(42)), Some(json!(42)));
        assert_eq!(normalize(json!("text")), Some(json!("text")));
        assert_eq!(normalize(Value::Null), Some(Value::Null));
    }

    #[test]
    fn test_ordinary_object_passes_through() {
        let obj = json!({ "mac": "AA:BB", "first": 10 });
        assert_eq!(normalize(obj.clone()), Some(obj));
    }

    #[test]
    fn test_small_numeric_map_not_treated_as_bytes() {
        // Below the threshold: numeric keys alone do not mark a buffer
        let obj = json!({ "0": 1, "1": 2, "2": 3 });
        assert_eq!(normalize(obj.clone()), Some(obj));
    }

    #[test]
    fn test_non_printable_bytes_become_placeholders() {
        // 0x01 is non-printable; the decoded text has a '.' in the
        // string value, which still parses as JSON
        let text = b"{\"k\": \"a\x01b\"}";
        let decoded = decode_bytes(text).unwrap();
        assert_eq!(decoded, json!({ "k": "a.b" }));
    }

    #[test]
    fn test_decode_bytes_parse_failure() {
        assert_eq!(decode_bytes(b"\x00\x01\x02"), None);
        assert_eq!(decode_bytes(b"plain text"), None);
    }
}
