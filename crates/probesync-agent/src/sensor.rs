//! Sensor identity
//!
//! Every upload carries a sensor identity header so the collector can
//! attribute batches. The identity is the board's hardware serial read
//! from `/proc/cpuinfo`, overridable through configuration for
//! non-embedded deployments.

use crate::config::Config;
use tracing::warn;

/// Fallback identity when neither config nor hardware provide one
pub const UNKNOWN_SENSOR: &str = "unknown";

/// Resolve the sensor identity: config override first, then the
/// hardware serial, then a fixed fallback.
pub fn sensor_id(config: &Config) -> String {
    if let Some(ref id) = config.sensor_id {
        return id.clone();
    }

    match hardware_serial() {
        Some(serial) => serial,
        None => {
            warn!("no sensor identity available, using fallback");
            UNKNOWN_SENSOR.to_string()
        },
    }
}

/// Read the hardware serial from `/proc/cpuinfo`
pub fn hardware_serial() -> Option<String> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_serial(&cpuinfo)
}

/// Extract the `Serial` field from cpuinfo-formatted text
fn parse_serial(cpuinfo: &str) -> Option<String> {
    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() != "Serial" {
            continue;
        }

        let serial = value.trim().to_lowercase();
        if !serial.is_empty() && serial.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some(serial);
        }
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial() {
        let cpuinfo = "processor\t: 0\nmodel name\t: ARMv7\nSerial\t\t: 10000000abcdef12\n";
        assert_eq!(parse_serial(cpuinfo), Some("10000000abcdef12".to_string()));
    }

    #[test]
    fn test_parse_serial_missing() {
        assert_eq!(parse_serial("processor\t: 0\n"), None);
    }

    #[test]
    fn test_parse_serial_rejects_non_hex() {
        assert_eq!(parse_serial("Serial\t: not-a-serial\n"), None);
    }

    #[test]
    fn test_config_override_wins() {
        let mut config = Config::new(".");
        config.sensor_id = Some("bench-unit-7".to_string());
        assert_eq!(sensor_id(&config), "bench-unit-7");
    }
}
