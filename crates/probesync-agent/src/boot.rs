//! Boot-time duties
//!
//! When the sensor host boots, the agent announces itself to the
//! collector and clears out capture files left over from the previous
//! power cycle (the sensor process starts a fresh rotation on boot,
//! so leftovers would never drain). Both duties are best-effort.

use crate::config::Config;
use crate::deliver::SENSOR_HEADER;
use crate::error::{AgentError, Result};
use crate::sensor;
use tracing::{info, warn};

/// Announce the sensor to the collector. Failure is reported to the
/// caller but is safe to treat as non-fatal.
pub async fn notify_boot(config: &Config) -> Result<()> {
    let sensor_id = sensor::sensor_id(config);
    let url = format!("{}/boot", config.collector_url.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;

    let response = client
        .get(&url)
        .header(SENSOR_HEADER, &sensor_id)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        info!(sensor = %sensor_id, "boot notification sent");
        Ok(())
    } else {
        Err(AgentError::delivery(status.as_u16()))
    }
}

/// Delete leftover capture files and journals from before the boot.
/// Returns how many entries were removed; per-file failures are
/// logged and skipped.
pub fn cleanup_stale_files(config: &Config) -> Result<usize> {
    let mut removed = 0;

    for entry in std::fs::read_dir(config.capture_dir())? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();

        let is_capture = name.starts_with(&config.file_prefix)
            && (name.ends_with(&config.file_suffix)
                || name.ends_with(&format!("{}-journal", config.file_suffix)));
        if !is_capture {
            continue;
        }

        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                info!(file = %name, "deleted stale capture file");
                removed += 1;
            },
            Err(e) => {
                warn!(file = %name, error = %e, "failed to delete stale capture file");
            },
        }
    }

    Ok(removed)
}
