//! Configuration management for the probesync agent
//!
//! Handles agent settings like the capture directory, collector URL,
//! batch sizing, and pacing.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ============================================================================
// Agent Configuration Constants
// ============================================================================

/// Default collector URL when not specified via environment variable.
pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:8080";

/// Default capture-file name prefix used by the sensor process.
pub const DEFAULT_FILE_PREFIX: &str = "rpi-kismet";

/// Default capture-file name suffix.
pub const DEFAULT_FILE_SUFFIX: &str = ".kismet";

/// Default upper bound on rows extracted from one file per run.
pub const DEFAULT_BATCH_LIMIT: u32 = 1000;

/// Default pause between files, bounding the outbound request rate.
pub const DEFAULT_INTER_FILE_DELAY_SECS: u64 = 2;

/// Default HTTP timeout for collector requests.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Name of the watermark persistence artifact inside the capture dir.
pub const WATERMARK_FILE_NAME: &str = "probesync-watermark.json";

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the rotating capture files
    pub capture_dir: PathBuf,

    /// Remote collector base URL
    pub collector_url: String,

    /// Capture-file name prefix
    pub file_prefix: String,

    /// Capture-file name suffix
    pub file_suffix: String,

    /// Sensor identity override (hardware serial is used when unset)
    pub sensor_id: Option<String>,

    /// Maximum rows extracted from one file per run
    pub batch_limit: u32,

    /// Pause between files within a run, in seconds
    pub inter_file_delay_secs: u64,

    /// HTTP timeout for collector requests, in seconds
    pub http_timeout_secs: u64,

    /// Watermark file location (defaults to inside the capture dir)
    pub watermark_path: Option<PathBuf>,
}

impl Config {
    /// Create a config with default values for a capture directory
    pub fn new(capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture_dir: capture_dir.into(),
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            sensor_id: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            inter_file_delay_secs: DEFAULT_INTER_FILE_DELAY_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            watermark_path: None,
        }
    }

    /// Load config from environment variables
    ///
    /// Environment variables:
    /// - `PROBESYNC_CAPTURE_DIR`: directory holding capture files
    /// - `PROBESYNC_COLLECTOR_URL`: collector base URL
    /// - `PROBESYNC_FILE_PREFIX` / `PROBESYNC_FILE_SUFFIX`: naming convention
    /// - `PROBESYNC_SENSOR_ID`: sensor identity override
    /// - `PROBESYNC_BATCH_LIMIT`: max rows per file per run
    /// - `PROBESYNC_INTER_FILE_DELAY_SECS`: pacing between files
    /// - `PROBESYNC_HTTP_TIMEOUT_SECS`: collector request timeout
    /// - `PROBESYNC_WATERMARK_PATH`: watermark file location
    pub fn from_env() -> Result<Self> {
        let capture_dir = std::env::var("PROBESYNC_CAPTURE_DIR").unwrap_or_else(|_| ".".into());
        let mut config = Self::new(capture_dir);

        if let Ok(url) = std::env::var("PROBESYNC_COLLECTOR_URL") {
            config.collector_url = url;
        }

        if let Ok(prefix) = std::env::var("PROBESYNC_FILE_PREFIX") {
            config.file_prefix = prefix;
        }

        if let Ok(suffix) = std::env::var("PROBESYNC_FILE_SUFFIX") {
            config.file_suffix = suffix;
        }

        if let Ok(id) = std::env::var("PROBESYNC_SENSOR_ID") {
            config.sensor_id = Some(id);
        }

        if let Ok(limit) = std::env::var("PROBESYNC_BATCH_LIMIT") {
            config.batch_limit = limit
                .parse()
                .map_err(|_| crate::error::AgentError::config("PROBESYNC_BATCH_LIMIT must be a positive integer"))?;
        }

        if let Ok(delay) = std::env::var("PROBESYNC_INTER_FILE_DELAY_SECS") {
            config.inter_file_delay_secs = delay.parse().map_err(|_| {
                crate::error::AgentError::config("PROBESYNC_INTER_FILE_DELAY_SECS must be an integer")
            })?;
        }

        if let Ok(timeout) = std::env::var("PROBESYNC_HTTP_TIMEOUT_SECS") {
            config.http_timeout_secs = timeout.parse().map_err(|_| {
                crate::error::AgentError::config("PROBESYNC_HTTP_TIMEOUT_SECS must be an integer")
            })?;
        }

        if let Ok(path) = std::env::var("PROBESYNC_WATERMARK_PATH") {
            config.watermark_path = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Resolved watermark file location
    pub fn watermark_path(&self) -> PathBuf {
        self.watermark_path
            .clone()
            .unwrap_or_else(|| self.capture_dir.join(WATERMARK_FILE_NAME))
    }

    /// Pause between files within a run
    pub fn inter_file_delay(&self) -> Duration {
        Duration::from_secs(self.inter_file_delay_secs)
    }

    /// HTTP timeout for collector requests
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Get the capture directory path
    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(".")
    }
}
