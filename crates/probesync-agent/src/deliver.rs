//! Delivery engine
//!
//! Serializes an upload batch and posts it to the remote collector.
//! Any non-2xx response or transport failure is a retryable error; the
//! caller must not advance the watermark and must stop the run so the
//! next scheduled run retries from the same point.

use crate::config::Config;
use crate::error::{AgentError, Result};
use chrono::{DateTime, Utc};
use probesync_common::checksum;
use probesync_common::types::UploadBatch;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// Request metadata headers
// ============================================================================

/// Header carrying the sensor identity.
pub const SENSOR_HEADER: &str = "X-Sensor-Id";

/// Header carrying the time-plus-content-addressed filename hint.
pub const FILENAME_HEADER: &str = "X-Filename";

/// Posts upload batches to the collector endpoint
#[derive(Debug, Clone)]
pub struct Deliverer {
    client: Client,
    endpoint: String,
}

impl Deliverer {
    /// Create a deliverer for a collector base URL
    pub fn new(collector_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = format!("{}/upload", collector_url.trim_end_matches('/'));
        Ok(Self { client, endpoint })
    }

    /// Create from the agent configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.collector_url, config.http_timeout())
    }

    /// Transmit one batch. Success is any 2xx response.
    pub async fn deliver(&self, batch: &UploadBatch) -> Result<()> {
        let body = serde_json::to_vec(batch)?;
        let filename = upload_filename(batch.generated, &body);

        info!(
            batch_id = %batch.batch_id,
            records = batch.summary.total_records,
            filename = %filename,
            "delivering batch"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(SENSOR_HEADER, &batch.sensor)
            .header(FILENAME_HEADER, &filename)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(batch_id = %batch.batch_id, status = status.as_u16(), "batch accepted");
            Ok(())
        } else {
            warn!(batch_id = %batch.batch_id, status = status.as_u16(), "batch rejected");
            Err(AgentError::delivery(status.as_u16()))
        }
    }
}

/// Filename hint for the collector: generation time plus a short
/// content digest, so retried uploads of the same payload collide
/// server-side instead of duplicating.
fn upload_filename(generated: DateTime<Utc>, body: &[u8]) -> String {
    format!(
        "probes-{}-{}.json",
        generated.format("%Y%m%dT%H%M%SZ"),
        checksum::short_digest(body)
    )
}
