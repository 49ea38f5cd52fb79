//! Error types for the probesync agent
//!
//! The taxonomy mirrors the pipeline's failure policy: delivery and
//! watermark errors abort the run, per-record and per-file errors are
//! logged and skipped at their call sites.

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Comprehensive error type for agent operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// Capture-file database operation failed
    #[error("Capture file error: {0}")]
    Database(#[from] sqlx::Error),

    /// HTTP request to the collector failed at the transport level
    #[error("Network request failed: {0}. Check connectivity and the collector URL.")]
    Http(#[from] reqwest::Error),

    /// Collector rejected the batch (non-2xx response)
    #[error("Delivery rejected by collector: status {status}")]
    Delivery { status: u16 },

    /// Watermark store is corrupt or unwritable; continuing would risk
    /// silent data loss or unbounded reprocessing
    #[error("Watermark store error: {0}. Reset the watermark file to reprocess from zero.")]
    Watermark(String),

    /// File system operation failed
    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed
    #[error("Failed to serialize batch: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check the PROBESYNC_* environment variables.")]
    Config(String),
}

impl AgentError {
    /// Create a watermark error
    pub fn watermark(msg: impl Into<String>) -> Self {
        Self::Watermark(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a delivery rejection error
    pub fn delivery(status: u16) -> Self {
        Self::Delivery { status }
    }
}
