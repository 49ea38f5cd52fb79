//! Probesync Agent Library
//!
//! Incremental extraction-and-delivery pipeline for rotating capture
//! files produced by an external Wi-Fi sensor process.
//!
//! # Overview
//!
//! Each run walks the capture directory oldest file to newest and, per
//! file:
//!
//! - **Extraction**: reads device rows above the persisted watermark,
//!   decodes the embedded observation blob, deduplicates nested
//!   entries (`extract`, `normalize`, `dedup`)
//! - **Delivery**: posts the resulting batch to the remote collector
//!   (`deliver`)
//! - **Checkpointing**: advances the on-disk watermark only after
//!   confirmed delivery (`watermark`)
//! - **Retirement**: deletes fully-drained, non-active files
//!   (`retire`)
//!
//! Delivery failures abort the run without touching the watermark or
//! deleting files, so the next scheduled run retries from the last
//! confirmed point (at-least-once delivery).

pub mod boot;
pub mod catalog;
pub mod config;
pub mod dedup;
pub mod deliver;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod retire;
pub mod sensor;
pub mod watermark;

// Re-export commonly used types
pub use config::Config;
pub use error::{AgentError, Result};
pub use pipeline::{Pipeline, RunReport};
