//! Probesync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the probesync
//! workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all probesync
//! workspace members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Checksums**: Payload digest utilities for upload addressing
//! - **Logging**: Centralized tracing setup
//! - **Types**: Shared domain types (probe records, upload batches)

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{BatchSummary, ProbeRecord, UploadBatch};
