//! Pipeline orchestration
//!
//! One run walks the capture files oldest to newest: extract, deliver,
//! persist the watermark, retire drained files. The ordering is the
//! core correctness property: a crash or delivery failure at any point
//! leaves the watermark un-advanced and the files on disk, so the next
//! run re-delivers instead of losing data.

use crate::catalog::{CaptureFile, FileCatalog};
use crate::config::Config;
use crate::deliver::Deliverer;
use crate::error::{AgentError, Result};
use crate::extract::Extractor;
use crate::retire;
use crate::sensor;
use crate::watermark::WatermarkStore;
use probesync_common::types::UploadBatch;
use tracing::{info, warn};

/// Outcome counters for one pipeline run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Files examined this run
    pub files_processed: usize,

    /// Records confirmed delivered
    pub records_delivered: usize,

    /// Capture files deleted
    pub files_retired: usize,

    /// Watermark value at the end of the run
    pub watermark: i64,
}

/// The extraction-and-delivery pipeline for one capture directory
pub struct Pipeline {
    config: Config,
    catalog: FileCatalog,
    extractor: Extractor,
    deliverer: Deliverer,
    store: WatermarkStore,
    sensor_id: String,
}

impl Pipeline {
    /// Assemble the pipeline from configuration
    pub fn new(config: Config) -> Result<Self> {
        let catalog = FileCatalog::from_config(&config);
        let extractor = Extractor::new(config.batch_limit);
        let deliverer = Deliverer::from_config(&config)?;
        let store = WatermarkStore::new(config.watermark_path());
        let sensor_id = sensor::sensor_id(&config);

        Ok(Self {
            config,
            catalog,
            extractor,
            deliverer,
            store,
            sensor_id,
        })
    }

    /// Execute one run to completion.
    ///
    /// A delivery or watermark failure aborts the run immediately;
    /// per-file read failures are logged and skipped.
    pub async fn run(&self) -> Result<RunReport> {
        let mut watermark = self.store.load()?;
        let files = self.catalog.scan()?;

        info!(
            files = files.len(),
            watermark,
            sensor = %self.sensor_id,
            "starting pipeline run"
        );

        let mut report = RunReport {
            watermark,
            ..Default::default()
        };

        'files: for (index, file) in files.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_file_delay()).await;
            }

            // One fetch may not drain a file; keep extracting until
            // the fetch comes back short of the batch limit.
            loop {
                let extraction = match self.extractor.extract(file, watermark).await {
                    Ok(extraction) => extraction,
                    Err(AgentError::Database(e)) => {
                        warn!(file = %file.name, error = %e, "skipping unreadable file");
                        continue 'files;
                    },
                    Err(e) => return Err(e),
                };

                let drained = extraction.rows_read < self.config.batch_limit as usize;

                if !extraction.records.is_empty() {
                    let batch = UploadBatch::new(&self.sensor_id, extraction.records);
                    let delivered = batch.summary.total_records;

                    // Fail-fast: an undelivered batch stops the run so
                    // file order and the watermark stay consistent.
                    self.deliverer.deliver(&batch).await?;
                    report.records_delivered += delivered;
                }

                // Record-less fetches (filtered device types) still
                // advance the watermark so such files can drain.
                if extraction.max_last_seen > watermark {
                    watermark = extraction.max_last_seen;
                    self.store.save(watermark)?;
                    report.watermark = watermark;
                } else if !drained {
                    // A full fetch of rows tied on one timestamp
                    // cannot advance; leave the file for a later run
                    // rather than spin.
                    warn!(
                        file = %file.name,
                        limit = self.config.batch_limit,
                        "batch limit too small to advance past tied timestamps"
                    );
                    break;
                }

                if drained {
                    break;
                }
            }

            report.files_processed += 1;
            report.files_retired += self.retire_drained(&files[..=index], watermark).await;
        }

        info!(
            files = report.files_processed,
            records = report.records_delivered,
            retired = report.files_retired,
            watermark = report.watermark,
            "pipeline run complete"
        );

        Ok(report)
    }

    /// Retire every file up to the last confirmed delivery that is
    /// inactive and fully below the watermark.
    async fn retire_drained(&self, files: &[CaptureFile], watermark: i64) -> usize {
        let mut drained = Vec::new();

        for file in files {
            if file.active || !file.path.exists() {
                continue;
            }

            match self.extractor.file_max_last_seen(file).await {
                Ok(max) if max <= watermark => drained.push(file.clone()),
                Ok(_) => {},
                Err(e) => {
                    warn!(file = %file.name, error = %e, "cannot check drain state");
                },
            }
        }

        retire::retire_files(&drained)
    }
}
