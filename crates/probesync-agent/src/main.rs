//! Probesync agent - capture extraction and delivery tool

use anyhow::Result;
use clap::Parser;
use probesync_agent::catalog::FileCatalog;
use probesync_agent::watermark::WatermarkStore;
use probesync_agent::{boot, Config, Pipeline};
use probesync_common::logging::{init_logging, LogConfig, LogLevel};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "probesync-agent")]
#[command(author, version, about = "Capture-file extraction and delivery agent")]
struct Cli {
    /// Action to perform
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Execute one extraction-and-delivery run
    Run,

    /// Perform boot-time duties: notify the collector and clear
    /// stale capture files
    Boot {
        /// Skip deleting leftover capture files
        #[arg(long)]
        keep_files: bool,
    },

    /// Show the persisted watermark and discovered capture files
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?.with_file_prefix("probesync-agent");

    // PROBESYNC_LOG_LEVEL takes precedence over the verbose flag
    if cli.verbose && std::env::var("PROBESYNC_LOG_LEVEL").is_err() {
        log_config = log_config.with_level(LogLevel::Debug);
    }

    init_logging(&log_config)?;

    let config = Config::from_env()?;

    match cli.command {
        Command::Run => {
            let pipeline = Pipeline::new(config)?;
            let report = pipeline.run().await?;
            info!(
                files = report.files_processed,
                records = report.records_delivered,
                retired = report.files_retired,
                watermark = report.watermark,
                "run finished"
            );
        },
        Command::Boot { keep_files } => {
            if let Err(e) = boot::notify_boot(&config).await {
                warn!(error = %e, "boot notification failed");
            }
            if !keep_files {
                let removed = boot::cleanup_stale_files(&config)?;
                info!(removed, "stale capture files cleared");
            }
        },
        Command::Status => {
            let watermark = WatermarkStore::new(config.watermark_path()).load()?;
            let files = FileCatalog::from_config(&config).scan()?;

            println!("watermark: {}", watermark);
            println!("capture files: {}", files.len());
            for file in files {
                let marker = if file.active { " (active)" } else { "" };
                println!("  {}{}", file.name, marker);
            }
        },
    }

    Ok(())
}
