//! squall: listens on SQS queues for new log files on S3 and feeds them
//! to a downstream reader.
//!
//! Queues are discovered by name prefix; each one is long-polled for
//! notifications (plain paths or SNS envelopes) until a shutdown signal
//! arrives, at which point the pollers drain before the reader is closed.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use squall::config::Config;
use squall::error::{AddressParseSnafu, ConfigSnafu, MetricsSnafu, SourceError};
use squall::sink::ConsoleSink;
use squall::{metrics, run_source};

/// SQS-driven S3 file ingestion front-end.
#[derive(Parser, Debug)]
#[command(name = "squall")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without polling.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), SourceError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("squall starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Region: {}", config.source.region);
        match &config.source.bucket {
            Some(bucket) => info!("Bucket: {}", bucket),
            None => info!("Bucket: none (full notification URLs passed through)"),
        }
        for prefix in &config.source.queue_prefixes {
            info!("  - queue prefix: {}", prefix);
        }
        info!("Message format: {}", config.source.message_format.as_str());
        if let Some(filter) = &config.source.file_path_filter {
            info!("File path filter: {}", filter);
        }
        info!("Configuration is valid");
        return Ok(());
    }

    let stats = run_source(config, Arc::new(ConsoleSink::new())).await?;

    info!("Source stopped cleanly");
    info!("  Files forwarded: {}", stats.files_accepted);
    info!("  Records produced: {}", stats.records_produced);

    Ok(())
}
