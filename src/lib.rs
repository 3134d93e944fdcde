//! squall: a queue-driven ingestion front-end for S3-backed log pipelines.
//!
//! Discovers SQS queues by name prefix, long-polls each queue for
//! notifications about newly produced S3 files, and hands the decoded file
//! paths to a downstream file reader, deleting each notification once it
//! has been handled. Delivery is at-least-once: a notification that fails
//! to decode, or whose poller dies before the delete, is redelivered by
//! the queue service.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use squall::sink::ConsoleSink;
//! use squall::{Config, run_source};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.yaml")?;
//!     let stats = run_source(config, Arc::new(ConsoleSink::new())).await?;
//!     println!("forwarded {} files", stats.files_accepted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod lag;
pub mod metrics;
pub mod queue;
pub mod signal;
pub mod sink;
pub mod source;

// Re-export main types
pub use config::Config;
pub use source::{SourceStats, SqsSource, run_source};
