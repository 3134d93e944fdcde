//! Console sink: logs accepted file paths.
//!
//! Stands in for a real file reader when running the binary standalone,
//! which is handy for verifying queue wiring and filters without touching
//! storage. It has no in-flight work, so stopping completes immediately.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::info;

use super::{FileIngest, SinkStats};

#[derive(Debug, Default)]
pub struct ConsoleSink {
    accepted: AtomicU64,
    // Write-once completion event: request_stop stores the permit,
    // await_completion consumes it.
    drained: Notify,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileIngest for ConsoleSink {
    async fn accept(&self, file_path: &str) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        info!(file_path, "file ready for ingestion");
    }

    async fn no_more_input(&self) {
        info!("input closed");
    }

    async fn request_stop(&self) {
        self.drained.notify_one();
    }

    async fn await_completion(&self) {
        self.drained.notified().await;
    }

    fn stats(&self) -> SinkStats {
        SinkStats {
            files_accepted: self.accepted.load(Ordering::Relaxed),
            records_produced: 0,
        }
    }

    fn release(&self, _buffer: Bytes) {}
}
