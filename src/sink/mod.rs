//! Downstream file-ingestion interface.
//!
//! The source is the producer side of a larger pipeline: it discovers file
//! paths and hands them to a reader that opens and parses them. That
//! reader is modeled as a capability trait so the source can be driven
//! against fakes in tests and against different readers in production.

pub mod console;

pub use console::ConsoleSink;

use async_trait::async_trait;
use bytes::Bytes;

/// Point-in-time counters reported by the downstream reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Files submitted via `accept`.
    pub files_accepted: u64,
    /// Records the reader has produced from those files.
    pub records_produced: u64,
}

/// Capabilities the source needs from the downstream file reader.
///
/// `accept` may block when the reader's buffer is full; that blocking is
/// the backpressure that throttles the pollers. The terminal sequence is
/// fixed: `no_more_input` exactly once, only after every producer has
/// stopped, then `request_stop`, then `await_completion`.
#[async_trait]
pub trait FileIngest: Send + Sync {
    /// Submit a file path for ingestion.
    async fn accept(&self, file_path: &str);

    /// Signal that no further `accept` call will ever be made.
    async fn no_more_input(&self);

    /// Ask the reader to finish in-flight work and accept no new work.
    async fn request_stop(&self);

    /// Wait until the reader has fully drained. Readable once per run.
    async fn await_completion(&self);

    /// Current counters, merged into the source's own stats.
    fn stats(&self) -> SinkStats;

    /// Return a drained record buffer to the reader's pool.
    fn release(&self, buffer: Bytes);
}
