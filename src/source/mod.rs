//! Queue discovery, poller fan-out, and the ordered shutdown protocol.
//!
//! [`SqsSource`] is the producer end of the pipeline: it resolves the
//! configured queue prefixes to concrete queue URLs, runs one poller per
//! queue, and on stop winds everything down in a fixed order so the
//! downstream reader never sees a file submission after it has been told
//! the input is closed.

mod poller;

use bytes::Bytes;
use futures::future::join_all;
use regex::Regex;
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, SourceConfig};
use crate::emit;
use crate::error::{ConfigSnafu, DiscoverySnafu, PollerJoinSnafu, SourceError};
use crate::lag::LagTracker;
use crate::metrics::events::{ActivePollers, NotificationLag};
use crate::queue::{QueueClient, SqsClient};
use crate::sink::FileIngest;

use poller::QueuePoller;

/// How often the standalone runner collects stats (and thereby drains the
/// lag accumulator into the gauge).
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Point-in-time statistics for the source: the sink's counters plus the
/// notification lag observed since the previous read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceStats {
    pub files_accepted: u64,
    pub records_produced: u64,
    pub lag_seconds: Option<f64>,
}

/// Supervises one poller per discovered queue.
impl std::fmt::Debug for SqsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqsSource")
            .field("config", &self.config)
            .field("path_filter", &self.path_filter)
            .field("stop", &self.stop)
            .finish_non_exhaustive()
    }
}

pub struct SqsSource {
    config: SourceConfig,
    client: Arc<dyn QueueClient>,
    sink: Arc<dyn FileIngest>,
    lag: Arc<LagTracker>,
    path_filter: Option<Regex>,
    stop: CancellationToken,
}

impl SqsSource {
    /// Create a source over an arbitrary queue client and sink.
    pub fn new(
        config: SourceConfig,
        client: Arc<dyn QueueClient>,
        sink: Arc<dyn FileIngest>,
    ) -> Result<Self, SourceError> {
        config.validate().context(ConfigSnafu)?;
        let path_filter = config.compiled_filter().context(ConfigSnafu)?;

        Ok(Self {
            config,
            client,
            sink,
            lag: Arc::new(LagTracker::new()),
            path_filter,
            stop: CancellationToken::new(),
        })
    }

    /// Token that ends the run; [`SqsSource::stop`] fires it.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Request the run to wind down through the ordered shutdown sequence.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Current counters. Reads (and resets) the interval lag, emitting the
    /// gauge when there is data; an idle interval leaves the gauge stale.
    pub fn stats(&self) -> SourceStats {
        let lag_seconds = self
            .lag
            .read_and_reset()
            .map(|lag| lag.num_milliseconds() as f64 / 1000.0);
        if let Some(seconds) = lag_seconds {
            emit!(NotificationLag { seconds });
        }

        let sink = self.sink.stats();
        SourceStats {
            files_accepted: sink.files_accepted,
            records_produced: sink.records_produced,
            lag_seconds,
        }
    }

    /// Hand a drained record buffer back to the downstream reader.
    pub fn release(&self, buffer: Bytes) {
        self.sink.release(buffer);
    }

    /// Discover queues, run one poller per queue until stopped, then drain.
    ///
    /// The wind-down order is the shutdown contract: cancel the pollers,
    /// join them all, and only then tell the sink its input is closed; the
    /// run does not return until the sink reports it has fully drained.
    pub async fn run(&self) -> Result<SourceStats, SourceError> {
        let endpoints = self.discover().await?;
        info!(count = endpoints.len(), "starting pollers");

        let cancel = CancellationToken::new();
        let mut pollers = Vec::with_capacity(endpoints.len());
        for queue_url in endpoints {
            let poller = QueuePoller {
                queue_url,
                client: self.client.clone(),
                sink: self.sink.clone(),
                lag: self.lag.clone(),
                format: self.config.message_format,
                bucket: self.config.bucket.clone(),
                path_filter: self.path_filter.clone(),
                shutdown: cancel.clone(),
            };
            pollers.push(tokio::spawn(poller.run()));
        }
        emit!(ActivePollers {
            count: pollers.len()
        });

        self.stop.cancelled().await;
        info!("stop requested, draining pollers");

        cancel.cancel();
        for joined in join_all(pollers).await {
            joined.context(PollerJoinSnafu)?;
        }
        emit!(ActivePollers { count: 0 });

        self.sink.no_more_input().await;
        self.sink.request_stop().await;
        self.sink.await_completion().await;
        info!("source drained");

        Ok(self.stats())
    }

    /// Resolve every configured prefix before any poller starts. A failing
    /// prefix aborts the run with no pollers spawned.
    async fn discover(&self) -> Result<Vec<String>, SourceError> {
        let mut endpoints = Vec::new();
        for prefix in &self.config.queue_prefixes {
            let urls = self
                .client
                .list_queues(prefix)
                .await
                .context(DiscoverySnafu)?;
            info!(prefix = %prefix, count = urls.len(), "discovered queues");
            endpoints.extend(urls);
        }
        Ok(endpoints)
    }
}

/// Run a source against the real SQS service until a shutdown signal.
///
/// Wires up the SQS client, the signal handler that fires the stop
/// request, and the periodic stats collection that drives the lag gauge.
pub async fn run_source(
    config: Config,
    sink: Arc<dyn FileIngest>,
) -> Result<SourceStats, SourceError> {
    let client = Arc::new(SqsClient::new(&config.source).await);
    let source = Arc::new(SqsSource::new(config.source, client, sink)?);

    tokio::spawn({
        let source = source.clone();
        async move {
            crate::signal::shutdown_signal().await;
            source.stop();
        }
    });

    let reporter = tokio::spawn({
        let source = source.clone();
        let stopped = source.stop_token();
        async move {
            let mut tick = tokio::time::interval(STATS_INTERVAL);
            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = tick.tick() => {
                        source.stats();
                    }
                }
            }
        }
    });

    let stats = source.run().await;
    reporter.abort();
    stats
}
