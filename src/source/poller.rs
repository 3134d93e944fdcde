//! Per-queue polling loop.
//!
//! One poller per discovered queue: receive → decode → lag → filter →
//! handoff → acknowledge, until the shared cancellation token fires.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::MessageFormat;
use crate::decode;
use crate::emit;
use crate::lag::LagTracker;
use crate::metrics::events::{
    AckFailed, FileForwarded, NotificationDecodeFailed, NotificationFiltered,
    NotificationsReceived, ReceiveFailed,
};
use crate::queue::{QueueClient, QueueMessage};
use crate::sink::FileIngest;

/// Growing retry delay for receive failures.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    current: Duration,
    floor: Duration,
    ceiling: Duration,
}

impl Backoff {
    pub fn new(floor: Duration, ceiling: Duration) -> Self {
        Self {
            current: floor,
            floor,
            ceiling,
        }
    }

    /// Delay to wait now; doubles the next one, up to the ceiling.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.ceiling);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.floor;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

/// Long-polls one queue until cancelled.
pub(crate) struct QueuePoller {
    pub queue_url: String,
    pub client: Arc<dyn QueueClient>,
    pub sink: Arc<dyn FileIngest>,
    pub lag: Arc<LagTracker>,
    pub format: MessageFormat,
    pub bucket: Option<String>,
    pub path_filter: Option<Regex>,
    pub shutdown: CancellationToken,
}

impl QueuePoller {
    pub async fn run(self) {
        let mut backoff = Backoff::default();

        loop {
            // Cancellation is checked before every receive and interrupts
            // an in-flight wait; a cancelled poller never polls again.
            let received = tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    debug!(queue_url = %self.queue_url, "poller stopping");
                    return;
                }
                result = self.client.receive(&self.queue_url) => result,
            };

            let messages = match received {
                Ok(messages) => {
                    backoff.reset();
                    messages
                }
                Err(error) => {
                    warn!(queue_url = %self.queue_url, %error, "receive failed");
                    emit!(ReceiveFailed);
                    // The wait races cancellation so shutdown latency is
                    // bounded by the poll window, not the backoff ceiling.
                    tokio::select! {
                        biased;

                        _ = self.shutdown.cancelled() => return,
                        _ = tokio::time::sleep(backoff.next_delay()) => {}
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                continue;
            }

            emit!(NotificationsReceived {
                count: messages.len() as u64
            });
            for message in messages {
                self.handle_message(message).await;
            }
        }
    }

    /// Decode, observe lag, filter, forward, acknowledge.
    ///
    /// A message is deleted exactly when it decoded, whether or not the
    /// filter let it through; an undecodable message is left for the
    /// queue's redelivery policy. Handoff and delete run to completion
    /// even if cancellation fires meanwhile.
    async fn handle_message(&self, message: QueueMessage) {
        let decoded = match decode::decode(&message.body, self.format, self.bucket.as_deref()) {
            Ok(decoded) => decoded,
            Err(error) => {
                warn!(
                    queue_url = %self.queue_url,
                    id = %message.id,
                    %error,
                    "undecodable notification"
                );
                emit!(NotificationDecodeFailed);
                return;
            }
        };

        if let Some(raw) = &decoded.timestamp {
            match DateTime::parse_from_rfc3339(raw) {
                Ok(timestamp) => self.lag.observe(timestamp.with_timezone(&Utc)),
                // The notification itself is fine; only the lag sample is
                // dropped.
                Err(error) => warn!(
                    queue_url = %self.queue_url,
                    timestamp = %raw,
                    %error,
                    "unparseable notification timestamp"
                ),
            }
        }

        if self.matches_filter(&decoded.file_path) {
            self.sink.accept(&decoded.file_path).await;
            emit!(FileForwarded);
        } else {
            debug!(file_path = %decoded.file_path, "path filtered out");
            emit!(NotificationFiltered);
        }

        if let Err(error) = self
            .client
            .delete(&self.queue_url, &message.receipt_handle)
            .await
        {
            // Not retried; the message will be redelivered and processed
            // again, which at-least-once delivery permits.
            warn!(
                queue_url = %self.queue_url,
                id = %message.id,
                %error,
                "failed to delete notification"
            );
            emit!(AckFailed);
        }
    }

    fn matches_filter(&self, path: &str) -> bool {
        self.path_filter.as_ref().is_none_or(|re| re.is_match(path))
    }
}
