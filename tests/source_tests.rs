//! Integration tests exercising the source against scripted fakes.
//!
//! A `FakeQueue` scripts discovery, receives, and failures; a
//! `RecordingSink` captures every downstream capability call so the
//! shutdown ordering can be asserted directly.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::timeout;

use squall::SqsSource;
use squall::config::{MessageFormat, SourceConfig};
use squall::error::{QueueError, SourceError};
use squall::queue::{QueueClient, QueueMessage};
use squall::sink::{FileIngest, SinkStats};

fn config(format: MessageFormat) -> SourceConfig {
    SourceConfig {
        region: "us-west-2".to_string(),
        bucket: None,
        queue_prefixes: vec!["logs-".to_string()],
        message_format: format,
        file_path_filter: None,
        endpoint_url: None,
    }
}

fn message(n: usize, body: &str) -> QueueMessage {
    QueueMessage {
        id: format!("m{n}"),
        body: body.to_string(),
        receipt_handle: format!("r{n}"),
    }
}

// ── Fake queue service ──────────────────────────────────────────────

#[derive(Default)]
struct FakeQueue {
    queues: HashMap<String, Vec<String>>,
    messages: Mutex<HashMap<String, VecDeque<QueueMessage>>>,
    deleted: Mutex<Vec<String>>,
    polled: Mutex<HashSet<String>>,
    /// Number of upcoming receives that fail before the fake recovers.
    fail_receives: AtomicUsize,
    fail_listing: bool,
}

impl FakeQueue {
    fn with_queues(prefix: &str, urls: &[&str]) -> Self {
        let mut queues = HashMap::new();
        queues.insert(
            prefix.to_string(),
            urls.iter().map(|u| u.to_string()).collect(),
        );
        Self {
            queues,
            ..Default::default()
        }
    }

    fn push(&self, queue_url: &str, msg: QueueMessage) {
        self.messages
            .lock()
            .unwrap()
            .entry(queue_url.to_string())
            .or_default()
            .push_back(msg);
    }

    fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn polled(&self) -> HashSet<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for FakeQueue {
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        if self.fail_listing {
            return Err(QueueError::ListQueues {
                prefix: prefix.to_string(),
                message: "listing unavailable".to_string(),
            });
        }
        Ok(self.queues.get(prefix).cloned().unwrap_or_default())
    }

    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>, QueueError> {
        self.polled.lock().unwrap().insert(queue_url.to_string());

        let mut failures = self.fail_receives.load(Ordering::SeqCst);
        while failures > 0 {
            match self.fail_receives.compare_exchange(
                failures,
                failures - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => {
                    return Err(QueueError::Receive {
                        queue_url: queue_url.to_string(),
                        message: "transient".to_string(),
                    });
                }
                Err(current) => failures = current,
            }
        }

        let next = self
            .messages
            .lock()
            .unwrap()
            .get_mut(queue_url)
            .and_then(|q| q.pop_front());
        match next {
            Some(msg) => Ok(vec![msg]),
            None => {
                // A long poll that times out with nothing to deliver.
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(vec![])
            }
        }
    }

    async fn delete(&self, _queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.deleted.lock().unwrap().push(receipt_handle.to_string());
        Ok(())
    }
}

// ── Recording sink ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum SinkEvent {
    Accept(String),
    NoMoreInput,
    RequestStop,
    AwaitCompletion,
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    fn record(&self, event: SinkEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    fn accepted(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Accept(path) => Some(path),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl FileIngest for RecordingSink {
    async fn accept(&self, file_path: &str) {
        self.record(SinkEvent::Accept(file_path.to_string()));
    }

    async fn no_more_input(&self) {
        self.record(SinkEvent::NoMoreInput);
    }

    async fn request_stop(&self) {
        self.record(SinkEvent::RequestStop);
    }

    async fn await_completion(&self) {
        self.record(SinkEvent::AwaitCompletion);
    }

    fn stats(&self) -> SinkStats {
        SinkStats {
            files_accepted: self.accepted().len() as u64,
            records_produced: 0,
        }
    }

    fn release(&self, _buffer: Bytes) {}
}

// ── Helpers ─────────────────────────────────────────────────────────

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn spawn_run(
    source: &Arc<SqsSource>,
) -> tokio::task::JoinHandle<Result<squall::SourceStats, SourceError>> {
    let source = source.clone();
    tokio::spawn(async move { source.run().await })
}

async fn finish(
    runner: tokio::task::JoinHandle<Result<squall::SourceStats, SourceError>>,
) -> squall::SourceStats {
    timeout(Duration::from_secs(5), runner)
        .await
        .expect("run did not stop in time")
        .expect("run task panicked")
        .expect("run returned an error")
}

// ── Shutdown protocol ───────────────────────────────────────────────

mod shutdown_tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_drains_pollers_then_sink_in_order() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a", "logs-b"]));
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Plain), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        wait_until(|| queue.polled().len() == 2).await;
        source.stop();
        let stats = finish(runner).await;

        assert_eq!(stats.files_accepted, 0);
        // Both queues stayed empty, so the terminal sequence is the whole
        // event log, in the contract order.
        assert_eq!(
            sink.events(),
            vec![
                SinkEvent::NoMoreInput,
                SinkEvent::RequestStop,
                SinkEvent::AwaitCompletion
            ]
        );
    }

    #[tokio::test]
    async fn test_no_accept_after_input_closed() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        for n in 0..20 {
            queue.push("logs-a", message(n, &format!("2020/01/01/file-{n}.gz")));
        }
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Plain), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        // Stop while the queue still has traffic in flight.
        wait_until(|| queue.deleted().len() >= 3).await;
        source.stop();
        finish(runner).await;

        let events = sink.events();
        let closed_at = events
            .iter()
            .position(|e| *e == SinkEvent::NoMoreInput)
            .expect("input was never closed");
        assert!(
            events[closed_at..]
                .iter()
                .all(|e| !matches!(e, SinkEvent::Accept(_))),
            "accept after input closed: {events:?}"
        );
        assert_eq!(
            events[closed_at..closed_at + 3],
            [
                SinkEvent::NoMoreInput,
                SinkEvent::RequestStop,
                SinkEvent::AwaitCompletion
            ]
        );
    }

    #[tokio::test]
    async fn test_one_poller_per_discovered_queue() {
        let mut queue = FakeQueue::default();
        queue.queues.insert(
            "prod-".to_string(),
            vec!["prod-1".to_string(), "prod-2".to_string()],
        );
        queue
            .queues
            .insert("staging-".to_string(), vec!["staging-1".to_string()]);
        let queue = Arc::new(queue);

        let mut cfg = config(MessageFormat::Plain);
        cfg.queue_prefixes = vec!["prod-".to_string(), "staging-".to_string()];
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(SqsSource::new(cfg, queue.clone(), sink.clone()).unwrap());

        let runner = spawn_run(&source);
        wait_until(|| queue.polled().len() == 3).await;
        source.stop();
        finish(runner).await;

        let expected: HashSet<String> = ["prod-1", "prod-2", "staging-1"]
            .iter()
            .map(|u| u.to_string())
            .collect();
        assert_eq!(queue.polled(), expected);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal_before_any_poller() {
        let queue = Arc::new(FakeQueue {
            fail_listing: true,
            ..FakeQueue::with_queues("logs-", &["logs-a"])
        });
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Plain), queue.clone(), sink.clone()).unwrap(),
        );

        let err = source.run().await.unwrap_err();
        assert!(matches!(err, SourceError::Discovery { .. }));
        assert!(queue.polled().is_empty());
        assert!(sink.events().is_empty());
    }
}

// ── Message handling ────────────────────────────────────────────────

mod message_tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_message_forwarded_then_deleted() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.push("logs-a", message(1, "path/to/file"));
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Plain), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        wait_until(|| queue.deleted().len() == 1).await;

        // Plain messages carry no timestamp, so there is no lag sample.
        assert_eq!(source.stats().lag_seconds, None);

        source.stop();
        let stats = finish(runner).await;

        assert_eq!(sink.accepted(), vec!["path/to/file".to_string()]);
        assert_eq!(queue.deleted(), vec!["r1".to_string()]);
        assert_eq!(stats.files_accepted, 1);
    }

    #[tokio::test]
    async fn test_sns_message_resolved_against_bucket() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.push(
            "logs-a",
            message(
                1,
                r#"{"Message":"s3n://mybucket/2020/01/01/file.gz","Timestamp":"2020-01-01T00:00:00Z"}"#,
            ),
        );
        let mut cfg = config(MessageFormat::Sns);
        cfg.bucket = Some("mybucket".to_string());
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(SqsSource::new(cfg, queue.clone(), sink.clone()).unwrap());

        let runner = spawn_run(&source);
        wait_until(|| queue.deleted().len() == 1).await;

        // The 2020 notification timestamp yields an enormous lag, read
        // once and then reset.
        let lag = source.stats().lag_seconds.expect("lag sample expected");
        assert!(lag > 0.0);
        assert_eq!(source.stats().lag_seconds, None);

        source.stop();
        finish(runner).await;

        assert_eq!(sink.accepted(), vec!["2020/01/01/file.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_filtered_path_deleted_but_not_forwarded() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.push("logs-a", message(1, "2020/01/01/file.txt"));
        queue.push("logs-a", message(2, "2020/01/01/file.gz"));
        let mut cfg = config(MessageFormat::Plain);
        cfg.file_path_filter = Some(r"\.gz$".to_string());
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(SqsSource::new(cfg, queue.clone(), sink.clone()).unwrap());

        let runner = spawn_run(&source);
        wait_until(|| queue.deleted().len() == 2).await;
        source.stop();
        finish(runner).await;

        assert_eq!(sink.accepted(), vec!["2020/01/01/file.gz".to_string()]);
        assert_eq!(queue.deleted(), vec!["r1".to_string(), "r2".to_string()]);
    }

    #[tokio::test]
    async fn test_undecodable_message_left_unacknowledged() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.push("logs-a", message(1, "definitely not json"));
        queue.push(
            "logs-a",
            message(2, r#"{"Message":"s3n://b/ok.gz","Timestamp":"2020-01-01T00:00:00Z"}"#),
        );
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Sns), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        // The second message gets through, proving the loop survived the
        // first one.
        wait_until(|| queue.deleted().len() == 1).await;
        source.stop();
        finish(runner).await;

        assert_eq!(queue.deleted(), vec!["r2".to_string()]);
        assert_eq!(sink.accepted(), vec!["s3n://b/ok.gz".to_string()]);
    }

    #[tokio::test]
    async fn test_bad_timestamp_still_forwarded_and_acked() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.push(
            "logs-a",
            message(1, r#"{"Message":"s3n://b/ok.gz","Timestamp":"yesterday-ish"}"#),
        );
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Sns), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        wait_until(|| queue.deleted().len() == 1).await;

        // The broken timestamp never reached the lag tracker.
        assert_eq!(source.stats().lag_seconds, None);

        source.stop();
        finish(runner).await;

        assert_eq!(sink.accepted(), vec!["s3n://b/ok.gz".to_string()]);
        assert_eq!(queue.deleted(), vec!["r1".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_errors_back_off_and_recover() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        queue.fail_receives.store(2, Ordering::SeqCst);
        queue.push("logs-a", message(1, "path/to/file"));
        let sink = Arc::new(RecordingSink::default());
        let source = Arc::new(
            SqsSource::new(config(MessageFormat::Plain), queue.clone(), sink.clone()).unwrap(),
        );

        let runner = spawn_run(&source);
        wait_until(|| queue.deleted().len() == 1).await;
        source.stop();
        finish(runner).await;

        assert_eq!(sink.accepted(), vec!["path/to/file".to_string()]);
    }
}

// ── Construction ────────────────────────────────────────────────────

mod construction_tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_filter_rejected_at_construction() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        let sink = Arc::new(RecordingSink::default());
        let mut cfg = config(MessageFormat::Plain);
        cfg.file_path_filter = Some("(unclosed".to_string());

        let err = SqsSource::new(cfg, queue, sink).unwrap_err();
        assert!(matches!(err, SourceError::Config { .. }));
    }

    #[tokio::test]
    async fn test_missing_prefixes_rejected_at_construction() {
        let queue = Arc::new(FakeQueue::with_queues("logs-", &["logs-a"]));
        let sink = Arc::new(RecordingSink::default());
        let mut cfg = config(MessageFormat::Plain);
        cfg.queue_prefixes.clear();

        let err = SqsSource::new(cfg, queue, sink).unwrap_err();
        assert!(matches!(err, SourceError::Config { .. }));
    }
}
