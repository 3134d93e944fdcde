//! Queue service abstraction.
//!
//! The poller and supervisor only see this trait; the production
//! implementation lives in [`sqs`], and tests script their own.

pub mod sqs;

pub use sqs::SqsClient;

use async_trait::async_trait;

use crate::error::QueueError;

/// A single notification received from a queue.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Service-assigned message id, for logging.
    pub id: String,
    /// Raw notification body.
    pub body: String,
    /// Handle used to delete the message once handled.
    pub receipt_handle: String,
}

/// Capabilities this source needs from the queue service.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// List the URLs of all queues whose name starts with `prefix`.
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError>;

    /// Long-poll `queue_url` for at most one message. An empty result is
    /// a timed-out poll, not an error.
    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a handled message. Idempotent on the service side.
    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError>;
}
