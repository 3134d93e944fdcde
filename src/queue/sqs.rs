//! AWS SQS-backed queue client.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use super::{QueueClient, QueueMessage};
use crate::config::SourceConfig;
use crate::error::QueueError;

/// Long-poll wait window in seconds. A receive returns as soon as a
/// message arrives, or empty after this long.
const WAIT_TIME_SECS: i32 = 20;

/// Production [`QueueClient`] on the AWS SDK.
pub struct SqsClient {
    client: Client,
}

impl SqsClient {
    /// Build a client for the configured region using the default
    /// credential chain. `endpoint_url` overrides the target for local
    /// SQS-compatible stacks.
    pub async fn new(config: &SourceConfig) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_sqs::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        let client = Client::from_conf(builder.build());

        info!(region = %config.region, "sqs client initialized");
        Self { client }
    }
}

#[async_trait]
impl QueueClient for SqsClient {
    async fn list_queues(&self, prefix: &str) -> Result<Vec<String>, QueueError> {
        let mut urls = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let resp = self
                .client
                .list_queues()
                .queue_name_prefix(prefix)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| QueueError::ListQueues {
                    prefix: prefix.to_string(),
                    message: format!("{e:?}"),
                })?;

            urls.extend(resp.queue_urls.unwrap_or_default());
            next_token = resp.next_token;
            if next_token.is_none() {
                break;
            }
        }

        debug!(prefix, count = urls.len(), "listed queues");
        Ok(urls)
    }

    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>, QueueError> {
        // One message per receive: the downstream accept call can block on
        // backpressure, and messages parked in a local buffer would hit
        // their visibility timeout and get redelivered to other consumers.
        let resp = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .wait_time_seconds(WAIT_TIME_SECS)
            .max_number_of_messages(1)
            .send()
            .await
            .map_err(|e| QueueError::Receive {
                queue_url: queue_url.to_string(),
                message: format!("{e:?}"),
            })?;

        let messages = resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                let receipt_handle = msg.receipt_handle?;
                Some(QueueMessage {
                    id: msg.message_id.unwrap_or_else(|| "unknown".to_string()),
                    body: msg.body.unwrap_or_default(),
                    receipt_handle,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, queue_url: &str, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Delete {
                queue_url: queue_url.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(())
    }
}
