use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::clients::MessageQueue;
use crate::common::errors::Error;
use crate::common::Record;

/// One SQS client for publishing notifications and for deferring received messages.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: aws_sdk_sqs::Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn publish(&self, record: &Record) -> Result<Option<String>, Error> {
        let output = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(serde_json::to_string(record)?)
            .send()
            .await?;

        info!(
            "message sent to sqs: {}",
            output.message_id().unwrap_or("empty_id")
        );

        Ok(output.message_id)
    }

    async fn extend_visibility(
        &self,
        queue_url: &str,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), Error> {
        let seconds = i32::try_from(timeout.as_secs()).map_err(Error::backend)?;

        self.client
            .change_message_visibility()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(seconds)
            .send()
            .await?;

        Ok(())
    }
}
