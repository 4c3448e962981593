use super::config::SqsPollerConfig;
use super::event::{MessageAttribute, QueueMessage};
use super::MessageQueue;
use crate::error::QueueError;
use async_trait::async_trait;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::types::{
    DeleteMessageBatchRequestEntry, Message, MessageAttributeValue, MessageSystemAttributeName, QueueAttributeName,
};
use aws_sdk_sqs::Client as SqsClient;
use aws_types::region::Region;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use std::time::Duration;
use tracing::{debug, warn};

/// A queue in AWS SQS.
pub struct SqsQueue {
    client: SqsClient,
    queue_url: String,
}

impl SqsQueue {
    /// Creates a client with the default credential chain, using the profile and region of `config` if set.
    pub async fn from_config(config: &SqsPollerConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region_name() {
            loader = loader.region(Region::new(region));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }

        Self {
            client: SqsClient::new(&loader.load().await),
            queue_url: config.queue_url.clone(),
        }
    }
}

fn request_error<E: std::error::Error>(e: E) -> QueueError {
    QueueError::Request(DisplayErrorContext(e).to_string())
}

#[async_trait]
impl MessageQueue for SqsQueue {
    async fn queue_arn(&self) -> Result<String, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .attribute_names(QueueAttributeName::QueueArn)
            .send()
            .await
            .map_err(request_error)?;

        resp.attributes
            .and_then(|mut attributes| attributes.remove(&QueueAttributeName::QueueArn))
            .ok_or(QueueError::MissingAttribute("QueueArn"))
    }

    async fn receive_messages(
        &self,
        max_messages: i32,
        wait_time: Duration,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages)
            .wait_time_seconds(wait_time.as_secs() as i32)
            .visibility_timeout(visibility_timeout.as_secs() as i32)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All")
            .send()
            .await
            .map_err(request_error)?;

        // SQS returns no list when the wait time expires
        let messages = resp.messages.unwrap_or_default();
        debug!("Received {} messages from {}", messages.len(), self.queue_url);

        Ok(messages.into_iter().filter_map(to_queue_message).collect())
    }

    async fn delete_messages(&self, messages: &[QueueMessage]) -> Result<usize, QueueError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let entries = messages
            .iter()
            .enumerate()
            .map(|(idx, message)| {
                DeleteMessageBatchRequestEntry::builder()
                    .id(idx.to_string())
                    .receipt_handle(&message.receipt_handle)
                    .build()
                    .map_err(request_error)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let resp = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(request_error)?;

        // the request succeeds even if some entries were not deleted
        for failed in resp.failed() {
            let message_id = failed
                .id()
                .parse::<usize>()
                .ok()
                .and_then(|idx| messages.get(idx))
                .map(|message| message.message_id.as_str())
                .unwrap_or_default();
            warn!(
                "Failed to delete message {message_id} from {}: {} {}",
                self.queue_url,
                failed.code(),
                failed.message().unwrap_or_default()
            );
        }

        Ok(messages.len().saturating_sub(resp.failed().len()))
    }
}

/// Converts an SDK message, skipping messages without an id or a receipt handle.
fn to_queue_message(message: Message) -> Option<QueueMessage> {
    let Message {
        message_id: Some(message_id),
        receipt_handle: Some(receipt_handle),
        ..
    } = &message
    else {
        warn!("Invalid SQS message. Missing id or receipt: {:?}", message);
        return None;
    };

    Some(QueueMessage {
        message_id: message_id.clone(),
        receipt_handle: receipt_handle.clone(),
        body: message.body.clone().unwrap_or_default(),
        md5_of_body: message.md5_of_body.clone(),
        md5_of_message_attributes: message.md5_of_message_attributes.clone(),
        attributes: message
            .attributes
            .iter()
            .flatten()
            .map(|(name, value)| (name.as_str().to_owned(), value.clone()))
            .collect(),
        message_attributes: message
            .message_attributes
            .iter()
            .flatten()
            .map(|(name, value)| (name.clone(), to_message_attribute(value)))
            .collect(),
    })
}

fn to_message_attribute(value: &MessageAttributeValue) -> MessageAttribute {
    MessageAttribute {
        string_value: value.string_value.clone(),
        binary_value: value.binary_value.as_ref().map(|v| BASE64.encode(v.as_ref())),
        string_list_values: value.string_list_values.clone().unwrap_or_default(),
        binary_list_values: value
            .binary_list_values
            .iter()
            .flatten()
            .map(|v| BASE64.encode(v.as_ref()))
            .collect(),
        data_type: value.data_type.clone(),
    }
}
