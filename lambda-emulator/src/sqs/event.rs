use crate::invocation::{ErrorDetail, InvocationOutcome};
use hyper::body::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// A message received from a queue, in the shape it is passed to the function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    pub md5_of_body: Option<String>,
    pub md5_of_message_attributes: Option<String>,
    /// System attributes, e.g. `ApproximateReceiveCount`
    pub attributes: BTreeMap<String, String>,
    pub message_attributes: BTreeMap<String, MessageAttribute>,
}

/// A user-defined message attribute. Binary values are base64-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAttribute {
    pub string_value: Option<String>,
    pub binary_value: Option<String>,
    pub string_list_values: Vec<String>,
    pub binary_list_values: Vec<String>,
    pub data_type: String,
}

#[derive(Serialize)]
struct SqsEvent<'a> {
    #[serde(rename = "Records")]
    records: Vec<SqsEventRecord<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SqsEventRecord<'a> {
    message_id: &'a str,
    receipt_handle: &'a str,
    body: &'a str,
    attributes: &'a BTreeMap<String, String>,
    message_attributes: &'a BTreeMap<String, MessageAttribute>,
    md5_of_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    md5_of_message_attributes: Option<&'a str>,
    event_source: &'static str,
    #[serde(rename = "eventSourceARN")]
    event_source_arn: &'a str,
    aws_region: &'a str,
}

/// Builds the SQS event a function receives for a batch of messages.
pub fn build_event(messages: &[QueueMessage], queue_arn: &str, region: &str) -> Result<Bytes, serde_json::Error> {
    let event = SqsEvent {
        records: messages
            .iter()
            .map(|message| SqsEventRecord {
                message_id: &message.message_id,
                receipt_handle: &message.receipt_handle,
                body: &message.body,
                attributes: &message.attributes,
                message_attributes: &message.message_attributes,
                md5_of_body: message.md5_of_body.as_deref(),
                md5_of_message_attributes: message.md5_of_message_attributes.as_deref(),
                event_source: "aws:sqs",
                event_source_arn: queue_arn,
                aws_region: region,
            })
            .collect(),
    };

    serde_json::to_vec(&event).map(Bytes::from)
}

/// What to do with a batch after the function has handled it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    /// Delete every message
    AllSucceeded,
    /// Delete all messages except these ids
    PartialFailure(HashSet<String>),
    /// The response cannot be trusted, delete nothing
    Malformed(String),
    /// The function failed, delete nothing
    FunctionError(ErrorDetail),
}

impl BatchResult {
    /// Reads a partial batch response, e.g. `{"batchItemFailures":[{"itemIdentifier":"id-2"}]}`.
    pub fn from_outcome(outcome: &InvocationOutcome, batch: &[QueueMessage]) -> Self {
        match outcome {
            InvocationOutcome::Failed(error) => Self::FunctionError(error.clone()),
            InvocationOutcome::Succeeded(output) => Self::from_response(output, batch),
        }
    }

    fn from_response(output: &[u8], batch: &[QueueMessage]) -> Self {
        if output.iter().all(u8::is_ascii_whitespace) {
            return Self::AllSucceeded;
        }

        let response: Value = match serde_json::from_slice(output) {
            Ok(v) => v,
            Err(e) => return Self::Malformed(format!("response is not valid JSON: {e}")),
        };

        let failures = match response.as_object().and_then(|v| v.get("batchItemFailures")) {
            None | Some(Value::Null) => return Self::AllSucceeded,
            Some(Value::Array(v)) => v,
            Some(_) => return Self::Malformed("batchItemFailures is not a list".to_owned()),
        };

        let mut failed = HashSet::new();
        for failure in failures {
            let Some(id) = failure
                .get("itemIdentifier")
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
            else {
                return Self::Malformed(format!("batch item failure without itemIdentifier: {failure}"));
            };

            if !batch.iter().any(|message| message.message_id == id) {
                return Self::Malformed(format!("itemIdentifier {id} is not in the batch"));
            }

            failed.insert(id.to_owned());
        }

        if failed.is_empty() {
            Self::AllSucceeded
        } else {
            Self::PartialFailure(failed)
        }
    }

    /// The messages of `batch` that can be deleted.
    pub fn deletable<'a>(&self, batch: &'a [QueueMessage]) -> Vec<&'a QueueMessage> {
        match self {
            Self::AllSucceeded => batch.iter().collect(),
            Self::PartialFailure(failed) => batch
                .iter()
                .filter(|message| !failed.contains(&message.message_id))
                .collect(),
            Self::Malformed(_) | Self::FunctionError(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch(n: usize) -> Vec<QueueMessage> {
        (1..=n)
            .map(|i| QueueMessage {
                message_id: format!("id-{i}"),
                receipt_handle: format!("rh-{i}"),
                body: format!("body {i}"),
                ..Default::default()
            })
            .collect()
    }

    fn succeeded(value: &str) -> InvocationOutcome {
        InvocationOutcome::Succeeded(Bytes::copy_from_slice(value.as_bytes()))
    }

    #[test]
    fn event_has_records() {
        let mut messages = batch(2);
        messages[0]
            .attributes
            .insert("ApproximateReceiveCount".to_owned(), "1".to_owned());

        let event = build_event(&messages, "arn:aws:sqs:us-east-1:123456789012:orders", "us-east-1").unwrap();
        let event: Value = serde_json::from_slice(&event).unwrap();

        let records = event["Records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["messageId"], "id-1");
        assert_eq!(records[0]["receiptHandle"], "rh-1");
        assert_eq!(records[0]["eventSource"], "aws:sqs");
        assert_eq!(records[0]["eventSourceARN"], "arn:aws:sqs:us-east-1:123456789012:orders");
        assert_eq!(records[0]["awsRegion"], "us-east-1");
        assert_eq!(records[0]["attributes"]["ApproximateReceiveCount"], "1");
        assert_eq!(records[1]["messageAttributes"], json!({}));
    }

    #[test]
    fn responses_without_failures_delete_everything() {
        let messages = batch(3);
        for response in ["", "null", "\"done\"", "{}", r#"{"batchItemFailures":[]}"#, r#"{"batchItemFailures":null}"#] {
            let result = BatchResult::from_outcome(&succeeded(response), &messages);
            assert_eq!(result, BatchResult::AllSucceeded, "{response}");
            assert_eq!(result.deletable(&messages).len(), 3);
        }
    }

    #[test]
    fn partial_failure_keeps_named_messages() {
        let messages = batch(5);
        let result = BatchResult::from_outcome(
            &succeeded(r#"{"batchItemFailures":[{"itemIdentifier":"id-2"},{"itemIdentifier":"id-4"}]}"#),
            &messages,
        );

        let deleted: Vec<_> = result.deletable(&messages).iter().map(|m| m.message_id.as_str()).collect();
        assert_eq!(deleted, vec!["id-1", "id-3", "id-5"]);
    }

    #[test]
    fn malformed_responses_delete_nothing() {
        let messages = batch(2);
        for response in [
            "{not json",
            r#"{"batchItemFailures":"id-1"}"#,
            r#"{"batchItemFailures":[{"itemIdentifier":""}]}"#,
            r#"{"batchItemFailures":[{"id":"id-1"}]}"#,
            r#"{"batchItemFailures":[{"itemIdentifier":"id-9"}]}"#,
        ] {
            let result = BatchResult::from_outcome(&succeeded(response), &messages);
            assert!(matches!(result, BatchResult::Malformed(_)), "{response}");
            assert!(result.deletable(&messages).is_empty());
        }
    }

    #[test]
    fn function_error_deletes_nothing() {
        let messages = batch(2);
        let result = BatchResult::from_outcome(
            &InvocationOutcome::Failed(ErrorDetail::new("Unhandled", "boom")),
            &messages,
        );

        assert!(result.deletable(&messages).is_empty());
    }
}
