//! SQS event source: polls a queue, invokes a function with each batch and deletes what succeeded.

use crate::error::{PollError, QueueError};
use crate::invoker::{FunctionInvoker, HttpInvoker, StoreInvoker};
use crate::store::StoreRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod client;
pub mod config;
pub mod event;

pub use client::SqsQueue;
pub use config::{load_sqs_configs, parse_sqs_configs, SqsPollerConfig};
pub use event::{build_event, BatchResult, MessageAttribute, QueueMessage};

/// SQS long poll duration, the maximum allowed
pub const RECEIVE_WAIT_TIME: Duration = Duration::from_secs(20);

/// How long to wait before retrying after a failed queue or invoke call
pub const ERROR_DELAY: Duration = Duration::from_secs(3);

/// How long a batch in flight may take to finish after shutdown was requested
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The queue operations the poller needs.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn queue_arn(&self) -> Result<String, QueueError>;

    /// Waits up to `wait_time` for messages. An empty list means none arrived.
    async fn receive_messages(
        &self,
        max_messages: i32,
        wait_time: Duration,
        visibility_timeout: Duration,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Returns how many of `messages` were actually deleted.
    async fn delete_messages(&self, messages: &[QueueMessage]) -> Result<usize, QueueError>;
}

/// The result of handling one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub deleted: usize,
    pub result: BatchResult,
}

/// Polls one queue on behalf of one function.
pub struct SqsPoller {
    config: SqsPollerConfig,
    queue: Arc<dyn MessageQueue>,
    invoker: Arc<dyn FunctionInvoker>,
    wait_time: Duration,
    error_delay: Duration,
    shutdown_grace: Duration,
}

impl SqsPoller {
    pub fn new(config: SqsPollerConfig, queue: Arc<dyn MessageQueue>, invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self {
            config,
            queue,
            invoker,
            wait_time: RECEIVE_WAIT_TIME,
            error_delay: ERROR_DELAY,
            shutdown_grace: SHUTDOWN_GRACE,
        }
    }

    /// Creates a poller backed by SQS. Functions are invoked through the Invoke API at
    /// `LambdaRuntimeApi` if set, or through `registry` otherwise.
    pub async fn from_config(config: SqsPollerConfig, registry: StoreRegistry) -> Self {
        let queue = Arc::new(SqsQueue::from_config(&config).await);
        let invoker: Arc<dyn FunctionInvoker> = match &config.lambda_runtime_api {
            Some(endpoint) => Arc::new(HttpInvoker::new(endpoint)),
            None => Arc::new(StoreInvoker::new(registry)),
        };

        Self::new(config, queue, invoker)
    }

    pub fn with_wait_time(mut self, wait_time: Duration) -> Self {
        self.wait_time = wait_time;
        self
    }

    pub fn with_error_delay(mut self, error_delay: Duration) -> Self {
        self.error_delay = error_delay;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    pub fn config(&self) -> &SqsPollerConfig {
        &self.config
    }

    /// Polls until `cancel` fires.
    ///
    /// A batch in flight gets [`SHUTDOWN_GRACE`] to finish. After that it is abandoned undeleted
    /// and SQS redelivers its messages once the visibility timeout expires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            "Polling {} for {} (batch size {})",
            self.config.queue_url, self.config.function_name, self.config.batch_size
        );

        let Some(queue_arn) = self.resolve_queue_arn(&cancel).await else {
            info!("Stopped polling {}", self.config.queue_url);
            return;
        };
        let region = self.config.region_name().unwrap_or_else(|| "us-east-1".to_owned());

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.queue.receive_messages(
                    self.config.batch_size,
                    self.wait_time,
                    self.config.visibility_timeout,
                ) => received,
            };

            let messages = match received {
                // the long poll is the backoff
                Ok(v) if v.is_empty() => continue,
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to receive messages from {}: {e}", self.config.queue_url);
                    if !self.pause(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            let processing = self.process_batch(&queue_arn, &region, messages);
            tokio::pin!(processing);

            let processed = tokio::select! {
                processed = &mut processing => processed,
                _ = cancel.cancelled() => match timeout(self.shutdown_grace, &mut processing).await {
                    Ok(processed) => processed,
                    Err(_) => {
                        warn!(
                            "Abandoned a batch from {} at shutdown, its messages will be redelivered",
                            self.config.queue_url
                        );
                        break;
                    }
                },
            };

            match processed {
                Ok(report) => debug!("{report:?}"),
                Err(e) => {
                    warn!("Failed to process a batch from {}: {e}", self.config.queue_url);
                    if !self.pause(&cancel).await {
                        break;
                    }
                }
            }
        }

        info!("Stopped polling {}", self.config.queue_url);
    }

    /// Invokes the function once with the whole batch and deletes the messages that succeeded.
    pub async fn process_batch(
        &self,
        queue_arn: &str,
        region: &str,
        messages: Vec<QueueMessage>,
    ) -> Result<BatchReport, PollError> {
        info!(
            "Invoking {} with {} messages from {}",
            self.config.function_name,
            messages.len(),
            self.config.queue_url
        );

        let event = build_event(&messages, queue_arn, region)?;
        let outcome = self.invoker.invoke(&self.config.function_name, event).await?;
        let result = BatchResult::from_outcome(&outcome, &messages);

        match &result {
            BatchResult::AllSucceeded => {}
            BatchResult::PartialFailure(failed) => {
                info!("{} of {} messages failed", failed.len(), messages.len());
            }
            BatchResult::Malformed(reason) => {
                warn!("Invalid batch response from {}: {reason}", self.config.function_name);
            }
            BatchResult::FunctionError(error) => {
                warn!(
                    "{} failed: {}: {}",
                    self.config.function_name, error.error_type, error.error_message
                );
            }
        }

        let deletable: Vec<QueueMessage> = result.deletable(&messages).into_iter().cloned().collect();

        let deleted = if self.config.disable_message_delete {
            debug!("Message deletion is disabled, keeping {} messages", deletable.len());
            0
        } else {
            let deleted = self.queue.delete_messages(&deletable).await?;
            if deleted < deletable.len() {
                warn!(
                    "Deleted only {deleted} of {} messages from {}",
                    deletable.len(),
                    self.config.queue_url
                );
            }
            deleted
        };

        Ok(BatchReport {
            received: messages.len(),
            deleted,
            result,
        })
    }

    /// Resolves the queue ARN for the event records, retrying until cancelled.
    async fn resolve_queue_arn(&self, cancel: &CancellationToken) -> Option<String> {
        loop {
            let resolved = tokio::select! {
                _ = cancel.cancelled() => return None,
                resolved = self.queue.queue_arn() => resolved,
            };

            match resolved {
                Ok(v) => return Some(v),
                Err(e) => {
                    warn!("Failed to get the ARN of {}: {e}", self.config.queue_url);
                    if !self.pause(cancel).await {
                        return None;
                    }
                }
            }
        }
    }

    /// Sleeps for the error delay. Returns false if cancelled.
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(self.error_delay) => true,
        }
    }
}
