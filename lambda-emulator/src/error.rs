//! Error types shared across the emulator.

use crate::invocation::ErrorDetail;
use thiserror::Error;

/// Errors reported by a [`crate::store::FunctionStore`].
///
/// None of them are fatal: the store state is never changed when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The id was never issued by this store or the record has been dropped from history.
    #[error("Unknown invocation id: {0}")]
    UnknownInvocation(String),

    /// The id is known, but it is not the record currently checked out to the runtime.
    #[error("Invocation {id} is {status}, not the active executing invocation")]
    NotActive { id: String, status: String },

    /// The function reported an initialization error and cannot accept work.
    #[error("Function initialization failed: {0}")]
    InitFailed(String),
}

/// Errors converting between HTTP and API Gateway proxy payloads.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Invalid API Gateway mode: {0}. Use REST, HTTPV1 or HTTPV2")]
    InvalidMode(String),

    #[error("Lambda response is not a valid proxy response: {0}")]
    InvalidResponse(String),

    #[error("Invalid base64 body: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid route: {0}")]
    InvalidRoute(String),
}

/// Errors talking to the queue behind an SQS event source.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue request failed: {0}")]
    Request(String),

    #[error("Queue attribute {0} is missing")]
    MissingAttribute(&'static str),
}

/// Errors invoking a function through a [`crate::invoker::FunctionInvoker`].
#[derive(Error, Debug)]
pub enum InvokeError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("HTTP invoke failed: {0}")]
    Http(String),

    #[error("Invoke endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Errors raised on the function side by the handler registry.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("No handler registered for {0} events")]
    NoHandler(String),

    #[error("Invalid event payload: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    /// An error returned by the user's handler.
    #[error("{error_type}: {message}")]
    Function { error_type: String, message: String },
}

impl HandlerError {
    /// A shortcut for handlers to fail with a custom error type.
    pub fn function(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// The value reported as `errorType` to the Runtime API.
    pub fn error_type(&self) -> &str {
        match self {
            Self::NoHandler(_) => "Runtime.HandlerNotFound",
            Self::InvalidEvent(_) => "Runtime.InvalidEvent",
            Self::Function { error_type, .. } => error_type,
        }
    }

    /// Converts the error into the body posted to `/invocation/{id}/error`.
    pub fn to_error_detail(&self) -> ErrorDetail {
        let message = match self {
            Self::Function { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ErrorDetail::new(self.error_type(), message)
    }
}

/// Errors processing a batch of queue messages.
/// All of them leave the messages on the queue.
#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("Failed to build SQS event: {0}")]
    Event(#[from] serde_json::Error),
}

/// Invalid emulator configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value in {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name,
            reason: reason.into(),
        }
    }
}
