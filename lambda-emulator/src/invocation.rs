//! Invocation records and the values attached to them.

use chrono::{DateTime, Utc};
use hyper::body::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an invocation: `Queued → Executing → Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvocationStatus {
    Queued,
    Executing,
    Succeeded,
    Failed,
}

impl InvocationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Protocol metadata passed to the runtime client with the payload.
///
/// Callers usually leave everything empty and let the store fill in
/// the trace id and ARN at enqueue time and the deadline at dequeue time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationHeaders {
    pub trace_id: Option<String>,
    pub invoked_function_arn: Option<String>,
    /// Milliseconds since the epoch
    pub deadline_ms: Option<i64>,
    /// JSON, as expected in `Lambda-Runtime-Client-Context`
    pub client_context: Option<String>,
    /// JSON, as expected in `Lambda-Runtime-Cognito-Identity`
    pub cognito_identity: Option<String>,
}

impl InvocationHeaders {
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_client_context(mut self, client_context: impl Into<String>) -> Self {
        self.client_context = Some(client_context.into());
        self
    }
}

/// The error reported by a function, in the shape used by the Runtime API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<Vec<String>>,
}

impl ErrorDetail {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: None,
        }
    }

    /// Parses an error body posted by a runtime client.
    /// Bodies that are not the expected JSON are kept verbatim as the message.
    /// The error type falls back to `header_type` and then to `Unhandled`.
    pub fn from_body(body: &[u8], header_type: Option<&str>) -> Self {
        let mut detail = serde_json::from_slice::<ErrorDetail>(body)
            .unwrap_or_else(|_| Self::new("", String::from_utf8_lossy(body)));

        if detail.error_type.is_empty() {
            detail.error_type = header_type.unwrap_or("Unhandled").to_owned();
        }

        detail
    }

    pub fn to_json(&self) -> String {
        // a struct of strings always serializes
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Result of a terminal invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    Succeeded(Bytes),
    Failed(ErrorDetail),
}

impl InvocationOutcome {
    pub fn status(&self) -> InvocationStatus {
        match self {
            Self::Succeeded(_) => InvocationStatus::Succeeded,
            Self::Failed(_) => InvocationStatus::Failed,
        }
    }
}

/// One invocation: its input, headers, lifecycle status and result.
#[derive(Debug, Clone)]
pub struct InvocationRecord {
    pub id: String,
    pub input: Bytes,
    pub headers: InvocationHeaders,
    /// Headers as supplied by the caller, kept for requeueing
    pub(crate) caller_headers: InvocationHeaders,
    pub status: InvocationStatus,
    /// Populated on the terminal transition only
    pub outcome: Option<InvocationOutcome>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InvocationRecord {
    pub(crate) fn new(input: Bytes, caller_headers: InvocationHeaders) -> Self {
        let created_at = Utc::now();
        let mut headers = caller_headers.clone();
        if headers.trace_id.is_none() {
            headers.trace_id = Some(generate_trace_id(created_at));
        }

        Self {
            id: Uuid::new_v4().to_string(),
            input,
            headers,
            caller_headers,
            status: InvocationStatus::Queued,
            outcome: None,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }

    pub(crate) fn start(&mut self, timeout: chrono::Duration) {
        let now = Utc::now();
        self.status = InvocationStatus::Executing;
        self.started_at = Some(now);
        let deadline = now.checked_add_signed(timeout).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.headers.deadline_ms = Some(deadline.timestamp_millis());
    }

    pub(crate) fn complete(&mut self, outcome: InvocationOutcome) {
        self.status = outcome.status();
        self.outcome = Some(outcome);
        self.completed_at = Some(Utc::now());
    }

    pub fn trace_id(&self) -> &str {
        self.headers.trace_id.as_deref().unwrap_or_default()
    }

    /// A serializable view of the record for inspection.
    pub fn summary(&self) -> InvocationSummary {
        let (output, error) = match &self.outcome {
            Some(InvocationOutcome::Succeeded(output)) => (Some(String::from_utf8_lossy(output).into_owned()), None),
            Some(InvocationOutcome::Failed(detail)) => (None, Some(detail.clone())),
            None => (None, None),
        };

        InvocationSummary {
            id: self.id.clone(),
            status: self.status,
            input: String::from_utf8_lossy(&self.input).into_owned(),
            headers: self.headers.clone(),
            output,
            error,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationSummary {
    pub id: String,
    pub status: InvocationStatus,
    pub input: String,
    pub headers: InvocationHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Generates an X-Ray trace id: `Root=1-{8 hex digits of epoch secs}-{24 random hex digits}`.
fn generate_trace_id(timestamp: DateTime<Utc>) -> String {
    let random = format!("{:032x}", Uuid::new_v4().as_u128());
    format!(
        "Root=1-{:08x}-{};Parent={};Sampled=0",
        timestamp.timestamp() as u32,
        &random[..24],
        &random[16..32]
    )
}
