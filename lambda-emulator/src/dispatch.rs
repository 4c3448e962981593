//! Function-side handler resolution.
//!
//! A [`HandlerRegistry`] maps event source kinds to typed handlers. It can be driven by
//! [`LocalRuntime`] inside the emulator process, or wired into `lambda_runtime` by a real function.

use crate::error::{HandlerError, StoreError};
use crate::store::FunctionStore;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

tokio::task_local! {
    static TRACE_ID: String;
}

/// The X-Ray trace id of the invocation being handled by [`LocalRuntime`] on this task.
pub fn current_trace_id() -> Option<String> {
    TRACE_ID.try_with(Clone::clone).ok()
}

/// The upstream system an event payload came from, detected from its shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSourceKind {
    Sqs,
    HttpApiV2,
    HttpApiV1,
    ApiGatewayRest,
    /// Anything else, e.g. a direct invocation with a custom payload
    Direct,
}

impl EventSourceKind {
    pub fn detect(payload: &Value) -> Self {
        let Some(object) = payload.as_object() else {
            return Self::Direct;
        };

        let is_sqs = object
            .get("Records")
            .and_then(Value::as_array)
            .and_then(|records| records.first())
            .and_then(|record| record.get("eventSource"))
            .and_then(Value::as_str)
            == Some("aws:sqs");
        if is_sqs {
            return Self::Sqs;
        }

        let version = object.get("version").and_then(Value::as_str);
        match version {
            Some("2.0") if object.contains_key("routeKey") => Self::HttpApiV2,
            Some("1.0") if object.contains_key("httpMethod") => Self::HttpApiV1,
            _ if object.contains_key("httpMethod") && object.contains_key("resource") => Self::ApiGatewayRest,
            _ => Self::Direct,
        }
    }
}

impl fmt::Display for EventSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Sqs => "SQS",
            Self::HttpApiV2 => "HTTP API v2",
            Self::HttpApiV1 => "HTTP API v1",
            Self::ApiGatewayRest => "API Gateway REST",
            Self::Direct => "direct",
        };
        f.write_str(s)
    }
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;
type BoxedHandler = Arc<dyn Fn(Value) -> HandlerFuture + Send + Sync>;

/// Typed handlers keyed by event source kind.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<EventSourceKind, BoxedHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for events of `kind`, replacing any previous one.
    /// The payload is deserialized into `E` and the result serialized from `R`.
    pub fn register<E, R, F, Fut>(&mut self, kind: EventSourceKind, handler: F) -> &mut Self
    where
        E: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(E) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let boxed: BoxedHandler = Arc::new(move |payload: Value| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let event: E = serde_json::from_value(payload)?;
                let response = (*handler)(event).await?;
                Ok(serde_json::to_value(response)?)
            }) as HandlerFuture
        });

        self.handlers.insert(kind, boxed);
        self
    }

    /// Runs the handler for the detected kind of `payload`, falling back to the `Direct` handler.
    pub async fn dispatch(&self, payload: Value) -> Result<Value, HandlerError> {
        let kind = EventSourceKind::detect(&payload);
        let handler = self
            .handlers
            .get(&kind)
            .or_else(|| self.handlers.get(&EventSourceKind::Direct))
            .ok_or_else(|| HandlerError::NoHandler(kind.to_string()))?;

        debug!("Dispatching {kind} event");
        (handler.as_ref())(payload).await
    }

    /// Same as [`Self::dispatch`] for a raw payload. An empty payload is `null`.
    pub async fn dispatch_bytes(&self, payload: &[u8]) -> Result<Value, HandlerError> {
        let payload = if payload.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(payload)?
        };
        self.dispatch(payload).await
    }
}

/// An in-process runtime client: takes invocations from a store and runs them through a registry.
pub struct LocalRuntime {
    store: Arc<FunctionStore>,
    registry: Arc<HandlerRegistry>,
}

impl LocalRuntime {
    pub fn new(store: Arc<FunctionStore>, registry: Arc<HandlerRegistry>) -> Self {
        Self { store, registry }
    }

    /// Handles invocations one at a time until `cancel` fires.
    /// Fails if the function store has recorded an init error.
    pub async fn serve(&self, cancel: CancellationToken) -> Result<(), StoreError> {
        info!("{}: local runtime started", self.store.name());

        while let Some(record) = self.store.dequeue_next(&cancel).await? {
            let result = TRACE_ID
                .scope(record.trace_id().to_owned(), self.registry.dispatch_bytes(&record.input))
                .await;

            let completed = match result {
                Ok(value) => {
                    // a Value always serializes
                    let output = serde_json::to_vec(&value).unwrap_or_default();
                    self.store.resolve(&record.id, output)
                }
                Err(e) => {
                    warn!("{}: invocation {} failed: {e}", self.store.name(), record.id);
                    self.store.reject(&record.id, e.to_error_detail())
                }
            };

            if let Err(e) = completed {
                warn!("{}: {e}", self.store.name());
            }
        }

        info!("{}: local runtime stopped", self.store.name());
        Ok(())
    }
}
