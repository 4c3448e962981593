//! A local emulator of the AWS Lambda invocation environment.
//!
//! Runtime clients connect to the Runtime API and take invocations from per-function
//! [`store::FunctionStore`]s. Invocations come from the Invoke API, an emulated API Gateway
//! or SQS pollers.

pub mod apigw;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod invocation;
pub mod invoker;
pub mod runtime_api;
pub mod sqs;
pub mod store;

mod handlers;
mod server;

pub use config::Config;
pub use dispatch::{current_trace_id, EventSourceKind, HandlerRegistry, LocalRuntime};
pub use error::{ConfigError, HandlerError, InvokeError, PollError, QueueError, StoreError, TranslateError};
pub use invocation::{ErrorDetail, InvocationHeaders, InvocationOutcome, InvocationRecord, InvocationStatus};
pub use invoker::{FunctionInvoker, HttpInvoker, StoreInvoker};
pub use store::{FunctionStore, StoreRegistry, StoreSettings, DEFAULT_FUNCTION_NAME};
