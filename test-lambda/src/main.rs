/// This is a basic lambda for testing the emulator locally.
/// It answers direct invocations, HTTP API requests and SQS batches.
use lambda_emulator::{EventSourceKind, HandlerError, HandlerRegistry};
use lambda_runtime::{service_fn, Diagnostic, Error, LambdaEvent};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

#[derive(Deserialize, Debug)]
struct Request {
    command: String,
}

#[derive(Serialize)]
struct Response {
    msg: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HttpRequest {
    route_key: String,
    #[serde(default)]
    body: String,
}

#[derive(Deserialize, Debug)]
struct SqsEvent {
    #[serde(rename = "Records")]
    records: Vec<SqsRecord>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SqsRecord {
    message_id: String,
    body: String,
}

/// Reports the handler's own error type, e.g. `CommandFailed`, instead of a Rust type name.
#[derive(Debug)]
struct FunctionFailure(HandlerError);

impl<'a> From<FunctionFailure> for Diagnostic<'a> {
    fn from(failure: FunctionFailure) -> Self {
        let detail = failure.0.to_error_detail();
        Diagnostic {
            error_type: detail.error_type.into(),
            error_message: detail.error_message.into(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // minimal logging to keep it simple
    // intended to run locally only
    tracing_subscriber::fmt()
        .without_time()
        .with_ansi(true) // the color codes work in the terminal only
        .with_target(false)
        .init();

    let registry = Arc::new(handlers());

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let registry = registry.clone();
        async move {
            info!(
                "Handler invoked: {} with trace {:?}",
                event.context.request_id, event.context.xray_trace_id
            );
            registry.dispatch(event.payload).await.map_err(FunctionFailure)
        }
    }))
    .await
}

fn handlers() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    registry.register(EventSourceKind::Direct, |request: Request| async move {
        info!("Command received: {}", request.command);

        if request.command == "fail" {
            return Err(HandlerError::function("CommandFailed", "failed on request"));
        }

        Ok(Response {
            msg: "Hello from Rust!".to_string(),
        })
    });

    registry.register(EventSourceKind::HttpApiV2, |request: HttpRequest| async move {
        info!("HTTP request: {}", request.route_key);

        Ok::<_, HandlerError>(json!({
            "statusCode": 200,
            "headers": {"content-type": "application/json"},
            "body": json!({"route": request.route_key, "echo": request.body}).to_string(),
        }))
    });

    // messages with "fail" in the body are reported back as failed
    registry.register(EventSourceKind::Sqs, |event: SqsEvent| async move {
        let failures: Vec<Value> = event
            .records
            .iter()
            .filter(|record| record.body.contains("fail"))
            .map(|record| json!({"itemIdentifier": record.message_id}))
            .collect();

        info!("{} messages, {} failed", event.records.len(), failures.len());

        Ok::<_, HandlerError>(json!({ "batchItemFailures": failures }))
    });

    registry
}
