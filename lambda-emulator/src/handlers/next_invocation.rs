use super::{error_response, full, insert_header, log_payload, response, HttpResponse};
use crate::error::StoreError;
use crate::store::FunctionStore;
use hyper::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};

/// Handles _next invocation_ request from the runtime client.
/// It blocks until there is a queued invocation for the function and no other one is executing.
/// See https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html#runtimes-api-next
pub(crate) async fn handler(store: &FunctionStore, cancel: &CancellationToken) -> HttpResponse {
    let record = match store.dequeue_next(cancel).await {
        Ok(Some(v)) => v,
        Ok(None) => {
            info!("{}: shutting down, no more invocations", store.name());
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "ServiceUnavailable", "The emulator is shutting down");
        }
        Err(StoreError::InitFailed(message)) => {
            warn!("{}: refusing to hand out work after init failure", store.name());
            let init_error = store.init_error().map(|v| v.to_json()).unwrap_or(message);
            return response(StatusCode::INTERNAL_SERVER_ERROR, full(init_error));
        }
        Err(e) => {
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "ServiceException", &e.to_string());
        }
    };

    let span = info_span!("invocation", function = store.name(), request_id = %record.id, trace_id = record.trace_id());
    let _enter = span.enter();
    log_payload("Lambda request", &record.input);

    let mut resp = response(StatusCode::OK, full(record.input.clone()));
    insert_header(&mut resp, "lambda-runtime-aws-request-id", &record.id);
    if let Some(deadline) = record.headers.deadline_ms {
        insert_header(&mut resp, "lambda-runtime-deadline-ms", &deadline.to_string());
    }
    insert_header(
        &mut resp,
        "lambda-runtime-invoked-function-arn",
        record
            .headers
            .invoked_function_arn
            .as_deref()
            .unwrap_or(store.function_arn()),
    );
    insert_header(&mut resp, "lambda-runtime-trace-id", record.trace_id());
    if let Some(client_context) = &record.headers.client_context {
        insert_header(&mut resp, "lambda-runtime-client-context", client_context);
    }
    if let Some(cognito_identity) = &record.headers.cognito_identity {
        insert_header(&mut resp, "lambda-runtime-cognito-identity", cognito_identity);
    }

    resp
}
