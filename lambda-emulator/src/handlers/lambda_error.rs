use super::{json_response, read_body, store_error_response, HttpResponse};
use crate::invocation::ErrorDetail;
use crate::store::FunctionStore;
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde_json::json;
use tracing::info;

/// The header runtime clients use to classify an error when the body is not the usual JSON.
pub(crate) const ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";

/// Handles invocation errors reported by the runtime client.
/// See https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html#runtimes-api-invokeerror
pub(crate) async fn handler(store: &FunctionStore, id: &str, req: Request<Incoming>) -> HttpResponse {
    let error = match read_error(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    info!("Lambda error: {}: {}", error.error_type, error.error_message);

    match store.reject(id, error) {
        Ok(()) => json_response(StatusCode::ACCEPTED, &json!({"status": "OK"})),
        Err(e) => store_error_response(&e),
    }
}

/// Reads an error posted by the runtime client, init or invocation.
pub(crate) async fn read_error(req: Request<Incoming>) -> Result<ErrorDetail, HttpResponse> {
    let header_type = req
        .headers()
        .get(ERROR_TYPE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let body = read_body(req).await?;

    Ok(ErrorDetail::from_body(&body, header_type.as_deref()))
}
