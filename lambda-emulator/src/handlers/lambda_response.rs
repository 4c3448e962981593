use super::{json_response, log_payload, read_body, store_error_response, HttpResponse};
use crate::store::FunctionStore;
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde_json::json;

/// Handles the function response for the invocation `id`.
/// See https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html#runtimes-api-response
pub(crate) async fn handler(store: &FunctionStore, id: &str, req: Request<Incoming>) -> HttpResponse {
    let body = match read_body(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    log_payload("Lambda response", &body);

    match store.resolve(id, body) {
        Ok(()) => json_response(StatusCode::ACCEPTED, &json!({"status": "OK"})),
        Err(e) => store_error_response(&e),
    }
}
