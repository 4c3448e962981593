use super::lambda_error::read_error;
use super::{json_response, HttpResponse};
use crate::store::FunctionStore;
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde_json::json;
use tracing::error;

/// Records an initialization error. The function accepts no more work until the emulator restarts.
/// See https://docs.aws.amazon.com/lambda/latest/dg/runtimes-api.html#runtimes-api-initerror
pub(crate) async fn handler(store: &FunctionStore, req: Request<Incoming>) -> HttpResponse {
    let error = match read_error(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    error!(
        "{}: init error: {}: {}",
        store.name(),
        error.error_type,
        error.error_message
    );
    store.record_init_error(error);

    json_response(StatusCode::ACCEPTED, &json!({"status": "OK"}))
}
