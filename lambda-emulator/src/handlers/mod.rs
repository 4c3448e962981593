use crate::error::StoreError;
use crate::invocation::ErrorDetail;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

pub(crate) mod init_error;
pub(crate) mod inspect;
pub(crate) mod invoke;
pub(crate) mod lambda_error;
pub(crate) mod lambda_response;
pub(crate) mod next_invocation;

/// The response type of all emulator endpoints.
pub(crate) type HttpResponse = Response<BoxBody<Bytes, hyper::Error>>;

/// Returns an empty response body.
pub(crate) fn empty() -> BoxBody<Bytes, hyper::Error> {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Returns an response body with contents of `chunk` which can be some type convertible into Bytes, e.g. &str.
pub(crate) fn full<T: Into<Bytes>>(chunk: T) -> BoxBody<Bytes, hyper::Error> {
    Full::new(chunk.into()).map_err(|never| match never {}).boxed()
}

pub(crate) fn response(status: StatusCode, body: BoxBody<Bytes, hyper::Error>) -> HttpResponse {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

/// Adds a header, skipping values that are not valid in HTTP headers.
pub(crate) fn insert_header(response: &mut HttpResponse, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            response.headers_mut().insert(HeaderName::from_static(name), value);
        }
        Err(_) => warn!("Invalid value for header {name}: {value}"),
    }
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let mut response = response(status, full(body));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "ServiceException", &e.to_string()),
    }
}

/// A JSON error in the shape the Runtime API uses, e.g. `{"errorType":"InvalidRequestID","errorMessage":"..."}`.
pub(crate) fn error_response(status: StatusCode, error_type: &str, message: &str) -> HttpResponse {
    let mut response = response(status, full(ErrorDetail::new(error_type, message).to_json()));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Maps store protocol errors to client errors.
pub(crate) fn store_error_response(error: &StoreError) -> HttpResponse {
    warn!("{error}");
    match error {
        StoreError::UnknownInvocation(_) => {
            error_response(StatusCode::BAD_REQUEST, "InvalidRequestID", &error.to_string())
        }
        StoreError::NotActive { .. } => {
            error_response(StatusCode::FORBIDDEN, "InvalidStateTransition", &error.to_string())
        }
        StoreError::InitFailed(_) => {
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Runtime.InitError", &error.to_string())
        }
    }
}

pub(crate) fn not_found(req_path: &str) -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "NotFound", &format!("No route for {req_path}"))
}

/// Reads the whole request body.
pub(crate) async fn read_body(req: Request<Incoming>) -> Result<Bytes, HttpResponse> {
    match req.into_body().collect().await {
        Ok(v) => Ok(v.to_bytes()),
        Err(e) => {
            warn!("Failed to read request body: {:?}", e);
            Err(error_response(
                StatusCode::BAD_REQUEST,
                "InvalidRequestContentException",
                &format!("Failed to read request body: {e}"),
            ))
        }
    }
}

/// Logs a payload as text, or as hex if it is not valid UTF-8.
pub(crate) fn log_payload(label: &str, payload: &[u8]) {
    match std::str::from_utf8(payload) {
        Ok(v) => info!("{label}:\n{v}"),
        Err(e) => warn!("{label} is not valid UTF-8. {:?}\n{}", e, hex::encode(payload)),
    }
}
