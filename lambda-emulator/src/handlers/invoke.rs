use super::{empty, error_response, full, insert_header, read_body, response, HttpResponse};
use crate::error::StoreError;
use crate::invocation::{InvocationHeaders, InvocationOutcome};
use crate::store::FunctionStore;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, StatusCode};
use tracing::{debug, info};

pub(crate) const INVOCATION_TYPE_HEADER: &str = "x-amz-invocation-type";
pub(crate) const FUNCTION_ERROR_HEADER: &str = "x-amz-function-error";
const CLIENT_CONTEXT_HEADER: &str = "x-amz-client-context";
const TRACE_ID_HEADER: &str = "x-amzn-trace-id";

/// Handles the Lambda Invoke API for one function.
/// See https://docs.aws.amazon.com/lambda/latest/api/API_Invoke.html
pub(crate) async fn handler(store: &FunctionStore, req: Request<Incoming>) -> HttpResponse {
    let invocation_type = header_str(&req, INVOCATION_TYPE_HEADER)
        .unwrap_or("RequestResponse")
        .to_owned();

    let headers = match invocation_headers(&req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let payload = match read_body(req).await {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    debug!("{}: {invocation_type} invocation", store.name());

    match invocation_type.as_str() {
        "DryRun" => response(StatusCode::NO_CONTENT, empty()),
        "Event" => {
            if let Some(init_error) = store.init_error() {
                return init_failed(&init_error.to_json());
            }
            let id = store.enqueue(payload, headers);
            info!("{}: queued async invocation {id}", store.name());
            response(StatusCode::ACCEPTED, empty())
        }
        "RequestResponse" => match store.invoke(payload, headers).await {
            Ok(InvocationOutcome::Succeeded(output)) => {
                let mut resp = response(StatusCode::OK, full(output));
                resp.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                insert_header(&mut resp, "x-amz-executed-version", "$LATEST");
                resp
            }
            Ok(InvocationOutcome::Failed(error)) => {
                let mut resp = response(StatusCode::OK, full(error.to_json()));
                resp.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                insert_header(&mut resp, FUNCTION_ERROR_HEADER, "Unhandled");
                insert_header(&mut resp, "x-amz-executed-version", "$LATEST");
                resp
            }
            Err(StoreError::InitFailed(_)) => {
                let body = store.init_error().map(|v| v.to_json()).unwrap_or_default();
                init_failed(&body)
            }
            Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "ServiceException", &e.to_string()),
        },
        other => error_response(
            StatusCode::BAD_REQUEST,
            "InvalidParameterValueException",
            &format!("Unsupported invocation type: {other}"),
        ),
    }
}

fn init_failed(body: &str) -> HttpResponse {
    let mut resp = response(StatusCode::BAD_GATEWAY, full(body.to_owned()));
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    insert_header(&mut resp, FUNCTION_ERROR_HEADER, "Unhandled");
    resp
}

fn header_str<'a>(req: &'a Request<Incoming>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Extracts the trace id and the client context, which arrives base64-encoded.
fn invocation_headers(req: &Request<Incoming>) -> Result<InvocationHeaders, HttpResponse> {
    let mut headers = InvocationHeaders::default();

    if let Some(trace_id) = header_str(req, TRACE_ID_HEADER) {
        headers = headers.with_trace_id(trace_id);
    }

    if let Some(client_context) = header_str(req, CLIENT_CONTEXT_HEADER) {
        let decoded = BASE64
            .decode(client_context)
            .ok()
            .and_then(|v| String::from_utf8(v).ok());

        match decoded {
            Some(v) => headers = headers.with_client_context(v),
            None => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    "InvalidRequestContentException",
                    "X-Amz-Client-Context must be base64-encoded UTF-8",
                ))
            }
        }
    }

    Ok(headers)
}
