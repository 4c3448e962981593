//! The Lambda Runtime API, plus the Invoke API and inspection endpoints, on one listener.
//!
//! Runtime API paths may be prefixed with `/<function-name>` so that several runtime clients
//! can share the emulator, e.g. `AWS_LAMBDA_RUNTIME_API=127.0.0.1:9001/my-fn`.
//! Without the prefix the requests go to [`DEFAULT_FUNCTION_NAME`].

use crate::handlers::{self, HttpResponse};
use crate::server;
use crate::store::{StoreRegistry, DEFAULT_FUNCTION_NAME};
use hyper::body::Incoming;
use hyper::{Method, Request};
use regex::Regex;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::debug;

static RUNTIME_REGEX: OnceLock<Regex> = OnceLock::new();
static INVOKE_REGEX: OnceLock<Regex> = OnceLock::new();
static INSPECT_REGEX: OnceLock<Regex> = OnceLock::new();

/// A parsed request path.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Next { function: String },
    Response { function: String, id: String },
    Error { function: String, id: String },
    InitError { function: String },
    Invoke { function: String },
    ListFunctions,
    Snapshot { function: String },
    ClearQueued { function: String },
    ClearExecuted { function: String },
    Requeue { function: String, id: String },
    NotFound,
}

/// Serves the Runtime API for all functions in `registry` until `cancel` fires.
/// Pending `/next` long polls are released on cancellation.
pub async fn serve(listener: TcpListener, registry: StoreRegistry, cancel: CancellationToken) -> std::io::Result<()> {
    let handler_cancel = cancel.clone();
    server::serve(listener, cancel, move |req, _remote_addr| {
        let registry = registry.clone();
        let cancel = handler_cancel.clone();
        async move { handle(req, &registry, &cancel).await }
    })
    .await
}

async fn handle(req: Request<Incoming>, registry: &StoreRegistry, cancel: &CancellationToken) -> HttpResponse {
    debug!("Request: {} {:?}", req.method(), req.uri());

    match route(req.method(), req.uri().path()) {
        Route::Next { function } => {
            handlers::next_invocation::handler(&registry.get_or_create(&function), cancel).await
        }
        Route::Response { function, id } => {
            handlers::lambda_response::handler(&registry.get_or_create(&function), &id, req).await
        }
        Route::Error { function, id } => {
            handlers::lambda_error::handler(&registry.get_or_create(&function), &id, req).await
        }
        Route::InitError { function } => handlers::init_error::handler(&registry.get_or_create(&function), req).await,
        Route::Invoke { function } => handlers::invoke::handler(&registry.get_or_create(&function), req).await,
        Route::ListFunctions => handlers::inspect::list_functions(registry),
        Route::Snapshot { function } => handlers::inspect::snapshot(registry, &function),
        Route::ClearQueued { function } => handlers::inspect::clear_queued(registry, &function),
        Route::ClearExecuted { function } => handlers::inspect::clear_executed(registry, &function),
        Route::Requeue { function, id } => handlers::inspect::requeue(registry, &function, &id),
        Route::NotFound => handlers::not_found(req.uri().path()),
    }
}

fn route(method: &Method, path: &str) -> Route {
    let runtime_regex = RUNTIME_REGEX.get_or_init(|| {
        Regex::new(r"^(?:/([^/]+))?/2018-06-01/runtime/(invocation/next|invocation/([^/]+)/(response|error)|init/error)$")
            .expect("Invalid runtime URL regex. It's a bug.")
    });

    if let Some(captures) = runtime_regex.captures(path) {
        let function = captures
            .get(1)
            .map_or_else(|| DEFAULT_FUNCTION_NAME.to_owned(), |v| function_name(v.as_str()));
        let id = captures.get(3).map(|v| v.as_str().to_owned());

        return match (method, captures.get(4).map(|v| v.as_str()), id) {
            (&Method::GET, None, None) if path.ends_with("/invocation/next") => Route::Next { function },
            (&Method::POST, Some("response"), Some(id)) => Route::Response { function, id },
            (&Method::POST, Some("error"), Some(id)) => Route::Error { function, id },
            (&Method::POST, None, None) if path.ends_with("/init/error") => Route::InitError { function },
            _ => Route::NotFound,
        };
    }

    let invoke_regex = INVOKE_REGEX.get_or_init(|| {
        Regex::new(r"^(?:/[^/]+)?/2015-03-31/functions/([^/]+)/invocations$")
            .expect("Invalid invoke URL regex. It's a bug.")
    });

    if let Some(captures) = invoke_regex.captures(path) {
        return match (method, captures.get(1)) {
            (&Method::POST, Some(name)) => Route::Invoke {
                function: function_name(name.as_str()),
            },
            _ => Route::NotFound,
        };
    }

    let inspect_regex = INSPECT_REGEX.get_or_init(|| {
        Regex::new(r"^/_emulator/functions(?:/([^/]+)(?:/(queued|executed|requeue/([^/]+)))?)?/?$")
            .expect("Invalid inspection URL regex. It's a bug.")
    });

    if let Some(captures) = inspect_regex.captures(path) {
        let function = captures.get(1).map(|v| function_name(v.as_str()));
        let action = captures.get(2).map(|v| v.as_str());
        let id = captures.get(3).map(|v| v.as_str().to_owned());

        return match (method, function, action, id) {
            (&Method::GET, None, None, None) => Route::ListFunctions,
            (&Method::GET, Some(function), None, None) => Route::Snapshot { function },
            (&Method::DELETE, Some(function), Some("queued"), None) => Route::ClearQueued { function },
            (&Method::DELETE, Some(function), Some("executed"), None) => Route::ClearExecuted { function },
            (&Method::POST, Some(function), Some(_), Some(id)) => Route::Requeue { function, id },
            _ => Route::NotFound,
        };
    }

    Route::NotFound
}

/// Decodes a function name from a path segment. ARNs are reduced to the function name,
/// e.g. `arn:aws:lambda:us-east-1:123456789012:function:my-fn` → `my-fn`.
pub(crate) fn function_name(segment: &str) -> String {
    let decoded = urlencoding::decode(segment).map_or_else(|_| segment.to_owned(), |v| v.into_owned());

    if decoded.starts_with("arn:") {
        if let Some(name) = decoded.split(':').nth(6) {
            return name.to_owned();
        }
    }

    decoded
}
