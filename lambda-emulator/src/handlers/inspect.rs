//! Read and housekeeping endpoints used by UIs and tests to look inside the stores.

use super::{error_response, json_response, store_error_response, HttpResponse};
use crate::store::{FunctionStore, StoreRegistry};
use hyper::StatusCode;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// `GET /_emulator/functions`
pub(crate) fn list_functions(registry: &StoreRegistry) -> HttpResponse {
    json_response(StatusCode::OK, &registry.function_names())
}

/// `GET /_emulator/functions/{name}`
pub(crate) fn snapshot(registry: &StoreRegistry, name: &str) -> HttpResponse {
    match lookup(registry, name) {
        Ok(store) => json_response(StatusCode::OK, &store.snapshot()),
        Err(resp) => resp,
    }
}

/// `DELETE /_emulator/functions/{name}/queued`
pub(crate) fn clear_queued(registry: &StoreRegistry, name: &str) -> HttpResponse {
    match lookup(registry, name) {
        Ok(store) => {
            let cleared = store.clear_queued();
            info!("{name}: cleared {cleared} queued invocations");
            json_response(StatusCode::OK, &json!({ "cleared": cleared }))
        }
        Err(resp) => resp,
    }
}

/// `DELETE /_emulator/functions/{name}/executed`
pub(crate) fn clear_executed(registry: &StoreRegistry, name: &str) -> HttpResponse {
    match lookup(registry, name) {
        Ok(store) => {
            let cleared = store.clear_executed();
            info!("{name}: cleared {cleared} executed invocations");
            json_response(StatusCode::OK, &json!({ "cleared": cleared }))
        }
        Err(resp) => resp,
    }
}

/// `POST /_emulator/functions/{name}/requeue/{id}`
pub(crate) fn requeue(registry: &StoreRegistry, name: &str, id: &str) -> HttpResponse {
    let store = match lookup(registry, name) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match store.requeue(id) {
        Ok(new_id) => {
            info!("{name}: requeued {id} as {new_id}");
            json_response(StatusCode::ACCEPTED, &json!({ "id": new_id }))
        }
        Err(e) => store_error_response(&e),
    }
}

fn lookup(registry: &StoreRegistry, name: &str) -> Result<Arc<FunctionStore>, HttpResponse> {
    registry.get(name).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "ResourceNotFoundException",
            &format!("Function not found: {name}"),
        )
    })
}
