//! Ways for event sources to invoke a function and wait for its outcome.

use crate::error::InvokeError;
use crate::handlers::invoke::{FUNCTION_ERROR_HEADER, INVOCATION_TYPE_HEADER};
use crate::invocation::{ErrorDetail, InvocationHeaders, InvocationOutcome};
use crate::store::StoreRegistry;
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::Request;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use tracing::debug;

/// Invokes a function synchronously: returns once the function has produced an output or an error.
#[async_trait]
pub trait FunctionInvoker: Send + Sync {
    async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<InvocationOutcome, InvokeError>;
}

/// Invokes functions through the stores of this process.
#[derive(Clone)]
pub struct StoreInvoker {
    registry: StoreRegistry,
}

impl StoreInvoker {
    pub fn new(registry: StoreRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl FunctionInvoker for StoreInvoker {
    async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<InvocationOutcome, InvokeError> {
        let store = self.registry.get_or_create(function_name);
        Ok(store.invoke(payload, InvocationHeaders::default()).await?)
    }
}

/// Invokes functions through the Invoke API of an emulator running elsewhere.
pub struct HttpInvoker {
    /// E.g. `http://127.0.0.1:9001`
    endpoint: String,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpInvoker {
    /// `endpoint` is `host:port` as in `AWS_LAMBDA_RUNTIME_API`, with or without the scheme.
    pub fn new(endpoint: &str) -> Self {
        let endpoint = endpoint.trim_end_matches('/');
        let endpoint = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_owned()
        } else {
            format!("http://{endpoint}")
        };

        Self {
            endpoint,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FunctionInvoker for HttpInvoker {
    async fn invoke(&self, function_name: &str, payload: Bytes) -> Result<InvocationOutcome, InvokeError> {
        let uri = format!(
            "{}/2015-03-31/functions/{}/invocations",
            self.endpoint,
            urlencoding::encode(function_name)
        );
        debug!("Invoking {uri}");

        let req = Request::post(uri)
            .header(INVOCATION_TYPE_HEADER, "RequestResponse")
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))
            .map_err(|e| InvokeError::Http(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| InvokeError::Http(e.to_string()))?;

        let status = resp.status();
        let function_error = resp
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| InvokeError::Http(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        match function_error {
            Some(error_type) => Ok(InvocationOutcome::Failed(ErrorDetail::from_body(
                &body,
                Some(error_type.as_str()),
            ))),
            None => Ok(InvocationOutcome::Succeeded(body)),
        }
    }
}
