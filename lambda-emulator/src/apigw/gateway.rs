use super::{translator, ApiGatewayMode, ApiGatewayTranslator, GatewayRequest, RouteTable};
use crate::handlers::{full, json_response, log_payload, read_body, HttpResponse};
use crate::invocation::InvocationOutcome;
use crate::invoker::FunctionInvoker;
use crate::server;
use hyper::body::Incoming;
use hyper::{Request, StatusCode};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The HTTP surface of an emulated API: matches routes, translates requests into proxy events
/// and function results back into HTTP responses.
pub struct ApiGateway {
    routes: RouteTable,
    translator: Box<dyn ApiGatewayTranslator>,
    invoker: Arc<dyn FunctionInvoker>,
}

impl ApiGateway {
    pub fn new(mode: ApiGatewayMode, routes: RouteTable, invoker: Arc<dyn FunctionInvoker>) -> Self {
        Self {
            routes,
            translator: translator(mode),
            invoker,
        }
    }

    pub fn mode(&self) -> ApiGatewayMode {
        self.translator.mode()
    }

    async fn handle(&self, req: Request<Incoming>, remote_addr: SocketAddr) -> HttpResponse {
        let path = super::decode_path(req.uri().path());

        let Some(matched) = self.routes.match_route(req.method(), &path) else {
            debug!("No route for {} {path}", req.method());
            return json_response(StatusCode::NOT_FOUND, &json!({"message": "Not Found"}));
        };

        let (parts, body) = req.into_parts();
        let body = match read_body(Request::new(body)).await {
            Ok(v) => v,
            Err(resp) => return resp,
        };

        let function_name = &matched.route.lambda_resource_name;
        info!("{} {path} → {function_name}", parts.method);

        let gateway_request = GatewayRequest::new(Request::from_parts(parts, body), matched.route.path.clone())
            .with_path_parameters(matched.path_parameters)
            .with_source_ip(remote_addr);

        let event = match self.translator.translate_request(&gateway_request) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to translate request: {e}");
                return bad_gateway();
            }
        };

        let payload = match serde_json::to_vec(&event) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize event: {e}");
                return bad_gateway();
            }
        };

        let output = match self.invoker.invoke(function_name, payload.into()).await {
            Ok(InvocationOutcome::Succeeded(v)) => v,
            Ok(InvocationOutcome::Failed(error)) => {
                warn!("{function_name} failed: {}: {}", error.error_type, error.error_message);
                return bad_gateway();
            }
            Err(e) => {
                warn!("Failed to invoke {function_name}: {e}");
                return bad_gateway();
            }
        };

        log_payload("Lambda response", &output);

        match self.translator.translate_response(&output) {
            Ok(response) => response.map(full),
            Err(e) => {
                warn!("{function_name}: {e}");
                bad_gateway()
            }
        }
    }
}

fn bad_gateway() -> HttpResponse {
    json_response(StatusCode::BAD_GATEWAY, &json!({"message": "Internal server error"}))
}

/// Serves the API until `cancel` fires.
pub async fn serve(listener: TcpListener, gateway: Arc<ApiGateway>, cancel: CancellationToken) -> std::io::Result<()> {
    info!("API Gateway ({}) with {} routes", gateway.mode(), gateway.routes.len());
    if gateway.routes.is_empty() {
        warn!("No API Gateway routes are configured, all requests will get 404");
    }

    server::serve(listener, cancel, move |req, remote_addr| {
        let gateway = gateway.clone();
        async move { gateway.handle(req, remote_addr).await }
    })
    .await
}
