//! Helpers shared by the integration tests.

#![allow(dead_code)]

use lambda_emulator::apigw::{self, ApiGateway, ApiGatewayMode, RouteConfig, RouteTable};
use lambda_emulator::{runtime_api, StoreInvoker, StoreRegistry, StoreSettings};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A Runtime API server on a random port.
pub struct TestEmulator {
    pub base_url: String,
    /// `host:port`, as in `AWS_LAMBDA_RUNTIME_API`
    pub address: String,
    pub registry: StoreRegistry,
    pub cancel: CancellationToken,
}

impl TestEmulator {
    pub async fn start() -> Self {
        Self::start_with(StoreSettings::default()).await
    }

    pub async fn start_with(settings: StoreSettings) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let registry = StoreRegistry::new(settings);
        let cancel = CancellationToken::new();

        tokio::spawn(runtime_api::serve(listener, registry.clone(), cancel.clone()));

        Self {
            base_url: format!("http://{address}"),
            address,
            registry,
            cancel,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestEmulator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Starts an API Gateway over `registry` and returns its base URL.
pub async fn start_gateway(
    mode: ApiGatewayMode,
    routes: Vec<RouteConfig>,
    registry: StoreRegistry,
    cancel: CancellationToken,
) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let gateway = ApiGateway::new(
        mode,
        RouteTable::new(routes).unwrap(),
        Arc::new(StoreInvoker::new(registry)),
    );

    tokio::spawn(apigw::serve(listener, Arc::new(gateway), cancel));

    format!("http://{address}")
}

pub fn route(function: &str, method: &str, path: &str) -> RouteConfig {
    RouteConfig {
        lambda_resource_name: function.to_owned(),
        http_method: method.to_owned(),
        path: path.to_owned(),
    }
}
