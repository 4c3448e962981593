use lambda_emulator::apigw::{self, ApiGateway, RouteTable};
use lambda_emulator::sqs::SqsPoller;
use lambda_emulator::{runtime_api, Config, StoreInvoker, StoreRegistry};
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_tracing();

    let config = Config::from_env()?;
    config.log_summary();

    let registry = StoreRegistry::new(config.store.clone());
    let cancel = CancellationToken::new();
    let mut tasks = JoinSet::new();

    // bind to a TCP port and serve the Runtime API for all functions
    let listener = TcpListener::bind(config.lambda_api_listener).await?;
    tasks.spawn(runtime_api::serve(listener, registry.clone(), cancel.clone()));

    if let Some(api_gateway) = &config.api_gateway {
        let gateway = ApiGateway::new(
            api_gateway.mode,
            RouteTable::new(api_gateway.routes.clone())?,
            Arc::new(StoreInvoker::new(registry.clone())),
        );
        let listener = TcpListener::bind(api_gateway.listener).await?;
        tasks.spawn(apigw::serve(listener, Arc::new(gateway), cancel.clone()));
    }

    for sqs in &config.sqs_pollers {
        let poller = SqsPoller::from_config(sqs.clone(), registry.clone()).await;
        let cancel = cancel.clone();
        tasks.spawn(async move {
            poller.run(cancel).await;
            Ok(())
        });
    }

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutting down");
        }
        Some(res) = tasks.join_next() => {
            error!("A server stopped unexpectedly: {res:?}");
        }
    }

    cancel.cancel();
    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Server error: {e}"),
            Err(e) => error!("Task failed: {e}"),
        }
    }

    Ok(())
}

/// Initializes the tracing from RUST_LOG env var if present or sets minimal logging:
/// - INFO for the emulator
/// - ERROR for everything else
fn init_tracing() {
    // find out the name of the binary to set the default logging filter
    let binary_name = std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().to_string()))
        .unwrap_or_else(|| env!("CARGO_CRATE_NAME").to_owned())
        // this replace is needed because tracing uses target names with underscores, e.g. `cargo_lambda_emulator`
        .replace('-', "_");

    // the emulator logs from the library crate
    let directives = [binary_name.as_str(), "lambda_emulator"]
        .iter()
        .filter_map(|target| Directive::from_str(&format!("{target}=info")).ok())
        .collect::<Vec<_>>();

    let mut filter = EnvFilter::builder().from_env_lossy();
    if std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
        for directive in directives {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .init();
}
