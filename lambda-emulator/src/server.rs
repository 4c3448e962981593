use crate::handlers::HttpResponse;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts connections on `listener` and serves each of them with `handler` in its own task
/// until `cancel` fires.
///
/// The handler gets the address of the remote end along with the request.
pub(crate) async fn serve<F, Fut>(listener: TcpListener, cancel: CancellationToken, handler: F) -> std::io::Result<()>
where
    F: Fn(Request<Incoming>, SocketAddr) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HttpResponse> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!("Listening on http://{local_addr}");

    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Stopped listening on http://{local_addr}");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(e) => {
                    // e.g. too many open files, the listener itself is still fine
                    warn!("Failed to accept a connection on {local_addr}: {e}");
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let handler = handler.clone();

        // Spawn a tokio task to serve multiple connections concurrently
        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let handler = handler.clone();
                async move { Ok::<_, Infallible>(handler(req, remote_addr).await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection from {remote_addr} closed with error: {err:?}");
            }
        });
    }
}
