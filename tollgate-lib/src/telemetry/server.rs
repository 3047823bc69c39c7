use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hyper::{Request, Response, StatusCode};
use prometheus::Registry;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::TimeoutConfig;
use crate::error::Result;
use crate::response::{error_response, RespBody};
use crate::server::serve;
use crate::telemetry::{
    handle_metrics, health_check_response, live_check_response, ready_check_response,
};

/// Route an observability request
pub fn observability_response<B>(
    req: &Request<B>,
    registry: &Registry,
    ready: &AtomicBool,
) -> Response<RespBody> {
    match req.uri().path() {
        "/health" => health_check_response(),
        "/ready" => ready_check_response(ready.load(Ordering::Relaxed)),
        "/live" => live_check_response(),
        "/metrics" => match handle_metrics(registry) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "failed to render metrics");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        },
        _ => error_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Start the observability server that handles metrics and health checks
/// This server runs on a dedicated port and serves:
/// - `/metrics` - Prometheus metrics
/// - `/health` - Health check endpoint
/// - `/ready` - Readiness check endpoint
/// - `/live` - Liveness check endpoint
pub async fn start_observability_server<S>(
    port: u16,
    registry: Registry,
    ready: Arc<AtomicBool>,
    timeout: TimeoutConfig,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "Observability server started (metrics + health checks)");

    serve(listener, &timeout, None, shutdown, move |req, _peer| {
        let resp = observability_response(&req, &registry, &ready);
        async move { resp }
    })
    .await
}
