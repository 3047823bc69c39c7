//! Accept loop shared by the gateway and limiter servers

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use opentelemetry::metrics::UpDownCounter;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::config::TimeoutConfig;
use crate::error::{Result, TollgateError};
use crate::response::RespBody;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// Decrements the active connection counter when the connection task ends
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    connections_active: Option<UpDownCounter<i64>>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>, connections_active: Option<UpDownCounter<i64>>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(ref c) = connections_active {
            c.add(1, &[]);
        }
        Self { counter, connections_active }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
        if let Some(ref c) = self.connections_active {
            c.add(-1, &[]);
        }
    }
}

/// Drive a connection future, giving up after `timeout_duration`
pub async fn serve_with_timeout<F, E>(
    serve_fut: F,
    timeout_duration: Duration,
    metrics: Option<Arc<Metrics>>,
    peer: SocketAddr,
) where
    F: Future<Output = std::result::Result<(), E>>,
    E: std::fmt::Display,
{
    match tokio::time::timeout(timeout_duration, serve_fut).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(?peer, error = %e, "serve_connection error");
        }
        Err(_) => {
            warn!(?peer, "connection handling timeout");
            if let Some(ref m) = metrics {
                m.record_timeout(values::TIMEOUT_CONNECTION_HANDLING);
            }
        }
    }
}

/// Resolves on the first SIGTERM or SIGINT
pub async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        TollgateError::Io(std::io::Error::other(format!("Failed to setup SIGTERM handler: {e}")))
    })?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt()).map_err(|e| {
        TollgateError::Io(std::io::Error::other(format!("Failed to setup SIGINT handler: {e}")))
    })?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
    }
    Ok(())
}

/// Accept connections on `listener` until `shutdown` resolves, then ask every
/// open connection to finish and wait up to `timeout.shutdown_secs` for them.
///
/// Idle keep-alive connections close right away; in-flight requests complete.
///
/// Every request is handed to `handler` together with the peer address.
pub async fn serve<H, Fut, S>(
    listener: TcpListener,
    timeout: &TimeoutConfig,
    metrics: Option<Arc<Metrics>>,
    shutdown: S,
    handler: H,
) -> Result<()>
where
    H: Fn(Request<Incoming>, SocketAddr) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Response<RespBody>> + Send + 'static,
    S: Future<Output = ()>,
{
    let builder = ConnBuilder::new(TokioExecutor::new());
    let active_connections = Arc::new(AtomicUsize::new(0));
    let connection_timeout = Duration::from_secs(timeout.connection_handling_secs);
    let graceful = GracefulShutdown::new();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "accept error");
                        continue;
                    }
                };

                if let Some(ref m) = metrics {
                    m.connections_total.add(1, &[]);
                }
                let guard = ConnectionGuard::new(
                    Arc::clone(&active_connections),
                    metrics.as_ref().map(|m| m.connections_active.clone()),
                );

                let handler = handler.clone();
                let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                    let fut = handler(req, peer);
                    async move { Ok::<_, Infallible>(fut.await) }
                });
                let conn = graceful.watch(
                    builder.serve_connection(TokioIo::new(stream), svc).into_owned(),
                );
                let metrics = metrics.clone();

                tokio::spawn(async move {
                    let _guard = guard;
                    serve_with_timeout(conn, connection_timeout, metrics, peer).await;
                });
            }
        }
    }

    info!(
        "Waiting for active connections to finish (timeout: {}s)",
        timeout.shutdown_secs
    );
    tokio::select! {
        _ = graceful.shutdown() => {
            info!("All connections closed, shutdown complete");
        }
        _ = sleep(Duration::from_secs(timeout.shutdown_secs)) => {
            let active = active_connections.load(Ordering::Relaxed);
            warn!(
                active_connections = active,
                "Shutdown timeout reached, {} connections still active", active
            );
        }
    }

    Ok(())
}
