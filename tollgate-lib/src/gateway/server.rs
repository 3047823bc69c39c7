use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::{GatewayConfig, TimeoutConfig};
use crate::error::Result;
use crate::gateway::pipeline::GatewayPipeline;
use crate::server::serve;
use crate::telemetry::Metrics;

/// Build the pipeline, bind `config.listen` and serve until `shutdown`
///
/// `ready` is raised once the listener is bound.
pub async fn run_gateway<S>(
    config: Arc<GatewayConfig>,
    metrics: Option<Arc<Metrics>>,
    ready: Arc<AtomicBool>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let pipeline = Arc::new(GatewayPipeline::from_config(&config, metrics.clone())?);
    for route in pipeline.routes() {
        info!(
            route = %route.id,
            prefix = %route.prefix,
            upstream = route.upstream.as_str(),
            filters = ?route.filter_names(),
            "route configured"
        );
    }

    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = ?config.listen, "starting gateway");
    ready.store(true, Ordering::Relaxed);

    serve_gateway(listener, pipeline, &config.timeout, metrics, shutdown).await
}

/// Serve an already built pipeline on an already bound listener
pub async fn serve_gateway<S>(
    listener: TcpListener,
    pipeline: Arc<GatewayPipeline>,
    timeout: &TimeoutConfig,
    metrics: Option<Arc<Metrics>>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    serve(listener, timeout, metrics, shutdown, move |req, peer| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.handle(req, peer).await }
    })
    .await?;
    info!("Gateway stopped");
    Ok(())
}
