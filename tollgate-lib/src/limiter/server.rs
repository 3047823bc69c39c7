use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http::{Method, StatusCode};
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::{Request, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::LimitsConfig;
use crate::error::Result;
use crate::limiter::policy::CallerClass;
use crate::limiter::protocol::{CheckRequest, CheckResponse, CHECK_PATH};
use crate::limiter::RateLimiterService;
use crate::response::{error_response, json_response, RespBody};
use crate::server::serve;
use crate::telemetry::Metrics;

const ROUTE_LIMITS_PATH: &str = "/api/limits/route";
const FEATURES_PATH: &str = "/api/limits/features";
const HEALTH_PATH: &str = "/actuator/health";

/// Upper bound on a check request body
const MAX_CHECK_BODY_BYTES: usize = 16 * 1024;

/// Shared state of the limiter HTTP service
pub struct LimitsState {
    pub service: RateLimiterService,
    pub config: Arc<LimitsConfig>,
    pub metrics: Option<Arc<Metrics>>,
}

impl LimitsState {
    pub fn new(config: Arc<LimitsConfig>, metrics: Option<Arc<Metrics>>) -> Self {
        Self { service: RateLimiterService::from_config(&config), config, metrics }
    }
}

/// Route a single request to the limiter endpoints
pub async fn handle_limits_request<B>(req: Request<B>, state: Arc<LimitsState>) -> Response<RespBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match (&method, path.as_str()) {
        (&Method::POST, CHECK_PATH) => handle_check(req, &state).await,
        (&Method::GET, ROUTE_LIMITS_PATH) => handle_route_limits(&req, &state),
        (&Method::GET, FEATURES_PATH) => json_response(StatusCode::OK, &state.config.features),
        (&Method::GET, HEALTH_PATH) => json_response(StatusCode::OK, &json!({ "status": "UP" })),
        (_, CHECK_PATH | ROUTE_LIMITS_PATH | FEATURES_PATH | HEALTH_PATH) => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    if state.config.logging.access_log && state.config.logging.should_log(&path) {
        info!(
            method = %method,
            path = %path,
            status = resp.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "access"
        );
    }
    if let Some(ref m) = state.metrics {
        let route = if path == CHECK_PATH { CHECK_PATH } else { "other" };
        m.record_request(method.as_str(), resp.status().as_u16(), route);
        m.record_request_duration(
            method.as_str(),
            resp.status().as_u16(),
            route,
            start.elapsed().as_secs_f64(),
        );
    }

    resp
}

async fn handle_check<B>(req: Request<B>, state: &LimitsState) -> Response<RespBody>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body = match Limited::new(req.into_body(), MAX_CHECK_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "failed to read check request body");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let check: CheckRequest = match serde_json::from_slice(&body) {
        Ok(check) => check,
        Err(e) => {
            warn!(error = %e, "malformed check request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    let result = state.service.check(&check);
    if let Some(ref m) = state.metrics {
        m.record_limiter_decision(CallerClass::of_key(&check.key).as_str(), result.allowed);
    }
    json_response(StatusCode::OK, &CheckResponse::from(result))
}

/// Query string of the route limits endpoint
#[derive(Debug, Deserialize)]
struct RouteQuery {
    path: String,
}

fn handle_route_limits<B>(req: &Request<B>, state: &LimitsState) -> Response<RespBody> {
    match serde_urlencoded::from_str::<RouteQuery>(req.uri().query().unwrap_or("")) {
        Ok(RouteQuery { path }) if !path.is_empty() => {
            json_response(StatusCode::OK, &state.service.route_limits(&path))
        }
        Ok(_) => error_response(StatusCode::BAD_REQUEST, "Missing path parameter"),
        Err(e) => {
            warn!(error = %e, "malformed route limits query");
            error_response(StatusCode::BAD_REQUEST, "Missing path parameter")
        }
    }
}

/// Bind `config.listen` and serve the limiter endpoints until `shutdown`
///
/// `ready` is raised once the listener is bound.
pub async fn run_limits<S>(
    config: Arc<LimitsConfig>,
    metrics: Option<Arc<Metrics>>,
    ready: Arc<AtomicBool>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = ?config.listen, "starting rate limiter service");
    ready.store(true, Ordering::Relaxed);
    serve_limits(listener, config, metrics, shutdown).await
}

/// Serve the limiter endpoints on an already bound listener
pub async fn serve_limits<S>(
    listener: TcpListener,
    config: Arc<LimitsConfig>,
    metrics: Option<Arc<Metrics>>,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()>,
{
    let timeout = config.timeout.clone();
    let state = Arc::new(LimitsState::new(config, metrics.clone()));
    serve(listener, &timeout, metrics, shutdown, move |req, _peer| {
        handle_limits_request(req, Arc::clone(&state))
    })
    .await?;
    info!("Rate limiter service stopped");
    Ok(())
}
