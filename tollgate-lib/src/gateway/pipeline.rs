use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::body::Body;
use hyper::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{FilterKind, GatewayConfig, LoggingConfig};
use crate::error::{Result, TollgateError};
use crate::gateway::auth::AuthEnforcer;
use crate::gateway::filter::{FilterContext, FilterOutcome, GatewayFilter};
use crate::gateway::forwarding::{
    forward, BoxError, ClientPool, ForwardTarget, Upstream, UpstreamBody,
};
use crate::gateway::headers::strip_identity_headers;
use crate::gateway::http_result::HttpError;
use crate::gateway::rate_limit::RateLimitGuard;
use crate::gateway::route_validator::segment_prefix_match;
use crate::gateway::validation::ValidationFilter;
use crate::response::{error_response, RespBody};
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// A trailing '/' makes the prefix match anything below it; otherwise the
/// prefix must end on a path segment boundary
fn route_prefix_match(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        path.starts_with(prefix)
    } else {
        segment_prefix_match(path, prefix)
    }
}

/// A configured route with its filter chain resolved
pub struct CompiledRoute {
    pub id: String,
    pub prefix: String,
    pub upstream: Upstream,
    pub replace_path: Option<String>,
    pub filters: Vec<Arc<dyn GatewayFilter>>,
}

impl CompiledRoute {
    pub fn filter_names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

/// Route table plus the shared filters, built once at startup
pub struct GatewayPipeline {
    routes: Vec<CompiledRoute>,
    pool: ClientPool,
    logging: LoggingConfig,
    metrics: Option<Arc<Metrics>>,
    rate_limit: Option<Arc<RateLimitGuard>>,
}

impl GatewayPipeline {
    /// Build routes from config, with an HTTP-backed rate limit guard if any
    /// route asks for one
    pub fn from_config(config: &GatewayConfig, metrics: Option<Arc<Metrics>>) -> Result<Self> {
        let needs_guard = config.routes.iter().any(|r| r.has_filter(FilterKind::RateLimit));
        let guard = if needs_guard {
            Some(Arc::new(RateLimitGuard::from_config(
                &config.rate_limit,
                &config.timeout.keep_alive,
                Duration::from_millis(config.timeout.connect_ms),
                metrics.clone(),
            )?))
        } else {
            None
        };
        Self::with_rate_limit_guard(config, guard, metrics)
    }

    /// Build routes from config using the given guard for `rate_limit` filters
    pub fn with_rate_limit_guard(
        config: &GatewayConfig,
        rate_limit: Option<Arc<RateLimitGuard>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self> {
        let needs_auth = config.routes.iter().any(|r| r.has_filter(FilterKind::Auth));
        let auth: Option<Arc<dyn GatewayFilter>> = if needs_auth {
            Some(Arc::new(AuthEnforcer::from_config(&config.auth, metrics.clone())?))
        } else {
            None
        };
        let validation: Arc<dyn GatewayFilter> = Arc::new(ValidationFilter::new(metrics.clone()));
        let guard_filter: Option<Arc<dyn GatewayFilter>> =
            rate_limit.clone().map(|g| g as Arc<dyn GatewayFilter>);

        let mut routes = Vec::with_capacity(config.routes.len());
        for route in &config.routes {
            let upstream = Upstream::parse(&route.upstream).map_err(|e| {
                TollgateError::Config(format!("Route {} has invalid upstream: {e}", route.id))
            })?;

            let mut filters = Vec::with_capacity(route.filters.len());
            for kind in &route.filters {
                let filter = match kind {
                    FilterKind::Validation => Some(Arc::clone(&validation)),
                    FilterKind::Auth => auth.clone(),
                    FilterKind::RateLimit => guard_filter.clone(),
                };
                let filter = filter.ok_or_else(|| {
                    TollgateError::Config(format!(
                        "Route {} uses filter {} which is not configured",
                        route.id,
                        kind.as_str()
                    ))
                })?;
                filters.push(filter);
            }

            routes.push(CompiledRoute {
                id: route.id.clone(),
                prefix: route.prefix.clone(),
                upstream,
                replace_path: route.replace_path.clone(),
                filters,
            });
        }

        Ok(Self {
            routes,
            pool: ClientPool::new(
                &config.timeout.keep_alive,
                Duration::from_millis(config.timeout.connect_ms),
            ),
            logging: config.logging.clone(),
            metrics,
            rate_limit,
        })
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn rate_limit_guard(&self) -> Option<&Arc<RateLimitGuard>> {
        self.rate_limit.as_ref()
    }

    /// First route whose prefix matches `path`, in configuration order
    pub fn select_route(&self, path: &str) -> Option<&CompiledRoute> {
        self.routes.iter().find(|r| route_prefix_match(path, &r.prefix))
    }

    /// Run one request through route selection, filters and forwarding
    pub async fn handle<B>(&self, req: Request<B>, peer: SocketAddr) -> Response<RespBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let start = Instant::now();
        let (mut parts, body) = req.into_parts();
        let method = parts.method.clone();
        let path = parts.uri.path().to_string();

        let stripped = strip_identity_headers(&mut parts.headers);
        if stripped > 0 {
            debug!(path = %path, stripped, "removed client-supplied identity headers");
        }

        let (route_id, resp) = match self.select_route(&path) {
            None => {
                if let Some(ref m) = self.metrics {
                    m.record_error(values::ERROR_NO_ROUTE);
                }
                let e = HttpError::NoMatchingRoute;
                ("none", error_response(StatusCode::from(e.clone()), e.message()))
            }
            Some(route) => {
                let body = body.map_err(Into::<BoxError>::into).boxed_unsync();
                (route.id.as_str(), self.run_route(route, parts, body, peer).await)
            }
        };

        if self.logging.access_log && self.logging.should_log(&path) {
            info!(
                method = %method,
                path = %path,
                route = route_id,
                status = resp.status().as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "access"
            );
        }
        if let Some(ref m) = self.metrics {
            let status = resp.status().as_u16();
            m.record_request(method.as_str(), status, route_id);
            m.record_request_duration(
                method.as_str(),
                status,
                route_id,
                start.elapsed().as_secs_f64(),
            );
        }

        resp
    }

    async fn run_route(
        &self,
        route: &CompiledRoute,
        mut parts: http::request::Parts,
        body: UpstreamBody,
        peer: SocketAddr,
    ) -> Response<RespBody> {
        let mut ctx = FilterContext::new(peer);
        for filter in &route.filters {
            if let FilterOutcome::Respond(resp) = filter.apply(&mut parts, &mut ctx).await {
                debug!(
                    route = %route.id,
                    filter = filter.name(),
                    status = resp.status().as_u16(),
                    "filter short-circuited"
                );
                return resp;
            }
        }

        let target = ForwardTarget {
            route_id: &route.id,
            upstream: &route.upstream,
            matched_prefix: &route.prefix,
            replace_path: route.replace_path.as_deref(),
        };
        match forward(parts, body, target, &self.pool, self.metrics.as_ref()).await {
            Ok(mut resp) => {
                resp.headers_mut().extend(ctx.response_headers);
                resp
            }
            Err(e) => {
                let mut resp = error_response(StatusCode::from(e.clone()), e.message());
                resp.headers_mut().extend(ctx.response_headers);
                resp
            }
        }
    }
}
