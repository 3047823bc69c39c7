//! Gateway-side rate limiting against the remote limits service

pub mod backend;
pub mod key;
pub mod stats;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::request::Parts;
use http::StatusCode;
use moka::future::Cache;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{KeepAliveConfig, RateLimitConfig};
use crate::error::Result;
use crate::gateway::circuit_breaker::CircuitBreaker;
use crate::gateway::filter::{FilterContext, FilterOutcome, GatewayFilter};
use crate::gateway::headers::quota_headers;
use crate::limiter::{CheckRequest, CheckResponse};
use crate::response::error_response;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

pub use backend::{HttpLimiterBackend, LimiterBackend, LimiterError};
pub use key::limit_key;
pub use stats::{GuardStats, GuardStatsSnapshot};

/// What the guard decided for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Within quota; carries the decision for quota headers
    Allowed(CheckResponse),
    /// Over quota
    Denied(CheckResponse),
    /// Limits service failed and the guard is configured to fail open
    Degraded(LimiterError),
    /// Limits service failed and the guard is configured to fail closed
    Unavailable(LimiterError),
}

/// Cached, circuit-broken client of the limits service
///
/// Decisions are cached per bucket key for a short TTL, denials included,
/// so a burst from one caller costs one remote call per TTL window.
pub struct RateLimitGuard {
    backend: Arc<dyn LimiterBackend>,
    cache: Cache<String, CheckResponse>,
    breaker: Arc<CircuitBreaker>,
    stats: Arc<GuardStats>,
    timeout: Duration,
    fail_open: bool,
    trust_forwarded_for: bool,
    metrics: Option<Arc<Metrics>>,
}

impl RateLimitGuard {
    pub fn new(
        config: &RateLimitConfig,
        backend: Arc<dyn LimiterBackend>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let breaker =
            CircuitBreaker::new(config.circuit_breaker.clone()).with_metrics(metrics.clone());
        Self::with_breaker(config, backend, breaker, metrics)
    }

    /// Same as [`RateLimitGuard::new`] with a preconfigured breaker
    pub fn with_breaker(
        config: &RateLimitConfig,
        backend: Arc<dyn LimiterBackend>,
        breaker: CircuitBreaker,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_entries)
            .time_to_live(Duration::from_millis(config.cache_ttl_ms))
            .build();
        Self {
            backend,
            cache,
            breaker: Arc::new(breaker),
            stats: Arc::new(GuardStats::default()),
            timeout: Duration::from_millis(config.timeout_ms),
            fail_open: config.fail_open,
            trust_forwarded_for: config.trust_forwarded_for,
            metrics,
        }
    }

    /// Guard backed by [`HttpLimiterBackend`] pointed at `config.backend_url`
    pub fn from_config(
        config: &RateLimitConfig,
        keep_alive: &KeepAliveConfig,
        connect_timeout: Duration,
        metrics: Option<Arc<Metrics>>,
    ) -> Result<Self> {
        let backend = HttpLimiterBackend::new(&config.backend_url, keep_alive, connect_timeout)?;
        Ok(Self::new(config, Arc::new(backend), metrics))
    }

    pub fn stats(&self) -> GuardStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn trust_forwarded_for(&self) -> bool {
        self.trust_forwarded_for
    }

    /// Decide for `key` on `route`, consulting the cache first
    pub async fn decide(&self, key: &str, route: &str) -> Decision {
        let request = CheckRequest::new(key, route);
        let bucket_key = request.bucket_key();

        let cached = self.cache.get(&bucket_key).await;
        self.stats.record_cache(cached.is_some());
        if let Some(ref m) = self.metrics {
            m.record_rate_limit_cache(cached.is_some());
        }

        let result = match cached {
            Some(decision) => {
                debug!(bucket = %bucket_key, allowed = decision.allowed, "rate limit cache hit");
                Ok(decision)
            }
            None => self.remote_check(request, bucket_key).await,
        };

        match result {
            Ok(decision) if decision.allowed => {
                self.stats.record_allowed();
                if let Some(ref m) = self.metrics {
                    m.record_rate_limit_allowed(route);
                }
                Decision::Allowed(decision)
            }
            Ok(decision) => {
                self.stats.record_denied();
                if let Some(ref m) = self.metrics {
                    m.record_rate_limit_denied(route);
                }
                Decision::Denied(decision)
            }
            Err(e) => {
                self.stats.record_error();
                if let Some(ref m) = self.metrics {
                    m.record_rate_limit_error(e.reason());
                    if e == LimiterError::Timeout {
                        m.record_timeout(values::TIMEOUT_LIMITS_BACKEND);
                    }
                }
                if self.fail_open {
                    warn!(key = %key, route = %route, error = %e, "limits service unavailable, failing open");
                    Decision::Degraded(e)
                } else {
                    warn!(key = %key, route = %route, error = %e, "limits service unavailable, failing closed");
                    Decision::Unavailable(e)
                }
            }
        }
    }

    /// Run the remote call on its own task so a dropped client request does
    /// not cancel it; the outcome is still recorded and cached.
    async fn remote_check(
        &self,
        request: CheckRequest,
        bucket_key: String,
    ) -> std::result::Result<CheckResponse, LimiterError> {
        let backend = Arc::clone(&self.backend);
        let breaker = Arc::clone(&self.breaker);
        let stats = Arc::clone(&self.stats);
        let cache = self.cache.clone();
        let metrics = self.metrics.clone();
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            let Some(permit) = breaker.try_acquire_tracked() else {
                return Err(LimiterError::CircuitOpen);
            };

            let start = Instant::now();
            let outcome = match tokio::time::timeout(timeout, backend.check(&request)).await {
                Ok(result) => result,
                Err(_) => Err(LimiterError::Timeout),
            };
            let elapsed = start.elapsed();
            stats.record_remote_call(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
            if let Some(ref m) = metrics {
                m.record_rate_limit_backend_duration(elapsed.as_secs_f64());
            }

            match outcome {
                Ok(decision) => {
                    permit.success();
                    cache.insert(bucket_key, decision.clone()).await;
                    Ok(decision)
                }
                Err(e) => {
                    permit.failure();
                    Err(e)
                }
            }
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(LimiterError::Transport(format!("limits check task failed: {e}"))),
        }
    }
}

#[async_trait]
impl GatewayFilter for RateLimitGuard {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn apply(&self, parts: &mut Parts, ctx: &mut FilterContext) -> FilterOutcome {
        let key = limit_key(&parts.headers, ctx.peer, self.trust_forwarded_for);
        let route = parts.uri.path().to_string();

        match self.decide(&key, &route).await {
            Decision::Allowed(decision) => {
                ctx.response_headers.extend(quota_headers(&decision));
                FilterOutcome::Continue
            }
            Decision::Denied(decision) => {
                let mut resp = error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded");
                resp.headers_mut().extend(quota_headers(&decision));
                FilterOutcome::Respond(resp)
            }
            Decision::Degraded(_) => FilterOutcome::Continue,
            Decision::Unavailable(_) => FilterOutcome::Respond(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Limits service unavailable",
            )),
        }
    }
}
