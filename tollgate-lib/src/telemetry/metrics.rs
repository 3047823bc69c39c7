use opentelemetry::global;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::sync::Arc;

pub mod labels {
    pub const ERROR_TYPE: &str = "error_type";
    pub const ROUTE: &str = "route";
    pub const STATUS_CODE: &str = "status_code";
    pub const METHOD: &str = "method";
    pub const UPSTREAM: &str = "upstream";
    pub const TIMEOUT_TYPE: &str = "timeout_type";
    pub const REASON: &str = "reason";
    pub const OUTCOME: &str = "outcome";
    pub const CLASS: &str = "class";
    pub const STATE: &str = "state";
    pub const RESULT: &str = "result";
    pub const VERSION: &str = "version";
    pub const RUST_VERSION: &str = "rust_version";
}

pub mod values {
    pub const TIMEOUT_CONNECTION_HANDLING: &str = "connection_handling";
    pub const TIMEOUT_LIMITS_BACKEND: &str = "limits_backend";
    pub const OUTCOME_ALLOWED: &str = "allowed";
    pub const OUTCOME_DENIED: &str = "denied";
    pub const AUTH_AUTHENTICATED: &str = "authenticated";
    pub const AUTH_ANONYMOUS: &str = "anonymous";
    pub const AUTH_REJECTED: &str = "rejected";
    pub const CACHE_HIT: &str = "hit";
    pub const CACHE_MISS: &str = "miss";
    pub const ERROR_RATE_LIMITED: &str = "rate_limited";
    pub const ERROR_UNAUTHORIZED: &str = "unauthorized";
    pub const ERROR_VALIDATION: &str = "validation";
    pub const ERROR_NO_ROUTE: &str = "no_route";
}

#[derive(Clone)]
pub struct Metrics {
    pub connections_total: Counter<u64>,
    pub connections_active: UpDownCounter<i64>,

    pub requests_total: Counter<u64>,
    pub requests_duration_seconds: Histogram<f64>,

    pub upstream_requests_total: Counter<u64>,
    pub upstream_errors_total: Counter<u64>,
    pub upstream_duration_seconds: Histogram<f64>,

    pub errors_total: Counter<u64>,
    pub timeouts_total: Counter<u64>,

    // Edge filters
    pub auth_requests_total: Counter<u64>,
    pub validation_rejections_total: Counter<u64>,

    // Rate limit guard (gateway side)
    pub rate_limit_allowed_total: Counter<u64>,
    pub rate_limit_denied_total: Counter<u64>,
    pub rate_limit_errors_total: Counter<u64>,
    pub rate_limit_cache_total: Counter<u64>,
    pub rate_limit_backend_duration_seconds: Histogram<f64>,
    pub circuit_breaker_transitions_total: Counter<u64>,

    // Limiter service
    pub limiter_decisions_total: Counter<u64>,

    pub build_info: Gauge<u64>,
}

impl Metrics {
    pub fn new(meter: Meter) -> Self {
        Self {
            connections_total: meter
                .u64_counter("tollgate_connections_total")
                .with_description("Total number of connections accepted")
                .build(),
            connections_active: meter
                .i64_up_down_counter("tollgate_connections_active")
                .with_description("Number of active connections")
                .build(),

            requests_total: meter
                .u64_counter("tollgate_requests_total")
                .with_description("Total number of requests processed")
                .build(),
            requests_duration_seconds: meter
                .f64_histogram("tollgate_requests_duration_seconds")
                .with_description("Request duration in seconds")
                .build(),

            upstream_requests_total: meter
                .u64_counter("tollgate_upstream_requests_total")
                .with_description("Total number of requests forwarded upstream")
                .build(),
            upstream_errors_total: meter
                .u64_counter("tollgate_upstream_errors_total")
                .with_description("Total number of upstream transport errors")
                .build(),
            upstream_duration_seconds: meter
                .f64_histogram("tollgate_upstream_duration_seconds")
                .with_description("Upstream request duration in seconds")
                .build(),

            errors_total: meter
                .u64_counter("tollgate_errors_total")
                .with_description("Total number of terminal error responses")
                .build(),
            timeouts_total: meter
                .u64_counter("tollgate_timeouts_total")
                .with_description("Total number of timeouts")
                .build(),

            auth_requests_total: meter
                .u64_counter("tollgate_auth_requests_total")
                .with_description("Auth filter outcomes. outcome=authenticated|anonymous|rejected")
                .build(),
            validation_rejections_total: meter
                .u64_counter("tollgate_validation_rejections_total")
                .with_description("Requests rejected by the validation filter")
                .build(),

            rate_limit_allowed_total: meter
                .u64_counter("tollgate_rate_limit_allowed_total")
                .with_description("Requests allowed by the rate limit guard")
                .build(),
            rate_limit_denied_total: meter
                .u64_counter("tollgate_rate_limit_denied_total")
                .with_description("Requests denied by the rate limit guard")
                .build(),
            rate_limit_errors_total: meter
                .u64_counter("tollgate_rate_limit_errors_total")
                .with_description("Failed calls to the limits service")
                .build(),
            rate_limit_cache_total: meter
                .u64_counter("tollgate_rate_limit_cache_total")
                .with_description("Decision cache lookups. result=hit|miss")
                .build(),
            rate_limit_backend_duration_seconds: meter
                .f64_histogram("tollgate_rate_limit_backend_duration_seconds")
                .with_description("Latency of calls to the limits service in seconds")
                .build(),
            circuit_breaker_transitions_total: meter
                .u64_counter("tollgate_circuit_breaker_transitions_total")
                .with_description("Circuit breaker state transitions. state=closed|open|half_open")
                .build(),

            limiter_decisions_total: meter
                .u64_counter("tollgate_limiter_decisions_total")
                .with_description("Token bucket decisions. class=anonymous|authenticated")
                .build(),

            build_info: meter
                .u64_gauge("tollgate_build_info")
                .with_description("Build information (version, rust version)")
                .build(),
        }
    }

    /// Set build info metric with version labels
    pub fn set_build_info(&self) {
        let version = env!("CARGO_PKG_VERSION");
        let rust_version = env!("CARGO_PKG_RUST_VERSION");

        self.build_info.record(
            1,
            &[
                KeyValue::new(labels::VERSION, version),
                KeyValue::new(labels::RUST_VERSION, rust_version),
            ],
        );
    }

    pub fn record_request(&self, method: &str, status_code: u16, route: &str) {
        self.requests_total.add(
            1,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_request_duration(
        &self,
        method: &str,
        status_code: u16,
        route: &str,
        duration: f64,
    ) {
        self.requests_duration_seconds.record(
            duration,
            &[
                KeyValue::new(labels::METHOD, method.to_string()),
                KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_upstream_request(
        &self,
        upstream: &str,
        status_code: u16,
        route: &str,
        duration: f64,
    ) {
        let attrs = [
            KeyValue::new(labels::UPSTREAM, upstream.to_string()),
            KeyValue::new(labels::STATUS_CODE, status_code.to_string()),
            KeyValue::new(labels::ROUTE, route.to_string()),
        ];
        self.upstream_requests_total.add(1, &attrs);
        self.upstream_duration_seconds.record(duration, &attrs);
    }

    pub fn record_upstream_error(&self, upstream: &str, error_type: &str, route: &str) {
        self.upstream_errors_total.add(
            1,
            &[
                KeyValue::new(labels::UPSTREAM, upstream.to_string()),
                KeyValue::new(labels::ERROR_TYPE, error_type.to_string()),
                KeyValue::new(labels::ROUTE, route.to_string()),
            ],
        );
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total
            .add(1, &[KeyValue::new(labels::ERROR_TYPE, error_type.to_string())]);
    }

    pub fn record_timeout(&self, timeout_type: &str) {
        self.timeouts_total
            .add(1, &[KeyValue::new(labels::TIMEOUT_TYPE, timeout_type.to_string())]);
    }

    pub fn record_auth(&self, outcome: &str, reason: Option<&str>) {
        let mut attrs = vec![KeyValue::new(labels::OUTCOME, outcome.to_string())];
        if let Some(reason) = reason {
            attrs.push(KeyValue::new(labels::REASON, reason.to_string()));
        }
        self.auth_requests_total.add(1, &attrs);
        if outcome == values::AUTH_REJECTED {
            self.record_error(values::ERROR_UNAUTHORIZED);
        }
    }

    pub fn record_validation_rejection(&self, route: &str) {
        self.validation_rejections_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
        self.record_error(values::ERROR_VALIDATION);
    }

    pub fn record_rate_limit_allowed(&self, route: &str) {
        self.rate_limit_allowed_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
    }

    pub fn record_rate_limit_denied(&self, route: &str) {
        self.rate_limit_denied_total
            .add(1, &[KeyValue::new(labels::ROUTE, route.to_string())]);
        self.record_error(values::ERROR_RATE_LIMITED);
    }

    pub fn record_rate_limit_error(&self, reason: &str) {
        self.rate_limit_errors_total
            .add(1, &[KeyValue::new(labels::REASON, reason.to_string())]);
    }

    pub fn record_rate_limit_cache(&self, hit: bool) {
        let result = if hit { values::CACHE_HIT } else { values::CACHE_MISS };
        self.rate_limit_cache_total
            .add(1, &[KeyValue::new(labels::RESULT, result)]);
    }

    pub fn record_rate_limit_backend_duration(&self, duration: f64) {
        self.rate_limit_backend_duration_seconds.record(duration, &[]);
    }

    pub fn record_circuit_transition(&self, state: &str) {
        self.circuit_breaker_transitions_total
            .add(1, &[KeyValue::new(labels::STATE, state.to_string())]);
    }

    pub fn record_limiter_decision(&self, class: &str, allowed: bool) {
        let outcome = if allowed { values::OUTCOME_ALLOWED } else { values::OUTCOME_DENIED };
        self.limiter_decisions_total.add(
            1,
            &[
                KeyValue::new(labels::CLASS, class.to_string()),
                KeyValue::new(labels::OUTCOME, outcome),
            ],
        );
    }
}

/// Install a Prometheus-backed meter provider and build the instrument set
///
/// `service_name` becomes the meter name.
pub fn init_metrics(
    service_name: &'static str,
) -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter(service_name);
    let metrics = Arc::new(Metrics::new(meter));

    metrics.set_build_info();

    Ok((metrics, registry))
}
