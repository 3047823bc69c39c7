use serde::Deserialize;

/// Gateway-side rate limiting configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Base URL of the limiter service
    /// Default: "http://127.0.0.1:8082"
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// Timeout for a single remote rate check in milliseconds
    /// Default: 250
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Forward requests when the limiter service is unavailable
    /// When false, such requests get 503
    /// Default: true
    #[serde(default = "default_true")]
    pub fail_open: bool,
    /// How long a limiter decision is reused locally, in milliseconds
    /// Default: 500
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    /// Upper bound on cached decisions
    /// Default: 10000
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// Use the first X-Forwarded-For entry as the client address
    /// Only enable behind a proxy that overwrites the header
    /// Default: false
    #[serde(default)]
    pub trust_forwarded_for: bool,
    /// Circuit breaker around the limiter service
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            timeout_ms: default_timeout_ms(),
            fail_open: true,
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_max_entries: default_cache_max_entries(),
            trust_forwarded_for: false,
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Circuit breaker configuration
///
/// The breaker keeps the outcome of the last `sliding_window_size` calls and
/// opens once at least `minimum_calls` outcomes are recorded and the failure
/// percentage reaches `failure_rate_threshold`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Failure percentage that opens the circuit, in (0, 100]
    /// Default: 50
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
    /// Number of most recent calls considered
    /// Default: 20
    #[serde(default = "default_sliding_window_size")]
    pub sliding_window_size: usize,
    /// Calls required in the window before the rate is evaluated
    /// Capped at `sliding_window_size`
    /// Default: 20
    #[serde(default = "default_minimum_calls")]
    pub minimum_calls: usize,
    /// Time spent open before probes are admitted, in milliseconds
    /// Default: 10000
    #[serde(default = "default_wait_duration_open_ms")]
    pub wait_duration_open_ms: u64,
    /// Probe calls admitted while half-open
    /// Default: 5
    #[serde(default = "default_permitted_calls_half_open")]
    pub permitted_calls_half_open: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_failure_rate_threshold(),
            sliding_window_size: default_sliding_window_size(),
            minimum_calls: default_minimum_calls(),
            wait_duration_open_ms: default_wait_duration_open_ms(),
            permitted_calls_half_open: default_permitted_calls_half_open(),
        }
    }
}

fn default_backend_url() -> String {
    "http://127.0.0.1:8082".to_string()
}

fn default_timeout_ms() -> u64 {
    250
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_ms() -> u64 {
    500
}

fn default_cache_max_entries() -> u64 {
    10_000
}

fn default_failure_rate_threshold() -> f64 {
    50.0
}

fn default_sliding_window_size() -> usize {
    20
}

fn default_minimum_calls() -> usize {
    20
}

fn default_wait_duration_open_ms() -> u64 {
    10_000
}

fn default_permitted_calls_half_open() -> usize {
    5
}
