use serde::Deserialize;

/// Telemetry configuration
/// Controls observability features: metrics and the OpenTelemetry integration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Observability server port (optional)
    /// If provided, a separate HTTP server on this port serves Prometheus
    /// metrics and health checks
    /// Default: None (metrics disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
    /// OpenTelemetry internal log level
    /// Separate from the application log level in [logging]
    /// Default: "warn"
    #[serde(default = "default_otel_log_level")]
    pub otel_log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { metrics_port: None, otel_log_level: default_otel_log_level() }
    }
}

fn default_otel_log_level() -> String {
    "warn".to_string()
}

/// Logging configuration
/// Controls application-level structured logging (stdout/stderr)
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    /// Can be overridden at runtime via RUST_LOG environment variable
    /// Default: "info"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Show module path (target) in log messages
    /// Default: false
    #[serde(default)]
    pub show_target: bool,
    /// Emit one info line per request with its path
    /// Default: true
    #[serde(default = "default_true")]
    pub access_log: bool,
    /// Path prefixes excluded from the access log
    /// Default: ["/actuator"]
    #[serde(default = "default_exclude_prefixes")]
    pub exclude_prefixes: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            show_target: false,
            access_log: true,
            exclude_prefixes: default_exclude_prefixes(),
        }
    }
}

impl LoggingConfig {
    /// Returns true if a request to `path` should produce an access log line
    pub fn should_log(&self, path: &str) -> bool {
        self.access_log
            && !self
                .exclude_prefixes
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .any(|p| path.starts_with(p))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_exclude_prefixes() -> Vec<String> {
    vec!["/actuator".to_string()]
}
