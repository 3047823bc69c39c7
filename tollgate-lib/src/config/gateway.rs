use serde::Deserialize;
use std::net::SocketAddr;

use super::auth::AuthConfig;
use super::rate_limit::RateLimitConfig;
use super::routes::RouteConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Gateway configuration root
#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8080"
    pub listen: SocketAddr,
    /// Path-based routing rules with their filter chains
    /// At least one route is required
    pub routes: Vec<RouteConfig>,
    /// Token validation and open/secured classification
    #[serde(default)]
    pub auth: AuthConfig,
    /// Remote rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
