use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Limiter service configuration root
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Address and port to listen on
    /// Example: "0.0.0.0:8082"
    pub listen: SocketAddr,
    /// Rate parameters per route and caller class
    #[serde(default)]
    pub policy: RatePolicyConfig,
    /// Advisory reset hint returned with every decision, in seconds
    /// Not derived from the refill rate
    /// Default: 60
    #[serde(default = "default_reset_seconds")]
    pub reset_seconds: u32,
    /// Feature flags served on /api/limits/features
    #[serde(default = "default_features")]
    pub features: BTreeMap<String, bool>,
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

/// Token bucket parameters
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct RateConfig {
    /// Tokens added per second
    pub replenish_rate: u32,
    /// Bucket capacity (maximum burst)
    pub burst_capacity: u32,
}

impl RateConfig {
    pub const fn new(replenish_rate: u32, burst_capacity: u32) -> Self {
        Self { replenish_rate, burst_capacity }
    }
}

/// Rate selection policy
///
/// Routes under `protected_prefix` get separate anonymous and authenticated
/// rates; everything else uses `default` for both classes.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RatePolicyConfig {
    /// Default: "/api/"
    #[serde(default = "default_protected_prefix")]
    pub protected_prefix: String,
    /// Default: 10/s, burst 20
    #[serde(default = "default_anonymous")]
    pub anonymous: RateConfig,
    /// Default: 30/s, burst 60
    #[serde(default = "default_authenticated")]
    pub authenticated: RateConfig,
    /// Default: 20/s, burst 40
    #[serde(default = "default_rate")]
    pub default: RateConfig,
}

impl Default for RatePolicyConfig {
    fn default() -> Self {
        Self {
            protected_prefix: default_protected_prefix(),
            anonymous: default_anonymous(),
            authenticated: default_authenticated(),
            default: default_rate(),
        }
    }
}

fn default_reset_seconds() -> u32 {
    60
}

fn default_features() -> BTreeMap<String, bool> {
    BTreeMap::from([("createPoll.enabled".to_string(), true), ("voting.enabled".to_string(), true)])
}

fn default_protected_prefix() -> String {
    "/api/".to_string()
}

fn default_anonymous() -> RateConfig {
    RateConfig::new(10, 20)
}

fn default_authenticated() -> RateConfig {
    RateConfig::new(30, 60)
}

fn default_rate() -> RateConfig {
    RateConfig::new(20, 40)
}
