mod auth;
mod gateway;
mod limits;
mod loader;
mod rate_limit;
mod routes;
mod telemetry;
mod timeout;

pub use auth::AuthConfig;
pub use gateway::GatewayConfig;
pub use limits::{LimitsConfig, RateConfig, RatePolicyConfig};
pub use loader::{
    load_gateway_config, load_limits_config, validate_gateway_config, validate_limits_config,
    JWT_SECRET_ENV,
};
pub use rate_limit::{CircuitBreakerConfig, RateLimitConfig};
pub use routes::{FilterKind, RouteConfig};
pub use telemetry::{LoggingConfig, TelemetryConfig};
pub use timeout::{KeepAliveConfig, TimeoutConfig};
