#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod limiter;
pub mod response;
pub mod server;
pub mod telemetry;

pub use config::{load_gateway_config, load_limits_config, GatewayConfig, LimitsConfig};
pub use error::{Result, TollgateError};
pub use gateway::{GatewayPipeline, RateLimitGuard, RouteValidator};
pub use limiter::{ConsumeResult, RateLimiterService, TokenBucket};
