//! Edge gateway: route selection, per-route filter chains and forwarding

pub mod auth;
pub mod circuit_breaker;
pub mod filter;
pub mod forwarding;
pub mod headers;
pub mod http_result;
pub mod pipeline;
pub mod rate_limit;
pub mod route_validator;
pub mod server;
pub mod token;
pub mod validation;

pub use auth::{bearer_token, AuthEnforcer};
pub use circuit_breaker::{
    CircuitBreaker, CircuitState, Clock, MonotonicClock, Permit, TrackedPermit,
};
pub use filter::{FilterContext, FilterOutcome, GatewayFilter};
pub use forwarding::{rewrite_path, ClientPool, Upstream};
pub use http_result::{HttpError, HttpResult};
pub use pipeline::{CompiledRoute, GatewayPipeline};
pub use rate_limit::{
    limit_key, Decision, GuardStatsSnapshot, HttpLimiterBackend, LimiterBackend, LimiterError,
    RateLimitGuard,
};
pub use route_validator::RouteValidator;
pub use server::{run_gateway, serve_gateway};
pub use token::{AuthError, Claims, Identity, TokenSigner, TokenVerifier};
pub use validation::ValidationFilter;
