pub mod bucket;
pub mod policy;
pub mod protocol;
pub mod server;
pub mod service;

pub use bucket::{ConsumeResult, TokenBucket};
pub use policy::{CallerClass, RatePolicy, IP_KEY_PREFIX, USER_KEY_PREFIX};
pub use protocol::{CheckRequest, CheckResponse, RateView, RouteLimits, CHECK_PATH};
pub use server::{handle_limits_request, run_limits, serve_limits, LimitsState};
pub use service::RateLimiterService;
