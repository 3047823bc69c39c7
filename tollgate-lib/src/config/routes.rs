use serde::Deserialize;

/// Filter stages that can be attached to a route
///
/// The order in the route's `filters` list is the execution order.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Rejects write requests whose body is not JSON
    Validation,
    /// Bearer token enforcement and identity propagation
    Auth,
    /// Remote rate check through the limiter service
    RateLimit,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::Validation => "validation",
            FilterKind::Auth => "auth",
            FilterKind::RateLimit => "rate_limit",
        }
    }
}

/// Route configuration for path-based routing
#[derive(Debug, Deserialize, Clone)]
pub struct RouteConfig {
    /// Unique route identifier, used in logs and metrics
    pub id: String,
    /// URL path prefix to match (e.g., "/api/polls", "/auth/")
    /// Routes are matched in order, first match wins
    pub prefix: String,
    /// Upstream service address (host:port)
    pub upstream: String,
    /// Replace the matched prefix before forwarding (optional)
    /// Example: prefix = "/api/users/", replace_path = "/user/"
    /// forwards "/api/users/42" as "/user/42"
    #[serde(default)]
    pub replace_path: Option<String>,
    /// Ordered filter chain for this route
    /// Default: empty (plain forwarding)
    #[serde(default)]
    pub filters: Vec<FilterKind>,
}

impl RouteConfig {
    pub fn has_filter(&self, kind: FilterKind) -> bool {
        self.filters.contains(&kind)
    }
}
