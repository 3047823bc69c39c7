use crate::config::{RateConfig, RatePolicyConfig};
use crate::limiter::protocol::{RateView, RouteLimits};

/// Prefix carried by rate-limit keys of authenticated callers
pub const USER_KEY_PREFIX: &str = "user:";
/// Prefix carried by rate-limit keys of anonymous callers
pub const IP_KEY_PREFIX: &str = "ip:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    Anonymous,
    Authenticated,
}

impl CallerClass {
    /// Authenticated iff the key starts with `user:`
    pub fn of_key(key: &str) -> Self {
        if key.starts_with(USER_KEY_PREFIX) {
            CallerClass::Authenticated
        } else {
            CallerClass::Anonymous
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallerClass::Anonymous => "anonymous",
            CallerClass::Authenticated => "authenticated",
        }
    }
}

/// Picks bucket parameters for a (key, route) pair
#[derive(Debug, Clone)]
pub struct RatePolicy {
    config: RatePolicyConfig,
}

impl RatePolicy {
    pub fn new(config: RatePolicyConfig) -> Self {
        Self { config }
    }

    pub fn rate_for(&self, class: CallerClass, route: &str) -> RateConfig {
        if !route.starts_with(&self.config.protected_prefix) {
            return self.config.default;
        }
        match class {
            CallerClass::Anonymous => self.config.anonymous,
            CallerClass::Authenticated => self.config.authenticated,
        }
    }

    pub fn route_limits(&self, route: &str) -> RouteLimits {
        RouteLimits {
            anonymous: RateView::from(self.rate_for(CallerClass::Anonymous, route)),
            authenticated: RateView::from(self.rate_for(CallerClass::Authenticated, route)),
        }
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::new(RatePolicyConfig::default())
    }
}
