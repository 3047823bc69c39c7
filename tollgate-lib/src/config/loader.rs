use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::config::{FilterKind, GatewayConfig, LimitsConfig, RateConfig};
use crate::error::{Result, TollgateError};

/// Environment variable consulted when `[auth].secret` is not set
pub const JWT_SECRET_ENV: &str = "TOLLGATE_JWT_SECRET";

pub fn load_gateway_config<P: AsRef<Path>>(p: P) -> Result<GatewayConfig> {
    let txt = fs::read_to_string(p)
        .map_err(|e| TollgateError::Config(format!("Failed to read config file: {e}")))?;
    let mut cfg: GatewayConfig = toml::from_str(&txt)
        .map_err(|e| TollgateError::Config(format!("Failed to parse config: {e}")))?;

    if cfg.auth.secret.is_none() {
        cfg.auth.secret = std::env::var(JWT_SECRET_ENV)
            .ok()
            .filter(|s| !s.is_empty());
    }

    validate_gateway_config(&cfg)?;

    Ok(cfg)
}

pub fn load_limits_config<P: AsRef<Path>>(p: P) -> Result<LimitsConfig> {
    let txt = fs::read_to_string(p)
        .map_err(|e| TollgateError::Config(format!("Failed to read config file: {e}")))?;
    let cfg: LimitsConfig = toml::from_str(&txt)
        .map_err(|e| TollgateError::Config(format!("Failed to parse config: {e}")))?;

    validate_limits_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_gateway_config(cfg: &GatewayConfig) -> Result<()> {
    if cfg.routes.is_empty() {
        return Err(TollgateError::Config("at least one route is required".into()));
    }

    let mut seen = HashSet::new();
    for route in &cfg.routes {
        if !seen.insert(route.id.as_str()) {
            return Err(TollgateError::Config(format!("Duplicate route id: {}", route.id)));
        }
        if !route.prefix.starts_with('/') {
            return Err(TollgateError::Config(format!(
                "Route {} prefix must start with '/': {}",
                route.id, route.prefix
            )));
        }
        if route.upstream.trim().is_empty() {
            return Err(TollgateError::Config(format!("Route {} has an empty upstream", route.id)));
        }
        if let Some(replace) = &route.replace_path {
            if !replace.starts_with('/') {
                return Err(TollgateError::Config(format!(
                    "Route {} replace_path must start with '/': {replace}",
                    route.id
                )));
            }
        }
    }

    let needs_secret = cfg.routes.iter().any(|r| r.has_filter(FilterKind::Auth));
    let has_secret = cfg.auth.secret.as_deref().is_some_and(|s| !s.is_empty());
    if needs_secret && !has_secret {
        return Err(TollgateError::Config(
            "auth filter configured but no signing secret provided".into(),
        ));
    }

    let rl = &cfg.rate_limit;
    if cfg.routes.iter().any(|r| r.has_filter(FilterKind::RateLimit)) {
        if !rl.backend_url.starts_with("http://") {
            return Err(TollgateError::Config(format!(
                "rate_limit.backend_url must be an http:// URL: {}",
                rl.backend_url
            )));
        }
        if rl.timeout_ms == 0 {
            return Err(TollgateError::Config("rate_limit.timeout_ms must be > 0".into()));
        }
        if rl.cache_ttl_ms == 0 {
            return Err(TollgateError::Config("rate_limit.cache_ttl_ms must be > 0".into()));
        }
        if rl.cache_max_entries == 0 {
            return Err(TollgateError::Config("rate_limit.cache_max_entries must be > 0".into()));
        }
        let cb = &rl.circuit_breaker;
        if !(cb.failure_rate_threshold > 0.0 && cb.failure_rate_threshold <= 100.0) {
            return Err(TollgateError::Config(format!(
                "circuit_breaker.failure_rate_threshold must be in (0, 100]: {}",
                cb.failure_rate_threshold
            )));
        }
        if cb.sliding_window_size == 0 || cb.minimum_calls == 0 {
            return Err(TollgateError::Config(
                "circuit_breaker window and minimum_calls must be > 0".into(),
            ));
        }
        if cb.permitted_calls_half_open == 0 {
            return Err(TollgateError::Config(
                "circuit_breaker.permitted_calls_half_open must be > 0".into(),
            ));
        }
        if cb.wait_duration_open_ms == 0 {
            return Err(TollgateError::Config(
                "circuit_breaker.wait_duration_open_ms must be > 0".into(),
            ));
        }
    }

    if cfg.timeout.connect_ms == 0 {
        return Err(TollgateError::Config("timeout.connect_ms must be > 0".into()));
    }

    Ok(())
}

pub fn validate_limits_config(cfg: &LimitsConfig) -> Result<()> {
    let rates = [
        ("anonymous", cfg.policy.anonymous),
        ("authenticated", cfg.policy.authenticated),
        ("default", cfg.policy.default),
    ];
    for (name, RateConfig { replenish_rate, burst_capacity }) in rates {
        if burst_capacity == 0 {
            return Err(TollgateError::Config(format!(
                "policy.{name}.burst_capacity must be > 0"
            )));
        }
        if replenish_rate == 0 {
            return Err(TollgateError::Config(format!(
                "policy.{name}.replenish_rate must be > 0"
            )));
        }
    }
    if !cfg.policy.protected_prefix.starts_with('/') {
        return Err(TollgateError::Config(format!(
            "policy.protected_prefix must start with '/': {}",
            cfg.policy.protected_prefix
        )));
    }
    Ok(())
}
