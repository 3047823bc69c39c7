use serial_test::serial;
use tollgate_lib::config::{load_gateway_config, FilterKind, JWT_SECRET_ENV};
use tollgate_lib::TollgateError;

use super::write_config;

const SECRET: &str = "0123456789abcdef0123456789abcdef";

#[test]
#[serial]
fn loads_minimal_config_with_defaults() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    std::env::remove_var(JWT_SECRET_ENV);
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[[routes]]
id = "polls"
prefix = "/api/polls"
upstream = "http://127.0.0.1:8083"
"#,
    )?;

    let cfg = load_gateway_config(file.path())?;
    assert_eq!(cfg.listen.to_string(), "127.0.0.1:0");
    assert_eq!(cfg.routes.len(), 1);
    assert!(cfg.routes[0].filters.is_empty());
    assert!(cfg.routes[0].replace_path.is_none());

    assert!(cfg.auth.secret.is_none());
    assert!(cfg.auth.open_endpoints.contains(&"/auth/sign-in".to_string()));
    assert_eq!(cfg.auth.public_read_prefixes, vec!["/api/polls"]);

    assert_eq!(cfg.rate_limit.backend_url, "http://127.0.0.1:8082");
    assert_eq!(cfg.rate_limit.timeout_ms, 250);
    assert!(cfg.rate_limit.fail_open);
    assert_eq!(cfg.rate_limit.cache_ttl_ms, 500);
    assert!(!cfg.rate_limit.trust_forwarded_for);
    assert_eq!(cfg.rate_limit.circuit_breaker.sliding_window_size, 20);
    assert_eq!(cfg.rate_limit.circuit_breaker.permitted_calls_half_open, 5);

    assert_eq!(cfg.logging.level, "info");
    assert!(!cfg.logging.should_log("/actuator/health"));
    assert!(cfg.logging.should_log("/api/polls"));
    assert_eq!(cfg.timeout.connect_ms, 5000);
    assert!(cfg.telemetry.metrics_port.is_none());
    Ok(())
}

#[test]
#[serial]
fn parses_filter_chain_in_order() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = write_config(&format!(
        r#"
listen = "127.0.0.1:0"

[auth]
secret = "{SECRET}"
issuer = "user-service"

[[routes]]
id = "users"
prefix = "/api/users/"
upstream = "http://127.0.0.1:8081"
replace_path = "/users/"
filters = ["validation", "auth", "rate_limit"]
"#
    ))?;

    let cfg = load_gateway_config(file.path())?;
    let route = &cfg.routes[0];
    assert_eq!(
        route.filters,
        vec![FilterKind::Validation, FilterKind::Auth, FilterKind::RateLimit]
    );
    assert_eq!(route.replace_path.as_deref(), Some("/users/"));
    assert_eq!(cfg.auth.issuer.as_deref(), Some("user-service"));
    Ok(())
}

#[test]
#[serial]
fn secret_falls_back_to_environment() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    std::env::set_var(JWT_SECRET_ENV, SECRET);
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[[routes]]
id = "votes"
prefix = "/api/votes"
upstream = "http://127.0.0.1:8084"
filters = ["auth"]
"#,
    )?;

    let result = load_gateway_config(file.path());
    std::env::remove_var(JWT_SECRET_ENV);

    let cfg = result?;
    assert_eq!(cfg.auth.secret.as_deref(), Some(SECRET));
    Ok(())
}

#[test]
#[serial]
fn auth_filter_without_secret_is_rejected() -> Result<(), Box<dyn std::error::Error + Send + Sync>>
{
    std::env::remove_var(JWT_SECRET_ENV);
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[[routes]]
id = "votes"
prefix = "/api/votes"
upstream = "http://127.0.0.1:8084"
filters = ["auth"]
"#,
    )?;

    match load_gateway_config(file.path()) {
        Err(TollgateError::Config(msg)) => assert!(msg.contains("secret"), "{msg}"),
        other => return Err(format!("expected config error, got {other:?}").into()),
    }
    Ok(())
}

#[test]
fn rejects_invalid_route_tables() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cases = [
        (
            "duplicate id",
            r#"
listen = "127.0.0.1:0"
[[routes]]
id = "a"
prefix = "/a"
upstream = "http://127.0.0.1:1"
[[routes]]
id = "a"
prefix = "/b"
upstream = "http://127.0.0.1:2"
"#,
        ),
        (
            "relative prefix",
            r#"
listen = "127.0.0.1:0"
[[routes]]
id = "a"
prefix = "api"
upstream = "http://127.0.0.1:1"
"#,
        ),
        (
            "no routes",
            r#"
listen = "127.0.0.1:0"
routes = []
"#,
        ),
        (
            "https limiter backend",
            r#"
listen = "127.0.0.1:0"
[rate_limit]
backend_url = "https://limits:8082"
[[routes]]
id = "a"
prefix = "/a"
upstream = "http://127.0.0.1:1"
filters = ["rate_limit"]
"#,
        ),
        (
            "threshold out of range",
            r#"
listen = "127.0.0.1:0"
[rate_limit.circuit_breaker]
failure_rate_threshold = 120.0
[[routes]]
id = "a"
prefix = "/a"
upstream = "http://127.0.0.1:1"
filters = ["rate_limit"]
"#,
        ),
        (
            "unknown filter",
            r#"
listen = "127.0.0.1:0"
[[routes]]
id = "a"
prefix = "/a"
upstream = "http://127.0.0.1:1"
filters = ["compression"]
"#,
        ),
    ];

    for (name, toml) in cases {
        let file = write_config(toml)?;
        assert!(
            matches!(load_gateway_config(file.path()), Err(TollgateError::Config(_))),
            "{name} should be rejected"
        );
    }
    Ok(())
}

#[test]
fn missing_file_is_a_config_error() {
    assert!(matches!(
        load_gateway_config("/nonexistent/tollgate/gateway.toml"),
        Err(TollgateError::Config(_))
    ));
}
