use tollgate_lib::config::{load_limits_config, RateConfig};
use tollgate_lib::TollgateError;

use super::write_config;

#[test]
fn loads_limits_defaults() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = write_config(r#"listen = "127.0.0.1:0""#)?;

    let cfg = load_limits_config(file.path())?;
    assert_eq!(cfg.policy.protected_prefix, "/api/");
    assert_eq!(cfg.policy.anonymous, RateConfig::new(10, 20));
    assert_eq!(cfg.policy.authenticated, RateConfig::new(30, 60));
    assert_eq!(cfg.policy.default, RateConfig::new(20, 40));
    assert_eq!(cfg.reset_seconds, 60);
    assert_eq!(cfg.features.get("createPoll.enabled"), Some(&true));
    assert_eq!(cfg.features.get("voting.enabled"), Some(&true));
    Ok(())
}

#[test]
fn overrides_policy_and_features() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"
reset_seconds = 30

[policy]
protected_prefix = "/v2/"
anonymous = { replenish_rate = 1, burst_capacity = 2 }

[features]
"voting.enabled" = false
"#,
    )?;

    let cfg = load_limits_config(file.path())?;
    assert_eq!(cfg.reset_seconds, 30);
    assert_eq!(cfg.policy.protected_prefix, "/v2/");
    assert_eq!(cfg.policy.anonymous, RateConfig::new(1, 2));
    assert_eq!(cfg.policy.authenticated, RateConfig::new(30, 60));
    assert_eq!(cfg.features.len(), 1);
    assert_eq!(cfg.features.get("voting.enabled"), Some(&false));
    Ok(())
}

#[test]
fn zero_capacity_is_rejected() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let file = write_config(
        r#"
listen = "127.0.0.1:0"

[policy]
authenticated = { replenish_rate = 5, burst_capacity = 0 }
"#,
    )?;

    match load_limits_config(file.path()) {
        Err(TollgateError::Config(msg)) => assert!(msg.contains("authenticated"), "{msg}"),
        other => return Err(format!("expected config error, got {other:?}").into()),
    }
    Ok(())
}
