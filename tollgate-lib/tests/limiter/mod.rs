mod http;

use tollgate_lib::LimitsConfig;

pub fn limits_config(extra: &str) -> Result<LimitsConfig, Box<dyn std::error::Error + Send + Sync>> {
    Ok(toml::from_str(&format!("listen = \"127.0.0.1:0\"\n{extra}"))?)
}
