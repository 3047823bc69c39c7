//! Wire types for `POST /limits/check` and the limit discovery endpoints

use serde::{Deserialize, Serialize};

use crate::config::RateConfig;
use crate::limiter::ConsumeResult;

/// Path of the check endpoint on the limiter service
pub const CHECK_PATH: &str = "/limits/check";

/// Request body of `POST /limits/check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Rate-limit key (`user:<id>` or `ip:<addr>`)
    pub key: String,
    /// Request path the decision applies to
    pub route: String,
    /// Tokens to take; defaults to 1
    #[serde(default = "default_weight")]
    pub weight: u32,
}

impl CheckRequest {
    pub fn new(key: impl Into<String>, route: impl Into<String>) -> Self {
        Self { key: key.into(), route: route.into(), weight: default_weight() }
    }

    /// Storage key of the bucket this request draws from
    pub fn bucket_key(&self) -> String {
        format!("{}::{}", self.key, self.route)
    }
}

fn default_weight() -> u32 {
    1
}

/// Response body of `POST /limits/check`
///
/// Decoding is lenient: a missing `allowed` means allowed, and absent quota
/// fields stay `None` so callers can skip the matching headers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    #[serde(default = "default_allowed")]
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_seconds: Option<i64>,
}

fn default_allowed() -> bool {
    true
}

impl From<ConsumeResult> for CheckResponse {
    fn from(r: ConsumeResult) -> Self {
        Self {
            allowed: r.allowed,
            remaining: Some(i64::from(r.remaining)),
            limit: Some(i64::from(r.limit)),
            reset_seconds: Some(i64::from(r.reset_seconds)),
        }
    }
}

/// Rate parameters as exposed on `/api/limits/route`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateView {
    pub replenish_rate: u32,
    pub burst_capacity: u32,
}

impl From<RateConfig> for RateView {
    fn from(r: RateConfig) -> Self {
        Self { replenish_rate: r.replenish_rate, burst_capacity: r.burst_capacity }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLimits {
    pub anonymous: RateView,
    pub authenticated: RateView,
}
