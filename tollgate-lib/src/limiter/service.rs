use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::debug;

use crate::config::{LimitsConfig, RateConfig, RatePolicyConfig};
use crate::limiter::policy::{CallerClass, RatePolicy};
use crate::limiter::protocol::{CheckRequest, RouteLimits};
use crate::limiter::{ConsumeResult, TokenBucket};

type BucketMap = DashMap<String, Arc<Mutex<TokenBucket>>, ahash::RandomState>;

/// Keyed token buckets behind the `/limits/check` endpoint
///
/// A bucket is created the first time its key is seen, with the rate
/// parameters of that first call. Later calls with different parameters reuse
/// the existing bucket unchanged.
pub struct RateLimiterService {
    buckets: BucketMap,
    policy: RatePolicy,
    reset_seconds: u32,
}

impl RateLimiterService {
    pub fn new(policy: RatePolicyConfig, reset_seconds: u32) -> Self {
        Self {
            buckets: DashMap::with_hasher(ahash::RandomState::new()),
            policy: RatePolicy::new(policy),
            reset_seconds,
        }
    }

    pub fn from_config(config: &LimitsConfig) -> Self {
        Self::new(config.policy.clone(), config.reset_seconds)
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    /// Take `weight` tokens from the bucket stored under `bucket_key`
    ///
    /// Consumes on the bucket are serialized; distinct buckets proceed in
    /// parallel.
    pub fn consume(&self, bucket_key: &str, weight: u32, rate: RateConfig) -> ConsumeResult {
        let bucket = self.bucket(bucket_key, rate);
        let mut bucket = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        let allowed = bucket.try_consume(weight);
        ConsumeResult {
            allowed,
            remaining: bucket.available(),
            limit: bucket.capacity(),
            reset_seconds: self.reset_seconds,
        }
    }

    /// Resolve the caller class and rate for a check request, then consume
    pub fn check(&self, req: &CheckRequest) -> ConsumeResult {
        let class = CallerClass::of_key(&req.key);
        let rate = self.policy.rate_for(class, &req.route);
        let result = self.consume(&req.bucket_key(), req.weight, rate);
        debug!(
            key = %req.key,
            route = %req.route,
            class = class.as_str(),
            allowed = result.allowed,
            remaining = result.remaining,
            "rate limit check"
        );
        result
    }

    pub fn route_limits(&self, route: &str) -> RouteLimits {
        self.policy.route_limits(route)
    }

    /// Number of buckets created so far
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn bucket(&self, bucket_key: &str, rate: RateConfig) -> Arc<Mutex<TokenBucket>> {
        if let Some(existing) = self.buckets.get(bucket_key) {
            return Arc::clone(existing.value());
        }
        let entry = self.buckets.entry(bucket_key.to_string()).or_insert_with(|| {
            Arc::new(Mutex::new(TokenBucket::new(rate.replenish_rate, rate.burst_capacity)))
        });
        Arc::clone(entry.value())
    }
}

impl Default for RateLimiterService {
    fn default() -> Self {
        Self::new(RatePolicyConfig::default(), 60)
    }
}
