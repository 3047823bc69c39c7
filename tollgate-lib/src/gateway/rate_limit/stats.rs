use std::sync::atomic::{AtomicU64, Ordering};

/// Guard counters, updated lock-free on the request path
#[derive(Debug, Default)]
pub struct GuardStats {
    allowed: AtomicU64,
    denied: AtomicU64,
    errors: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    remote_calls: AtomicU64,
    remote_latency_micros: AtomicU64,
}

/// Point-in-time copy of [`GuardStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardStatsSnapshot {
    pub allowed: u64,
    pub denied: u64,
    pub errors: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Completed remote calls (success or failure)
    pub remote_calls: u64,
    /// Sum of remote call latencies in microseconds
    pub remote_latency_micros: u64,
}

impl GuardStatsSnapshot {
    pub fn mean_remote_latency_micros(&self) -> Option<u64> {
        self.remote_latency_micros.checked_div(self.remote_calls)
    }
}

impl GuardStats {
    pub fn record_allowed(&self) {
        self.allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_denied(&self) {
        self.denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_remote_call(&self, micros: u64) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        self.remote_latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GuardStatsSnapshot {
        GuardStatsSnapshot {
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            remote_latency_micros: self.remote_latency_micros.load(Ordering::Relaxed),
        }
    }
}
