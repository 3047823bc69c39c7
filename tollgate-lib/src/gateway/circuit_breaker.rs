//! Count-based circuit breaker around calls to the limits service

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::CircuitBreakerConfig;
use crate::telemetry::Metrics;

/// Clock abstraction so timing can be faked in tests
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_millis(&self) -> u64;
}

/// Monotonic clock backed by `Instant::now()`
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for MonotonicClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Permission to make one call
///
/// Outcomes recorded with a permit from an earlier state generation are
/// ignored, so late completions cannot trigger a second transition.
#[derive(Debug)]
#[must_use]
pub struct Permit {
    generation: u64,
}

/// Permit tied to its breaker
///
/// Dropping it without reporting an outcome (a panicking or cancelled call)
/// records a failure, so a half-open probe slot is never lost.
#[must_use]
pub struct TrackedPermit {
    breaker: Arc<CircuitBreaker>,
    permit: Option<Permit>,
}

impl TrackedPermit {
    pub fn success(mut self) {
        if let Some(permit) = self.permit.take() {
            self.breaker.record_success(permit);
        }
    }

    pub fn failure(mut self) {
        if let Some(permit) = self.permit.take() {
            self.breaker.record_failure(permit);
        }
    }
}

impl Drop for TrackedPermit {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            debug!("Circuit breaker permit dropped without an outcome");
            self.breaker.record_failure(permit);
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    generation: u64,
    /// `true` marks a failed call; newest at the back
    window: VecDeque<bool>,
    opened_at_millis: u64,
    half_open_admitted: usize,
    half_open_succeeded: usize,
}

/// Sliding-window circuit breaker
///
/// CLOSED opens once at least `minimum_calls` outcomes are in the window and
/// the failure rate reaches the threshold. OPEN admits nothing until the wait
/// duration elapses, then HALF_OPEN admits up to `permitted_calls_half_open`
/// probes: all of them succeeding closes the breaker, any failure reopens it.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                generation: 0,
                window: VecDeque::with_capacity(config.sliding_window_size),
                opened_at_millis: 0,
                half_open_admitted: 0,
                half_open_succeeded: 0,
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
            metrics: None,
        }
    }

    /// Override the clock (useful for deterministic tests)
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<Metrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current state, moving OPEN to HALF_OPEN if the wait has elapsed
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// Ask to make a call; `None` means the call must not be made
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        match inner.state {
            CircuitState::Closed => Some(Permit { generation: inner.generation }),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                if inner.half_open_admitted >= self.config.permitted_calls_half_open {
                    return None;
                }
                inner.half_open_admitted += 1;
                debug!(
                    admitted = inner.half_open_admitted,
                    max = self.config.permitted_calls_half_open,
                    "Circuit breaker: half-open probe"
                );
                Some(Permit { generation: inner.generation })
            }
        }
    }

    /// Like [`CircuitBreaker::try_acquire`], but the permit reports a failure
    /// if it is dropped unused
    pub fn try_acquire_tracked(self: &Arc<Self>) -> Option<TrackedPermit> {
        self.try_acquire()
            .map(|permit| TrackedPermit { breaker: Arc::clone(self), permit: Some(permit) })
    }

    /// Number of state transitions so far
    pub fn transitions(&self) -> u64 {
        self.lock().generation
    }

    pub fn record_success(&self, permit: Permit) {
        self.record(permit, true);
    }

    pub fn record_failure(&self, permit: Permit) {
        self.record(permit, false);
    }

    fn record(&self, permit: Permit, success: bool) {
        let mut inner = self.lock();
        if permit.generation != inner.generation {
            return;
        }
        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back(!success);
                while inner.window.len() > self.config.sliding_window_size {
                    inner.window.pop_front();
                }
                let calls = inner.window.len();
                let min_calls = self.config.minimum_calls.min(self.config.sliding_window_size);
                if calls >= min_calls {
                    let failures = inner.window.iter().filter(|failed| **failed).count();
                    let rate = failures as f64 * 100.0 / calls as f64;
                    if rate >= self.config.failure_rate_threshold {
                        warn!(failures, calls, rate, "Circuit breaker opened");
                        self.transition(&mut inner, CircuitState::Open);
                    }
                }
            }
            CircuitState::HalfOpen => {
                if success {
                    inner.half_open_succeeded += 1;
                    if inner.half_open_succeeded >= self.config.permitted_calls_half_open {
                        info!("Circuit breaker closed");
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                } else {
                    warn!("Circuit breaker probe failed, reopening");
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn maybe_half_open(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = self.clock.now_millis().saturating_sub(inner.opened_at_millis);
        if elapsed >= self.config.wait_duration_open_ms {
            info!(elapsed_ms = elapsed, "Circuit breaker half-open");
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        inner.state = to;
        inner.generation = inner.generation.wrapping_add(1);
        inner.window.clear();
        inner.half_open_admitted = 0;
        inner.half_open_succeeded = 0;
        if to == CircuitState::Open {
            inner.opened_at_millis = self.clock.now_millis();
        }
        if let Some(ref m) = self.metrics {
            m.record_circuit_transition(to.as_str());
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
