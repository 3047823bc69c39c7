use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tollgate_lib::config::{CircuitBreakerConfig, RateLimitConfig};
use tollgate_lib::gateway::headers::names;
use tollgate_lib::gateway::{
    CircuitState, Decision, FilterContext, FilterOutcome, GatewayFilter, LimiterBackend, LimiterError,
    RateLimitGuard,
};
use tollgate_lib::limiter::{CheckRequest, CheckResponse};

use super::{json_body, parts, peer, TestResult};

#[derive(Debug, Clone)]
enum Mode {
    Allow,
    Deny,
    Fail,
    Hang,
    Slow,
    Panic,
}

struct ScriptedBackend {
    mode: Mutex<Mode>,
    calls: AtomicUsize,
    seen: Mutex<Vec<CheckRequest>>,
}

impl ScriptedBackend {
    fn new(mode: Mode) -> Arc<Self> {
        Arc::new(Self { mode: Mutex::new(mode), calls: AtomicUsize::new(0), seen: Mutex::default() })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LimiterBackend for ScriptedBackend {
    async fn check(&self, req: &CheckRequest) -> Result<CheckResponse, LimiterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req.clone());
        }
        let mode = self.mode.lock().map(|m| m.clone()).unwrap_or(Mode::Fail);
        match mode {
            Mode::Allow => Ok(CheckResponse {
                allowed: true,
                remaining: Some(9),
                limit: Some(10),
                reset_seconds: Some(60),
            }),
            Mode::Deny => Ok(CheckResponse {
                allowed: false,
                remaining: Some(0),
                limit: Some(10),
                reset_seconds: Some(60),
            }),
            Mode::Fail => Err(LimiterError::Status(500)),
            Mode::Slow => {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(CheckResponse {
                    allowed: true,
                    remaining: Some(9),
                    limit: Some(10),
                    reset_seconds: Some(60),
                })
            }
            Mode::Panic => panic!("limits backend bug"),
            Mode::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(LimiterError::Transport("unreachable".into()))
            }
        }
    }
}

fn config(fail_open: bool) -> RateLimitConfig {
    RateLimitConfig {
        timeout_ms: 50,
        fail_open,
        cache_ttl_ms: 60_000,
        circuit_breaker: CircuitBreakerConfig {
            sliding_window_size: 2,
            minimum_calls: 2,
            wait_duration_open_ms: 60_000,
            ..CircuitBreakerConfig::default()
        },
        ..RateLimitConfig::default()
    }
}

fn guard(backend: &Arc<ScriptedBackend>, fail_open: bool) -> RateLimitGuard {
    guard_with(backend, &config(fail_open))
}

fn guard_with(backend: &Arc<ScriptedBackend>, config: &RateLimitConfig) -> RateLimitGuard {
    RateLimitGuard::new(config, Arc::clone(backend) as Arc<dyn LimiterBackend>, None)
}

#[tokio::test]
async fn allowed_decision_is_cached() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Allow);
    let guard = guard(&backend, true);

    for _ in 0..3 {
        assert!(matches!(guard.decide("ip:192.0.2.10", "/api/polls").await, Decision::Allowed(_)));
    }
    assert_eq!(backend.calls(), 1);

    let stats = guard.stats();
    assert_eq!(stats.allowed, 3);
    assert_eq!(stats.cache_hits, 2);
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.remote_calls, 1);

    // different route, different bucket
    guard.decide("ip:192.0.2.10", "/api/votes").await;
    assert_eq!(backend.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn allowed_request_carries_quota_headers() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Allow);
    let guard = guard(&backend, true);
    let mut p = parts("GET", "/api/polls?page=2", &[("x-user-id", "42")])?;
    let mut ctx = FilterContext::new(peer());

    assert!(matches!(guard.apply(&mut p, &mut ctx).await, FilterOutcome::Continue));
    assert_eq!(ctx.response_headers.get(names::X_RATE_REMAINING).ok_or("remaining")?, "9");
    assert_eq!(ctx.response_headers.get(names::X_RATE_LIMIT_LIMIT).ok_or("limit")?, "10");
    assert_eq!(ctx.response_headers.get(names::X_RATE_LIMIT_RESET).ok_or("reset")?, "60");

    let seen = backend.seen.lock().map_err(|_| "poisoned")?.clone();
    assert_eq!(seen, vec![CheckRequest::new("user:42", "/api/polls")]);
    Ok(())
}

#[tokio::test]
async fn denial_is_429_and_cached() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Deny);
    let guard = guard(&backend, true);

    for _ in 0..2 {
        let mut p = parts("POST", "/api/votes", &[])?;
        let mut ctx = FilterContext::new(peer());
        let FilterOutcome::Respond(resp) = guard.apply(&mut p, &mut ctx).await else {
            return Err("expected 429".into());
        };
        assert_eq!(resp.status(), 429);
        assert_eq!(resp.headers().get(names::X_RATE_REMAINING).ok_or("remaining")?, "0");
        assert_eq!(json_body(resp).await?["message"], "Rate limit exceeded");
    }
    assert_eq!(backend.calls(), 1);
    assert_eq!(guard.stats().denied, 2);

    let seen = backend.seen.lock().map_err(|_| "poisoned")?.clone();
    assert_eq!(seen[0].key, "ip:192.0.2.10");
    Ok(())
}

#[tokio::test]
async fn backend_failure_fails_open() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Fail);
    let guard = guard(&backend, true);

    assert_eq!(
        guard.decide("ip:192.0.2.10", "/api/polls").await,
        Decision::Degraded(LimiterError::Status(500))
    );

    let mut p = parts("GET", "/api/polls", &[])?;
    let mut ctx = FilterContext::new(peer());
    assert!(matches!(guard.apply(&mut p, &mut ctx).await, FilterOutcome::Continue));
    assert!(ctx.response_headers.is_empty());
    assert_eq!(guard.stats().errors, 2);
    Ok(())
}

#[tokio::test]
async fn backend_failure_fails_closed() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Fail);
    let guard = guard(&backend, false);

    let mut p = parts("GET", "/api/polls", &[])?;
    let mut ctx = FilterContext::new(peer());
    let FilterOutcome::Respond(resp) = guard.apply(&mut p, &mut ctx).await else {
        return Err("expected 503".into());
    };
    assert_eq!(resp.status(), 503);
    assert_eq!(json_body(resp).await?["message"], "Limits service unavailable");
    Ok(())
}

#[tokio::test]
async fn slow_backend_times_out() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Hang);
    let guard = guard(&backend, true);

    let decision = tokio::time::timeout(
        Duration::from_secs(2),
        guard.decide("ip:192.0.2.10", "/api/polls"),
    )
    .await?;
    assert_eq!(decision, Decision::Degraded(LimiterError::Timeout));
    Ok(())
}

#[tokio::test]
async fn open_circuit_skips_backend_until_it_recovers() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Fail);
    let guard = guard(&backend, true);

    guard.decide("ip:192.0.2.1", "/api/polls").await;
    guard.decide("ip:192.0.2.2", "/api/polls").await;
    assert_eq!(backend.calls(), 2);

    if let Ok(mut mode) = backend.mode.lock() {
        *mode = Mode::Allow;
    }
    assert_eq!(
        guard.decide("ip:192.0.2.3", "/api/polls").await,
        Decision::Degraded(LimiterError::CircuitOpen)
    );
    assert_eq!(backend.calls(), 2);
    assert_eq!(guard.breaker().state(), CircuitState::Open);
    Ok(())
}

#[tokio::test]
async fn abandoned_request_still_fills_the_cache() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Slow);
    let guard = Arc::new(guard_with(&backend, &RateLimitConfig { timeout_ms: 1000, ..config(true) }));

    let caller = {
        let guard = Arc::clone(&guard);
        tokio::spawn(async move { guard.decide("ip:192.0.2.10", "/api/polls").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    caller.abort();
    assert!(caller.await.is_err_and(|e| e.is_cancelled()));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(matches!(guard.decide("ip:192.0.2.10", "/api/polls").await, Decision::Allowed(_)));
    assert_eq!(backend.calls(), 1);
    assert_eq!(guard.stats().cache_hits, 1);
    assert_eq!(guard.breaker().state(), CircuitState::Closed);
    Ok(())
}

#[tokio::test]
async fn panicking_backend_counts_as_failure() -> TestResult {
    let backend = ScriptedBackend::new(Mode::Panic);
    let guard = guard(&backend, true);

    for ip in ["ip:192.0.2.1", "ip:192.0.2.2"] {
        let decision = guard.decide(ip, "/api/polls").await;
        assert!(matches!(decision, Decision::Degraded(LimiterError::Transport(_))), "{decision:?}");
    }
    assert_eq!(guard.breaker().state(), CircuitState::Open);
    assert_eq!(
        guard.decide("ip:192.0.2.3", "/api/polls").await,
        Decision::Degraded(LimiterError::CircuitOpen)
    );
    assert_eq!(backend.calls(), 2);
    Ok(())
}
