use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tollgate_lib::limiter::{serve_limits, CheckResponse};
use tollgate_lib::Result as TollgateResult;

use super::limits_config;

type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

struct LimitsServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<TollgateResult<()>>,
}

impl LimitsServer {
    async fn start(extra: &str) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let config = Arc::new(limits_config(extra)?);
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (stop, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_limits(listener, config, None, async move {
            let _ = rx.await;
        }));
        Ok(Self { addr, stop, handle })
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn shutdown(self) -> TestResult {
        let _ = self.stop.send(());
        self.handle.await??;
        Ok(())
    }
}

#[tokio::test]
async fn check_endpoint_returns_decision_in_body() -> TestResult {
    let server = LimitsServer::start(
        "[policy]\nanonymous = { replenish_rate = 1, burst_capacity = 2 }\n",
    )
    .await?;
    let client = reqwest::Client::new();

    let mut decisions = Vec::new();
    for _ in 0..3 {
        let resp = client
            .post(server.url("/limits/check"))
            .json(&json!({ "key": "ip:198.51.100.7", "route": "/api/polls" }))
            .send()
            .await?;
        assert_eq!(resp.status(), 200);
        decisions.push(resp.json::<CheckResponse>().await?);
    }

    assert!(decisions[0].allowed);
    assert_eq!(decisions[0].remaining, Some(1));
    assert_eq!(decisions[0].limit, Some(2));
    assert_eq!(decisions[0].reset_seconds, Some(60));
    assert!(decisions[1].allowed);
    assert!(!decisions[2].allowed);
    assert_eq!(decisions[2].remaining, Some(0));

    server.shutdown().await
}

#[tokio::test]
async fn check_endpoint_uses_camel_case_fields() -> TestResult {
    let server = LimitsServer::start("").await?;
    let body: Value = reqwest::Client::new()
        .post(server.url("/limits/check"))
        .json(&json!({ "key": "user:1", "route": "/api/votes", "weight": 2 }))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["allowed"], json!(true));
    assert_eq!(body["remaining"], json!(58));
    assert_eq!(body["limit"], json!(60));
    assert_eq!(body["resetSeconds"], json!(60));

    server.shutdown().await
}

#[tokio::test]
async fn malformed_check_is_bad_request() -> TestResult {
    let server = LimitsServer::start("").await?;
    let client = reqwest::Client::new();

    let resp = client
        .post(server.url("/limits/check"))
        .header("content-type", "application/json")
        .body("{\"route\": 7")
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await?;
    assert_eq!(body["success"], json!(false));

    let resp = client.get(server.url("/limits/check")).send().await?;
    assert_eq!(resp.status(), 405);

    server.shutdown().await
}

#[tokio::test]
async fn route_limits_and_features() -> TestResult {
    let server = LimitsServer::start("[features]\n\"voting.enabled\" = false\n").await?;
    let client = reqwest::Client::new();

    let limits: Value = client
        .get(server.url("/api/limits/route?path=%2Fapi%2Fpolls"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(limits["anonymous"], json!({ "replenishRate": 10, "burstCapacity": 20 }));
    assert_eq!(limits["authenticated"], json!({ "replenishRate": 30, "burstCapacity": 60 }));

    let outside: Value = client
        .get(server.url("/api/limits/route?path=/auth/sign-in"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(outside["anonymous"], outside["authenticated"]);

    let plus_encoded: Value = client
        .get(server.url("/api/limits/route?other=1&path=%2Fapi%2Fvotes%2Fa+b"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(plus_encoded, limits);

    for query in ["", "?path=", "?other=1"] {
        let resp = client.get(server.url(&format!("/api/limits/route{query}"))).send().await?;
        assert_eq!(resp.status(), 400, "query {query:?}");
    }

    let features: BTreeMap<String, bool> =
        client.get(server.url("/api/limits/features")).send().await?.json().await?;
    assert_eq!(features, BTreeMap::from([("voting.enabled".to_string(), false)]));

    let health: Value = client.get(server.url("/actuator/health")).send().await?.json().await?;
    assert_eq!(health, json!({ "status": "UP" }));

    let resp = client.get(server.url("/nope")).send().await?;
    assert_eq!(resp.status(), 404);

    server.shutdown().await
}

#[tokio::test]
async fn shutdown_closes_idle_keep_alive_connections() -> TestResult {
    let server = LimitsServer::start("").await?;
    let client = reqwest::Client::new();
    let resp = client.get(server.url("/actuator/health")).send().await?;
    assert_eq!(resp.status(), 200);
    resp.bytes().await?;

    // the client still holds its pooled connection; shutdown_secs is 30
    tokio::time::timeout(Duration::from_secs(5), server.shutdown()).await??;
    drop(client);
    Ok(())
}
