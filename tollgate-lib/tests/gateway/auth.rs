use std::time::Duration;

use jsonwebtoken::{get_current_timestamp, Algorithm};
use serde_json::json;
use tollgate_lib::config::AuthConfig;
use tollgate_lib::gateway::headers::names;
use tollgate_lib::gateway::{
    AuthEnforcer, AuthError, Claims, FilterContext, FilterOutcome, GatewayFilter, TokenSigner,
    TokenVerifier,
};

use super::{json_body, parts, peer, TestResult};

const SECRET: &[u8] = b"a-test-secret-that-is-at-least-32-bytes";

fn enforcer(issuer: Option<&str>) -> Result<AuthEnforcer, tollgate_lib::TollgateError> {
    let config = AuthConfig {
        secret: Some(String::from_utf8_lossy(SECRET).into_owned()),
        issuer: issuer.map(str::to_string),
        ..AuthConfig::default()
    };
    AuthEnforcer::from_config(&config, None)
}

fn signer() -> TokenSigner {
    TokenSigner::new(SECRET, None, Duration::from_secs(300))
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn secured_route_without_token_is_401() -> TestResult {
    let auth = enforcer(None)?;
    let mut p = parts("POST", "/api/votes", &[])?;
    let mut ctx = FilterContext::new(peer());

    let FilterOutcome::Respond(resp) = auth.apply(&mut p, &mut ctx).await else {
        return Err("expected 401".into());
    };
    assert_eq!(resp.status(), 401);
    let body = json_body(resp).await?;
    assert_eq!(body, json!({ "success": false, "message": "Missing or invalid Authorization header" }));
    Ok(())
}

#[tokio::test]
async fn valid_token_injects_identity_headers() -> TestResult {
    let auth = enforcer(None)?;
    let token = signer().sign("42", "ada@example.com", &["ROLE_USER", "ROLE_ADMIN"])?;
    let mut p = parts("POST", "/api/votes", &[("authorization", &bearer(&token))])?;

    let identity = auth.enforce(&mut p)?.ok_or("identity missing")?;
    assert_eq!(identity.subject, "42");
    assert_eq!(p.headers.get(names::X_USER_ID).ok_or("no user id")?, "42");
    assert_eq!(p.headers.get(names::X_USER_EMAIL).ok_or("no email")?, "ada@example.com");
    assert_eq!(p.headers.get(names::X_USER_ROLES).ok_or("no roles")?, "ROLE_USER,ROLE_ADMIN");
    Ok(())
}

#[tokio::test]
async fn array_roles_are_accepted() -> TestResult {
    let auth = enforcer(None)?;
    let now = get_current_timestamp();
    let token = signer().sign_claims(&Claims {
        sub: Some("7".into()),
        roles: Some(json!(["ROLE_USER", "ROLE_USER", "ROLE_MOD"])),
        iat: Some(now),
        exp: Some(now + 60),
        ..Claims::default()
    })?;
    let mut p = parts("DELETE", "/api/polls/3", &[("authorization", &bearer(&token))])?;

    let identity = auth.enforce(&mut p)?.ok_or("identity missing")?;
    assert_eq!(identity.roles, vec!["ROLE_USER".to_string(), "ROLE_MOD".to_string()]);
    assert_eq!(identity.email, "");
    Ok(())
}

#[tokio::test]
async fn expired_token_is_rejected_on_secured_route() -> TestResult {
    let auth = enforcer(None)?;
    let now = get_current_timestamp();
    let token = signer().sign_claims(&Claims {
        sub: Some("42".into()),
        exp: Some(now - 120),
        ..Claims::default()
    })?;
    let mut p = parts("POST", "/api/votes", &[("authorization", &bearer(&token))])?;

    assert_eq!(auth.enforce(&mut p), Err(AuthError::Expired));

    let mut ctx = FilterContext::new(peer());
    let FilterOutcome::Respond(resp) = auth.apply(&mut p, &mut ctx).await else {
        return Err("expected 401".into());
    };
    assert_eq!(json_body(resp).await?["message"], "Token expired");
    Ok(())
}

#[tokio::test]
async fn bad_token_on_open_route_passes_anonymously() -> TestResult {
    let auth = enforcer(None)?;
    let mut p = parts("GET", "/api/polls/1", &[("authorization", "Bearer not.a.jwt")])?;

    assert_eq!(auth.enforce(&mut p)?, None);
    assert!(p.headers.get(names::X_USER_ID).is_none());

    let mut ctx = FilterContext::new(peer());
    assert!(matches!(auth.apply(&mut p, &mut ctx).await, FilterOutcome::Continue));
    Ok(())
}

#[tokio::test]
async fn valid_token_on_open_route_still_propagates_identity() -> TestResult {
    let auth = enforcer(None)?;
    let token = signer().sign("5", "eve@example.com", &["ROLE_USER"])?;
    let mut p = parts("GET", "/api/polls", &[("authorization", &bearer(&token))])?;

    assert!(auth.enforce(&mut p)?.is_some());
    assert_eq!(p.headers.get(names::X_USER_ID).ok_or("no user id")?, "5");
    Ok(())
}

#[test]
fn signature_and_shape_errors() -> TestResult {
    let verifier = TokenVerifier::new(SECRET, None);
    let other = TokenSigner::new(b"another-secret-of-sufficient-length!!", None, Duration::from_secs(60));

    let forged = other.sign("1", "x@example.com", &[])?;
    assert_eq!(verifier.verify(&forged), Err(AuthError::InvalidSignature));
    assert_eq!(verifier.verify("garbage"), Err(AuthError::Malformed));
    Ok(())
}

#[test]
fn all_hmac_algorithms_verify() -> TestResult {
    let verifier = TokenVerifier::new(SECRET, None);
    for algorithm in [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512] {
        let token = signer().with_algorithm(algorithm).sign("9", "", &[])?;
        assert_eq!(verifier.verify(&token)?.subject, "9", "{algorithm:?}");
    }
    Ok(())
}

#[test]
fn short_secrets_are_stretched_consistently() -> TestResult {
    let verifier = TokenVerifier::new(b"short", None);
    let token = TokenSigner::new(b"short", None, Duration::from_secs(60)).sign("3", "", &[])?;
    assert_eq!(verifier.verify(&token)?.subject, "3");
    Ok(())
}

#[test]
fn issuer_is_enforced_when_configured() -> TestResult {
    let verifier = TokenVerifier::new(SECRET, Some("user-service".into()));

    let good = TokenSigner::new(SECRET, Some("user-service".into()), Duration::from_secs(60))
        .sign("1", "", &[])?;
    assert!(verifier.verify(&good).is_ok());

    let wrong = TokenSigner::new(SECRET, Some("intruder".into()), Duration::from_secs(60))
        .sign("1", "", &[])?;
    assert_eq!(verifier.verify(&wrong), Err(AuthError::IssuerMismatch));

    let missing = signer().sign("1", "", &[])?;
    assert_eq!(verifier.verify(&missing), Err(AuthError::IssuerMismatch));
    Ok(())
}

#[test]
fn missing_secret_is_a_config_error() {
    assert!(AuthEnforcer::from_config(&AuthConfig::default(), None).is_err());
}
