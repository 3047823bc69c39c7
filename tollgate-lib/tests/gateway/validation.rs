use tollgate_lib::gateway::{FilterContext, FilterOutcome, GatewayFilter, ValidationFilter};

use super::{json_body, parts, peer, TestResult};

#[test]
fn write_methods_need_json_content_type() -> TestResult {
    let cases = [
        ("POST", Some("application/json"), true),
        ("POST", Some("Application/JSON; charset=utf-8"), true),
        ("PUT", Some("application/problem+json"), true),
        ("POST", Some("application/vnd.api+json; charset=utf-8"), true),
        ("POST", Some("application/jsonp"), false),
        ("POST", Some("text/plain; note=application/json"), false),
        ("POST", Some("application/+json"), false),
        ("PATCH", Some("text/plain"), false),
        ("POST", None, false),
        ("GET", None, true),
        ("DELETE", Some("text/plain"), true),
    ];

    for (method, content_type, ok) in cases {
        let headers: Vec<(&str, &str)> =
            content_type.map(|ct| vec![("content-type", ct)]).unwrap_or_default();
        let p = parts(method, "/api/polls", &headers)?;
        assert_eq!(ValidationFilter::check(&p), ok, "{method} {content_type:?}");
    }
    Ok(())
}

#[tokio::test]
async fn rejection_body() -> TestResult {
    let filter = ValidationFilter::default();
    let mut p = parts("POST", "/api/votes", &[("content-type", "text/plain")])?;
    let mut ctx = FilterContext::new(peer());

    let FilterOutcome::Respond(resp) = filter.apply(&mut p, &mut ctx).await else {
        return Err("expected rejection".into());
    };
    assert_eq!(resp.status(), 400);
    let body = json_body(resp).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Content-Type must be application/json");
    Ok(())
}
