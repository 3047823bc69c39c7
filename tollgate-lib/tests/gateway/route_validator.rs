use http::Method;
use tollgate_lib::config::AuthConfig;
use tollgate_lib::gateway::RouteValidator;

#[test]
fn default_classification_table() {
    let validator = RouteValidator::from_config(&AuthConfig::default());

    let cases = [
        ("/auth/sign-in", Method::POST, false),
        ("/auth/sign-up", Method::POST, false),
        ("/auth/sign-in/extra", Method::POST, true),
        ("/actuator", Method::GET, false),
        ("/actuator/health", Method::GET, false),
        ("/api/polls", Method::GET, false),
        ("/api/polls/12", Method::GET, false),
        ("/api/polls", Method::POST, true),
        ("/api/polls/12", Method::DELETE, true),
        ("/api/pollsters", Method::GET, true),
        ("/api/votes", Method::GET, true),
        ("/api/users/me", Method::GET, true),
    ];

    for (path, method, secured) in cases {
        assert_eq!(
            validator.is_secured(path, &method),
            secured,
            "{method} {path} secured should be {secured}"
        );
        assert_eq!(validator.is_open(path, &method), !secured);
    }
}

#[test]
fn custom_open_prefixes() {
    let validator = RouteValidator::new(
        &["/public/".to_string(), "/login".to_string()],
        &["/catalog/".to_string()],
    );

    assert!(validator.is_open("/public/anything/deep", &Method::PUT));
    assert!(validator.is_open("/login", &Method::POST));
    assert!(validator.is_secured("/login/reset", &Method::POST));
    assert!(validator.is_open("/catalog/items", &Method::GET));
    assert!(validator.is_open("/catalog", &Method::GET));
    assert!(validator.is_secured("/catalog/items", &Method::POST));
}
