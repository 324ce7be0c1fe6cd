use http::{Method, StatusCode};
use shellac::endpoint::endpoint;
use shellac::error::HandlerError;
use shellac::headers::HeaderMap;
use shellac::request::Request;
use shellac::response::Response;
use shellac::router::{cors, Router};

fn ok(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    Ok(Response::new(StatusCode::OK))
}

fn router(routes: &[(Method, &str)]) -> Router {
    let endpoints = routes
        .iter()
        .map(|(method, path)| endpoint(method.clone(), *path, ok).build())
        .collect();
    Router::new(endpoints).expect("route table")
}

fn params(router: &Router, method: Method, path: &str) -> Option<Vec<(String, String)>> {
    let matched = router.route(&method, path)?;
    Some(
        matched
            .path_params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

#[test]
fn single_segment_captures() {
    let r = router(&[(Method::GET, "/api/:root/:id")]);
    let caps = params(&r, Method::GET, "/api/x/123").unwrap();
    assert_eq!(
        caps,
        vec![
            ("root".to_string(), "x".to_string()),
            ("id".to_string(), "123".to_string())
        ]
    );
    assert!(params(&r, Method::GET, "/api/x").is_none());
}

#[test]
fn catch_all_matches_zero_or_more() {
    let r = router(&[(Method::GET, "/files/:rest*")]);
    for (path, expected) in [("/files/", ""), ("/files/a", "a"), ("/files/a/b/c", "a/b/c")] {
        let caps = params(&r, Method::GET, path).unwrap();
        assert_eq!(caps, vec![("rest".to_string(), expected.to_string())]);
    }
}

#[test]
fn method_participates_in_matching() {
    let r = router(&[(Method::GET, "/tracks"), (Method::POST, "/tracks")]);
    assert!(r.route(&Method::GET, "/tracks").is_some());
    assert!(r.route(&Method::POST, "/tracks").is_some());
    assert!(r.route(&Method::DELETE, "/tracks").is_none());
}

#[test]
fn registration_order_breaks_overlaps() {
    // Literal registered before the catch-all that would shadow it.
    let r = router(&[(Method::GET, "/a/b"), (Method::GET, "/a/:rest*")]);
    let matched = r.route(&Method::GET, "/a/b").unwrap();
    assert_eq!(matched.route.pattern, "/a/b");
    assert_eq!(matched.route.index, 0);

    let matched = r.route(&Method::GET, "/a/b/c").unwrap();
    assert_eq!(matched.route.pattern, "/a/:rest*");
}

#[test]
fn options_union_is_ordered_and_stable() {
    let r = router(&[(Method::GET, "/songs"), (Method::POST, "/songs")]);
    let methods = r.options("*");
    assert_eq!(methods, vec![Method::OPTIONS, Method::GET, Method::POST]);

    // Same union when asking for the concrete path.
    assert_eq!(r.options("/songs"), methods);
    // Unknown path only ever allows OPTIONS itself.
    assert_eq!(r.options("/nope"), vec![Method::OPTIONS]);
}

#[test]
fn plain_options_gets_allow_only() {
    let r = router(&[(Method::GET, "/songs"), (Method::POST, "/songs")]);
    let resp = cors::options_response(&r, "*", &HeaderMap::new());
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers.get("allow"), Some("OPTIONS, GET, POST"));
    assert!(resp.headers.get("access-control-allow-methods").is_none());
}

#[test]
fn preflight_synthesizes_cors_headers() {
    let r = router(&[(Method::GET, "/songs"), (Method::POST, "/songs")]);
    let mut request_headers = HeaderMap::new();
    request_headers.set("access-control-request-method", "POST");
    request_headers.set("access-control-request-headers", "X-Request-Id");

    let resp = cors::options_response(&r, "/songs", &request_headers);
    assert_eq!(resp.headers.get("allow"), Some("OPTIONS, GET, POST"));
    assert_eq!(resp.headers.get("access-control-allow-origin"), Some("*"));
    assert_eq!(
        resp.headers.get("access-control-allow-methods"),
        Some("OPTIONS, GET, POST")
    );
    assert_eq!(
        resp.headers.get("access-control-allow-headers"),
        Some("Content-Type, Authorization, X-Request-Id")
    );
    assert_eq!(resp.headers.get("access-control-max-age"), Some("86400"));
}

#[test]
fn bad_patterns_fail_at_build_time() {
    let result = Router::new(vec![endpoint(Method::GET, "/a/:rest*/b", ok).build()]);
    assert!(result.is_err());
    let result = Router::new(vec![endpoint(Method::GET, "no-leading-slash", ok).build()]);
    assert!(result.is_err());
}
