mod common;

use common::head_and_wire;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use shellac::body;
use shellac::dispatcher::Dispatcher;
use shellac::endpoint::{endpoint, BodySpec, EndpointDescriptor, ParamSpec, ParamType};
use shellac::error::HandlerError;
use shellac::registry::Registry;
use shellac::request::Request;
use shellac::response::{Payload, Response};
use shellac::router::Router;
use shellac::security::{BasicAuth, Principal};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("track {0} is not in the library")]
struct TrackMissing(u64);

#[derive(Debug, Error)]
#[error("scan interrupted")]
struct ScanInterrupted;

fn body_json(resp: &Response) -> Value {
    match &resp.payload {
        Payload::Bytes(b) => serde_json::from_slice(b).expect("JSON body"),
        other => panic!("expected bytes payload, got {other:?}"),
    }
}

/// Route a scripted raw request through a dispatcher and return the
/// response.
fn run(raw: &str, endpoints: Vec<EndpointDescriptor>, registry: Registry) -> Response {
    let router = Router::new(endpoints).expect("route table");
    let dispatcher = Dispatcher::new(registry);

    let (head, mut wire) = head_and_wire(raw);
    let method = head.method.clone();
    let path = head.path.clone();
    let body = body::attach(&mut wire, &head).expect("body");
    let mut req = Request::new(head, body, None);

    match router.route(&method, &path) {
        Some(matched) => dispatcher.dispatch(&mut req, &matched),
        None => Response::error(StatusCode::NOT_FOUND, "endpoint not found"),
    }
}

fn ok(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    Ok(Response::json(StatusCode::OK, &json!({"ok": true})))
}

#[test]
fn unknown_path_is_404_with_error_body() {
    let resp = run(
        "GET /nope HTTP/1.1\r\n\r\n",
        vec![endpoint(Method::GET, "/ping", ok).build()],
        Registry::new(),
    );
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(body_json(&resp), json!({"error": "endpoint not found"}));
}

#[test]
fn protected_endpoint_without_credentials_is_401() {
    let mut registry = Registry::new();
    registry.register_strategy(Arc::new(BasicAuth::new(|user, pass| {
        (user == "ada" && pass == "pw").then(|| Principal::new("ada"))
    })));
    let endpoints = vec![endpoint(Method::GET, "/library", ok).auth(&[]).build()];

    let resp = run("GET /library HTTP/1.1\r\n\r\n", endpoints, registry);
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(&resp), json!({"error": "unauthorized"}));
}

#[test]
fn strategies_are_tried_in_registration_order() {
    fn whoami(req: &mut Request<'_>) -> Result<Response, HandlerError> {
        let id = req.principal.as_ref().map(|p| p.id.clone()).unwrap_or_default();
        Ok(Response::json(StatusCode::OK, &json!({ "id": id })))
    }

    let mut registry = Registry::new();
    registry.register_strategy(Arc::new(BasicAuth::new(|_, _| {
        Some(Principal::new("from-basic"))
    })));
    registry.register_strategy(Arc::new(BasicAuth::new(|_, _| {
        Some(Principal::new("from-second"))
    })));
    let endpoints = vec![endpoint(Method::GET, "/whoami", whoami).auth(&[]).build()];

    // "x:y"
    let resp = run(
        "GET /whoami HTTP/1.1\r\nAuthorization: Basic eDp5\r\n\r\n",
        endpoints,
        registry,
    );
    assert_eq!(body_json(&resp), json!({"id": "from-basic"}));
}

#[test]
fn missing_required_query_parameter_is_400_naming_it() {
    let endpoints = vec![endpoint(Method::GET, "/search", ok)
        .query(ParamSpec::new("q", ParamType::Str).required())
        .build()];
    let resp = run("GET /search HTTP/1.1\r\n\r\n", endpoints, Registry::new());
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let msg = body_json(&resp)["error"].as_str().unwrap().to_string();
    assert!(msg.contains('q'), "diagnostic should name the parameter: {msg}");
}

#[test]
fn invalid_query_value_is_400() {
    let endpoints = vec![endpoint(Method::GET, "/search", ok)
        .query(ParamSpec::new("limit", ParamType::Int))
        .build()];
    let resp = run(
        "GET /search?limit=banana HTTP/1.1\r\n\r\n",
        endpoints,
        Registry::new(),
    );
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(body_json(&resp)["error"].as_str().unwrap().contains("limit"));
}

#[test]
fn repeated_query_parameter_collects_ordered_list() {
    fn tags(req: &mut Request<'_>) -> Result<Response, HandlerError> {
        Ok(Response::json(
            StatusCode::OK,
            &json!({ "tags": req.arg("tag").cloned().unwrap_or(Value::Null) }),
        ))
    }
    let endpoints = vec![endpoint(Method::GET, "/tracks", tags)
        .query(ParamSpec::new("tag", ParamType::Str).repeated())
        .build()];
    let resp = run(
        "GET /tracks?tag=jazz&tag=mono&tag=live HTTP/1.1\r\n\r\n",
        endpoints,
        Registry::new(),
    );
    assert_eq!(body_json(&resp), json!({"tags": ["jazz", "mono", "live"]}));
}

#[test]
fn declared_header_is_validated() {
    let endpoints = vec![endpoint(Method::GET, "/sync", ok)
        .header(ParamSpec::new("x-client-rev", ParamType::Int).required())
        .build()];

    let resp = run("GET /sync HTTP/1.1\r\n\r\n", endpoints, Registry::new());
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let endpoints = vec![endpoint(Method::GET, "/sync", ok)
        .header(ParamSpec::new("x-client-rev", ParamType::Int).required())
        .build()];
    let resp = run(
        "GET /sync HTTP/1.1\r\nX-Client-Rev: 42\r\n\r\n",
        endpoints,
        Registry::new(),
    );
    assert_eq!(resp.status, StatusCode::OK);
}

#[test]
fn body_content_type_mismatch_is_400() {
    let endpoints = vec![endpoint(Method::POST, "/tracks", ok)
        .body(BodySpec::json(&["title"]))
        .build()];
    let resp = run(
        "POST /tracks HTTP/1.1\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nhi",
        endpoints,
        Registry::new(),
    );
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(body_json(&resp)["error"]
        .as_str()
        .unwrap()
        .contains("content type"));
}

#[test]
fn json_body_with_missing_field_is_400() {
    let endpoints = vec![endpoint(Method::POST, "/tracks", ok)
        .body(BodySpec::json(&["title"]))
        .build()];
    let body = r#"{"artist":"x"}"#;
    let raw = format!(
        "POST /tracks HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let resp = run(&raw, endpoints, Registry::new());
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(body_json(&resp)["error"].as_str().unwrap().contains("title"));
}

#[test]
fn valid_json_body_reaches_the_handler() {
    fn create(req: &mut Request<'_>) -> Result<Response, HandlerError> {
        let title = req.json.as_ref().unwrap()["title"].as_str().unwrap().to_string();
        Ok(Response::json(StatusCode::CREATED, &json!({ "title": title })))
    }
    let body = r#"{"title":"Blue in Green"}"#;
    let raw = format!(
        "POST /tracks HTTP/1.1\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );
    let endpoints = vec![endpoint(Method::POST, "/tracks", create)
        .body(BodySpec::json(&["title"]))
        .build()];
    let resp = run(&raw, endpoints, Registry::new());
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(body_json(&resp), json!({"title": "Blue in Green"}));
}

#[test]
fn registered_exception_type_maps_to_its_response() {
    fn missing(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
        Err(Box::new(TrackMissing(41)))
    }
    let mut registry = Registry::new();
    registry.register_exception::<TrackMissing, _>(|e| {
        Response::error(StatusCode::NOT_FOUND, &e.to_string())
    });
    let endpoints = vec![endpoint(Method::GET, "/tracks/:id", missing).build()];
    let resp = run("GET /tracks/41 HTTP/1.1\r\n\r\n", endpoints, registry);
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(body_json(&resp)["error"].as_str().unwrap().contains("41"));
}

#[test]
fn unregistered_exception_type_is_500_generic() {
    fn raises(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
        Err(Box::new(ScanInterrupted))
    }
    let mut registry = Registry::new();
    // A handler for a different type must not swallow this one.
    registry.register_exception::<TrackMissing, _>(|e| {
        Response::error(StatusCode::NOT_FOUND, &e.to_string())
    });
    let endpoints = vec![endpoint(Method::GET, "/boom", raises).build()];
    let resp = run("GET /boom HTTP/1.1\r\n\r\n", endpoints, registry);
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&resp), json!({"error": "unhandled exception"}));
}

#[test]
fn handler_panic_is_contained_as_500() {
    fn panics(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
        panic!("handler blew up");
    }
    let endpoints = vec![endpoint(Method::GET, "/panic", panics).build()];
    let resp = run("GET /panic HTTP/1.1\r\n\r\n", endpoints, Registry::new());
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(&resp), json!({"error": "unhandled exception"}));
}

#[test]
fn path_captures_reach_the_handler() {
    fn show(req: &mut Request<'_>) -> Result<Response, HandlerError> {
        Ok(Response::json(
            StatusCode::OK,
            &json!({ "id": req.path_param("id") }),
        ))
    }
    let endpoints = vec![endpoint(Method::GET, "/albums/:id", show).build()];
    let resp = run("GET /albums/rev-9 HTTP/1.1\r\n\r\n", endpoints, Registry::new());
    assert_eq!(body_json(&resp), json!({"id": "rev-9"}));
}
