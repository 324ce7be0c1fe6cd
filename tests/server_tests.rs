use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use http::{Method, StatusCode};
use serde_json::json;
use shellac::dispatcher::Dispatcher;
use shellac::endpoint::{endpoint, EndpointDescriptor};
use shellac::error::HandlerError;
use shellac::registry::Registry;
use shellac::request::Request;
use shellac::response::Response;
use shellac::router::Router;
use shellac::security::{BasicAuth, Principal};
use shellac::server::{Server, ServerConfig, ServerHandle};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("deliberate failure")]
struct Boom;

fn ping(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    Ok(Response::text(StatusCode::OK, "pong"))
}

fn boom(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    Err(Box::new(Boom))
}

// Accepts a body but never reads it; the server must drain the leftovers.
fn swallow(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    Ok(Response::json(StatusCode::OK, &json!({"swallowed": true})))
}

fn stream(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
    let chunks: Box<dyn Iterator<Item = Vec<u8>> + Send> =
        Box::new(vec![b"first,".to_vec(), b"second,".to_vec(), b"third".to_vec()].into_iter());
    Ok(Response::chunks(StatusCode::OK, "text/plain", chunks))
}

fn secure(req: &mut Request<'_>) -> Result<Response, HandlerError> {
    let id = req.principal.as_ref().map(|p| p.id.clone()).unwrap_or_default();
    Ok(Response::json(StatusCode::OK, &json!({ "user": id })))
}

fn endpoints() -> Vec<EndpointDescriptor> {
    vec![
        endpoint(Method::GET, "/ping", ping).build(),
        endpoint(Method::POST, "/swallow", swallow).build(),
        endpoint(Method::GET, "/boom", boom).build(),
        endpoint(Method::GET, "/stream", stream).build(),
        endpoint(Method::GET, "/secure", secure).auth(&[]).build(),
    ]
}

fn start_server() -> ServerHandle {
    shellac::logging::init("warn");
    let router = Router::new(endpoints()).expect("route table");
    let mut registry = Registry::new();
    registry.register_strategy(Arc::new(BasicAuth::new(|user, pass| {
        (user == "ada" && pass == "pw").then(|| Principal::new("ada"))
    })));
    let dispatcher = Dispatcher::new(registry);
    let handle = Server::new(ServerConfig::new("127.0.0.1:0"), router, dispatcher)
        .start()
        .expect("server start");
    handle.wait_ready().expect("server ready");
    handle
}

fn connect(handle: &ServerHandle) -> TcpStream {
    let stream = TcpStream::connect(handle.addr()).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("read timeout");
    stream
}

/// Read one response off the stream: status, lowercase header map, body.
/// Returns `None` when the peer closed without sending anything.
fn read_response(stream: &mut TcpStream) -> Option<(u16, HashMap<String, String>, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut block = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let got = stream.read(&mut block).expect("read response");
        if got == 0 {
            if buf.is_empty() {
                return None;
            }
            panic!("connection closed mid-head");
        }
        buf.extend_from_slice(&block[..got]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut lines = head.lines();
    let status_line = lines.next().expect("status line");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .expect("status code")
        .parse()
        .expect("numeric status");
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let mut body = buf[head_end + 4..].to_vec();
    if let Some(len) = headers.get("content-length") {
        let len: usize = len.parse().expect("content length");
        while body.len() < len {
            let got = stream.read(&mut block).expect("read body");
            if got == 0 {
                panic!("connection closed mid-body");
            }
            body.extend_from_slice(&block[..got]);
        }
        body.truncate(len);
    }
    Some((status, headers, body))
}

#[test]
fn unknown_path_gets_404_error_body() {
    let handle = start_server();
    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /nope HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream).unwrap();
    assert_eq!(status, 404);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, json!({"error": "endpoint not found"}));
    handle.stop();
}

#[test]
fn connection_survives_an_unhandled_handler_error() {
    let handle = start_server();
    let mut stream = connect(&handle);

    stream
        .write_all(b"GET /boom HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream).unwrap();
    assert_eq!(status, 500);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, json!({"error": "unhandled exception"}));

    // Application faults are not protocol faults: same connection, next
    // request still answered.
    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream).unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, b"pong");
    handle.stop();
}

#[test]
fn unread_body_does_not_desync_the_connection() {
    let handle = start_server();
    let mut stream = connect(&handle);

    stream
        .write_all(b"POST /swallow HTTP/1.1\r\nHost: test\r\nContent-Length: 11\r\n\r\nhello world")
        .unwrap();
    let (status, _, _) = read_response(&mut stream).unwrap();
    assert_eq!(status, 200);

    stream
        .write_all(b"GET /ping HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream).unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, b"pong");
    handle.stop();
}

#[test]
fn options_star_lists_every_method() {
    let handle = start_server();
    let mut stream = connect(&handle);
    stream
        .write_all(b"OPTIONS * HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, headers, _) = read_response(&mut stream).unwrap();
    assert_eq!(status, 200);
    assert_eq!(headers.get("allow").map(String::as_str), Some("OPTIONS, GET, POST"));
    handle.stop();
}

#[test]
fn denylisted_path_closes_without_a_response() {
    let handle = start_server();
    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /wp-admin/setup.php HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    assert!(read_response(&mut stream).is_none());
    handle.stop();
}

#[test]
fn streaming_response_uses_chunked_framing() {
    let handle = start_server();
    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /stream HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.contains("transfer-encoding: chunked"));
    assert!(text.contains("6\r\nfirst,\r\n"));
    assert!(text.ends_with("0\r\n\r\n"));
    handle.stop();
}

#[test]
fn basic_credentials_gate_protected_endpoints() {
    let handle = start_server();

    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /secure HTTP/1.1\r\nHost: test\r\n\r\n")
        .unwrap();
    let (status, _, _) = read_response(&mut stream).unwrap();
    assert_eq!(status, 401);

    // "ada:pw"
    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /secure HTTP/1.1\r\nHost: test\r\nAuthorization: Basic YWRhOnB3\r\n\r\n")
        .unwrap();
    let (status, _, body) = read_response(&mut stream).unwrap();
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed, json!({"user": "ada"}));
    handle.stop();
}

#[test]
fn http10_request_gets_http10_response_line() {
    let handle = start_server();
    let mut stream = connect(&handle);
    stream
        .write_all(b"GET /ping HTTP/1.0\r\n\r\n")
        .unwrap();
    let mut raw = Vec::new();
    // HTTP/1.0 without keep-alive: the server closes after the response.
    stream.read_to_end(&mut raw).unwrap();
    let text = String::from_utf8_lossy(&raw);
    assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
    assert!(text.contains("connection: close"));
    handle.stop();
}
