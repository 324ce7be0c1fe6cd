//! OPTIONS and CORS preflight answers.

use http::StatusCode;

use crate::headers::HeaderMap;
use crate::response::Response;

use super::Router;

/// Headers always permitted, merged with whatever the caller requested.
pub const MIN_ALLOW_HEADERS: [&str; 2] = ["Content-Type", "Authorization"];

/// How long browsers may cache a preflight answer, seconds.
pub const MAX_AGE_SECS: u32 = 86_400;

/// Answer an `OPTIONS` request.
///
/// A plain `OPTIONS` gets an `Allow` header listing the methods whose
/// patterns match the path (`*` meaning the whole table). When the request
/// carries `Access-Control-Request-Method` it is a CORS preflight and the
/// `Access-Control-*` family is synthesized as well, merging the caller's
/// requested headers with the fixed minimum set.
#[must_use]
pub fn options_response(router: &Router, path: &str, request_headers: &HeaderMap) -> Response {
    let methods = router.options(path);
    let allow = methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    let mut resp = Response::new(StatusCode::OK).with_header("allow", allow.clone());

    if request_headers.contains("access-control-request-method") {
        let requested = request_headers
            .get("access-control-request-headers")
            .unwrap_or("");
        resp.set_header("access-control-allow-origin", "*");
        resp.set_header("access-control-allow-methods", allow);
        resp.set_header("access-control-allow-headers", merge_headers(requested));
        resp.set_header("access-control-max-age", MAX_AGE_SECS.to_string());
    }

    resp
}

/// Merge the caller's comma-separated requested headers with the minimum
/// set, case-insensitively deduplicated, minimum set first.
fn merge_headers(requested: &str) -> String {
    let mut merged: Vec<String> = MIN_ALLOW_HEADERS.iter().map(|s| s.to_string()).collect();
    for header in requested.split(',') {
        let header = header.trim();
        if header.is_empty() {
            continue;
        }
        if !merged.iter().any(|h| h.eq_ignore_ascii_case(header)) {
            merged.push(header.to_string());
        }
    }
    merged.join(", ")
}
