//! Request-line and header parsing.
//!
//! Turns the connection's byte stream into a [`RequestHead`]: method, path
//! (raw and percent-decoded), protocol version, validated header map, query
//! multimap, and cookies. Body bytes are not touched here; the selected
//! decoder is attached afterwards by [`crate::body::attach`].

use std::collections::HashMap;

use http::{Method, Version};
use tracing::{debug, warn};

use crate::error::{ConnectionError, ProtocolError};
use crate::framer::{read_line, read_token, WireStream};
use crate::headers::HeaderMap;
use crate::request::QueryMap;

/// Token and line length limits applied while parsing.
///
/// These bound attacker-controlled input before any allocation grows; they
/// are configuration, not protocol constants.
#[derive(Debug, Clone)]
pub struct ParseLimits {
    /// Method token, bytes.
    pub method: usize,
    /// Path token, bytes.
    pub path: usize,
    /// Protocol token, bytes.
    pub protocol: usize,
    /// Each header line, bytes.
    pub header_line: usize,
    /// Total header count.
    pub max_headers: usize,
}

impl Default for ParseLimits {
    fn default() -> Self {
        Self {
            method: 16,
            path: 4096,
            protocol: 16,
            header_line: 4096,
            max_headers: 100,
        }
    }
}

/// Everything known about a request before its body is read.
#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    /// Path exactly as received, percent-encoded, including query string.
    pub raw_path: String,
    /// Percent-decoded path component, query and fragment split off.
    pub path: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub query: QueryMap,
    pub cookies: HashMap<String, String>,
}

/// Parse one request head off the stream.
///
/// `denied_paths` is the scanner-prefix denylist: a decoded path matching
/// any prefix is rejected as a protocol fault so the connection closes
/// without a response. It is a cheap mitigation, not a security boundary.
pub fn parse_head<R: WireStream + ?Sized>(
    reader: &mut R,
    limits: &ParseLimits,
    denied_paths: &[String],
) -> Result<RequestHead, ConnectionError> {
    let method_token = read_token(reader, "method", limits.method)?;
    let method = parse_method(&method_token)?;

    let path_token = read_token(reader, "path", limits.path)?;
    if path_token.is_empty() {
        return Err(ProtocolError::EmptyPath.into());
    }
    let raw_path = String::from_utf8_lossy(&path_token).into_owned();

    let protocol_token = read_line(reader, "protocol", limits.protocol)?;
    let version = parse_version(&protocol_token)?;

    let headers = parse_headers(reader, limits)?;

    if headers.contains("content-length") && headers.contains("transfer-encoding") {
        return Err(ProtocolError::ConflictingFraming.into());
    }

    let (path, query) = split_target(&raw_path)?;

    if let Some(prefix) = denied_paths.iter().find(|p| path.starts_with(p.as_str())) {
        warn!(path = %path, prefix = %prefix, "request path matched denylist");
        return Err(ProtocolError::DeniedPath(path).into());
    }

    let cookies = parse_cookies(&headers);

    debug!(
        method = %method,
        path = %path,
        version = ?version,
        header_count = headers.len(),
        query_params = query.len(),
        "request head parsed"
    );

    Ok(RequestHead {
        method,
        raw_path,
        path,
        version,
        headers,
        query,
        cookies,
    })
}

fn parse_method(token: &[u8]) -> Result<Method, ProtocolError> {
    match token {
        b"GET" => Ok(Method::GET),
        b"POST" => Ok(Method::POST),
        b"PUT" => Ok(Method::PUT),
        b"DELETE" => Ok(Method::DELETE),
        b"OPTIONS" => Ok(Method::OPTIONS),
        other => Err(ProtocolError::BadMethod(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}

fn parse_version(token: &str) -> Result<Version, ProtocolError> {
    match token {
        "HTTP/1.0" => Ok(Version::HTTP_10),
        "HTTP/1.1" => Ok(Version::HTTP_11),
        other => Err(ProtocolError::BadProtocol(other.to_string())),
    }
}

fn parse_headers<R: WireStream + ?Sized>(
    reader: &mut R,
    limits: &ParseLimits,
) -> Result<HeaderMap, ConnectionError> {
    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(reader, "header line", limits.header_line)?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() >= limits.max_headers {
            return Err(ProtocolError::TooManyHeaders(limits.max_headers).into());
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(ProtocolError::MalformedHeader(line).into());
        };
        headers.try_insert(name.trim(), value.trim().to_string())?;
    }
}

/// Split a request target into decoded path and parsed query, discarding any
/// fragment.
fn split_target(raw: &str) -> Result<(String, QueryMap), ProtocolError> {
    let without_fragment = raw.split('#').next().unwrap_or(raw);
    let (path_part, query_part) = match without_fragment.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (without_fragment, None),
    };
    let path = urlencoding::decode(path_part)
        .map_err(|_| ProtocolError::BadPath(path_part.to_string()))?
        .into_owned();
    let query = query_part.map(QueryMap::parse).unwrap_or_default();
    Ok((path, query))
}

/// Parse the Cookie header into a name/value map.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get("cookie")
        .map(|raw| {
            raw.split(';')
                .filter_map(|pair| {
                    let mut parts = pair.trim().splitn(2, '=');
                    let name = parts.next()?.trim().to_string();
                    let value = parts.next().unwrap_or("").trim().to_string();
                    Some((name, value))
                })
                .collect()
        })
        .unwrap_or_default()
}
