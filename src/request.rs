//! The per-cycle request object handed to handlers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use http::{Method, Version};
use serde_json::Value;

use crate::body::Body;
use crate::headers::HeaderMap;
use crate::parser::RequestHead;
use crate::router::ParamVec;
use crate::security::Principal;

/// Ordered query multimap: key to ordered list of values, preserving
/// repeats in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMap {
    entries: Vec<(String, Vec<String>)>,
}

impl QueryMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw query string (`a=1&a=2&b=x`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut map = Self::new();
        for (k, v) in url::form_urlencoded::parse(raw.as_bytes()) {
            map.push(k.into_owned(), v.into_owned());
        }
        map
    }

    pub fn push(&mut self, key: String, value: String) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1.push(value);
        } else {
            self.entries.push((key, vec![value]));
        }
    }

    /// First occurrence of a key, in wire order.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, vs)| vs.first())
            .map(String::as_str)
    }

    /// All occurrences of a key, in wire order. Empty when absent.
    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, vs)| vs.as_slice())
            .unwrap_or(&[])
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, vs)| (k.as_str(), vs.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One HTTP request: created per parse cycle, destroyed after the response
/// is written.
///
/// The body borrows the connection's stream, which is what makes a request
/// strictly serial per connection. Validated argument maps (`args`,
/// `header_args`, `json`) are populated by the dispatcher before the handler
/// runs; until then they are empty.
pub struct Request<'c> {
    pub method: Method,
    /// Path exactly as received, percent-encoded, with query string.
    pub raw_path: String,
    /// Percent-decoded path component.
    pub path: String,
    pub version: Version,
    pub headers: HeaderMap,
    pub cookies: HashMap<String, String>,
    pub query: QueryMap,
    /// Captures from the matched route pattern.
    pub path_params: ParamVec,
    pub body: Body<'c>,
    /// Authenticated principal, resolved by the dispatcher for protected
    /// endpoints.
    pub principal: Option<Principal>,
    /// Validated query arguments, by declared parameter name.
    pub args: HashMap<String, Value>,
    /// Validated header arguments, by declared header name.
    pub header_args: HashMap<String, Value>,
    /// Validated JSON body, when the endpoint declared one.
    pub json: Option<Value>,
    /// Peer address, for logging.
    pub peer: Option<SocketAddr>,
    /// Monotonic start of this request cycle, for latency accounting.
    pub started: Instant,
}

impl<'c> Request<'c> {
    /// Assemble a request from a parsed head and its attached body.
    #[must_use]
    pub fn new(head: RequestHead, body: Body<'c>, peer: Option<SocketAddr>) -> Self {
        Self {
            method: head.method,
            raw_path: head.raw_path,
            path: head.path,
            version: head.version,
            headers: head.headers,
            cookies: head.cookies,
            query: head.query,
            path_params: ParamVec::new(),
            body,
            principal: None,
            args: HashMap::new(),
            header_args: HashMap::new(),
            json: None,
            peer,
            started: Instant::now(),
        }
    }

    /// Path capture by name. Last occurrence wins when a pattern repeats a
    /// name at different depths.
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Validated query argument by declared name.
    #[inline]
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Validated header argument by declared name.
    #[inline]
    #[must_use]
    pub fn header_arg(&self, name: &str) -> Option<&Value> {
        self.header_args.get(name)
    }

    #[inline]
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_map_preserves_repeats_in_order() {
        let q = QueryMap::parse("tag=a&id=7&tag=b&tag=c");
        assert_eq!(q.all("tag"), ["a", "b", "c"]);
        assert_eq!(q.first("tag"), Some("a"));
        assert_eq!(q.first("id"), Some("7"));
        assert!(q.all("missing").is_empty());
    }

    #[test]
    fn query_map_decodes_escapes() {
        let q = QueryMap::parse("name=hello%20world&sym=%26");
        assert_eq!(q.first("name"), Some("hello world"));
        assert_eq!(q.first("sym"), Some("&"));
    }
}
