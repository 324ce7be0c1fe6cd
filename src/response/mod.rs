//! Response model: status, headers, and the payload tagged union.

mod writer;

pub use writer::{write_response, ResponseWriter, WriteOutcome};

use std::io::{self, Read};

use http::StatusCode;
use serde_json::Value;

use crate::headers::HeaderMap;

/// Sink handed to callback payloads. Writes follow whatever framing the
/// writer selected (chunked or fixed), so a callback never has to care.
pub trait BodySink {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Callback payload: invoked once with a sink to produce the body.
pub type SinkFn = Box<dyn FnOnce(&mut dyn BodySink) -> io::Result<()> + Send>;

/// The four payload kinds a handler may return.
///
/// Each kind has exactly one capability: write its remaining bytes to the
/// connection. The writer owns how those bytes are framed.
pub enum Payload {
    /// No body at all.
    Empty,
    /// Fully materialized bytes.
    Bytes(Vec<u8>),
    /// Sequential byte source, streamed in fixed-size blocks.
    Reader(Box<dyn Read + Send>),
    /// Lazy sequence of byte chunks, iterated to exhaustion.
    Chunks(Box<dyn Iterator<Item = Vec<u8>> + Send>),
    /// Callback invoked with a sink implementing the selected framing.
    Sink(SinkFn),
}

impl Payload {
    /// Byte length when knowable without consuming the payload.
    #[must_use]
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Payload::Empty => Some(0),
            Payload::Bytes(b) => Some(b.len() as u64),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => write!(f, "Payload::Empty"),
            Payload::Bytes(b) => write!(f, "Payload::Bytes({} bytes)", b.len()),
            Payload::Reader(_) => write!(f, "Payload::Reader"),
            Payload::Chunks(_) => write!(f, "Payload::Chunks"),
            Payload::Sink(_) => write!(f, "Payload::Sink"),
        }
    }
}

/// A handler's answer: status, headers, payload.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub payload: Payload,
}

impl Response {
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            payload: Payload::Empty,
        }
    }

    /// JSON response; sets the content type.
    #[must_use]
    pub fn json(status: StatusCode, body: &Value) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", "application/json");
        resp.payload = Payload::Bytes(body.to_string().into_bytes());
        resp
    }

    /// The uniform error body shape: `{"error": "<message>"}`.
    #[must_use]
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    #[must_use]
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", "text/plain");
        resp.payload = Payload::Bytes(body.into().into_bytes());
        resp
    }

    #[must_use]
    pub fn bytes(status: StatusCode, content_type: &str, body: Vec<u8>) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", content_type);
        resp.payload = Payload::Bytes(body);
        resp
    }

    /// Streamed from a byte source in fixed-size blocks.
    #[must_use]
    pub fn reader(status: StatusCode, content_type: &str, source: Box<dyn Read + Send>) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", content_type);
        resp.payload = Payload::Reader(source);
        resp
    }

    /// Streamed from a lazy chunk sequence.
    #[must_use]
    pub fn chunks(
        status: StatusCode,
        content_type: &str,
        chunks: Box<dyn Iterator<Item = Vec<u8>> + Send>,
    ) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", content_type);
        resp.payload = Payload::Chunks(chunks);
        resp
    }

    /// Produced by a callback writing into a sink.
    #[must_use]
    pub fn sink(status: StatusCode, content_type: &str, producer: SinkFn) -> Self {
        let mut resp = Self::new(status);
        resp.headers.set("content-type", content_type);
        resp.payload = Payload::Sink(producer);
        resp
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.set(name, value);
    }
}
