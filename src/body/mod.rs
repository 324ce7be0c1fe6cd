//! Streaming request-body decoders.
//!
//! A body is selected from the request headers by [`attach`]: fixed-length
//! (with optional multipart boundary stripping), chunked, or empty. If the
//! request additionally declares `Content-Encoding: gzip` or `deflate`, the
//! selected decoder is wrapped so callers only ever see decompressed bytes.
//!
//! Shared read contract: `read` blocks until the requested count is
//! available or the body reaches end-of-stream (a short read only ever means
//! EOF); `read_to_end` drains; `close` is idempotent; reading after close
//! returns empty. Framing faults discovered mid-body (bad chunk size,
//! missing terminator) surface as `InvalidData` I/O errors carrying a
//! [`ProtocolError`](crate::error::ProtocolError) and are fatal to the
//! connection.

mod chunked;
mod fixed;

pub use chunked::ChunkedBody;
pub use fixed::FixedBody;

use std::io::{self, Read};

use flate2::read::{GzDecoder, ZlibDecoder};
use http::Method;
use tracing::debug;

use crate::error::{ConnectionError, ProtocolError};
use crate::framer::{read_line, WireStream};
use crate::parser::RequestHead;

/// Interim response written before the first body read when the client sent
/// `Expect: 100-continue`.
const CONTINUE_LINE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// The framing-level decoder, before any compression unwrap.
pub enum RawBody<'c> {
    Empty,
    Fixed(FixedBody<'c>),
    Chunked(ChunkedBody<'c>),
}

impl std::fmt::Debug for RawBody<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawBody::Empty => f.write_str("RawBody::Empty"),
            RawBody::Fixed(_) => f.write_str("RawBody::Fixed(..)"),
            RawBody::Chunked(_) => f.write_str("RawBody::Chunked(..)"),
        }
    }
}

impl RawBody<'_> {
    /// Consume any unread raw bytes so the connection is positioned at the
    /// next request. Returns the number of bytes discarded.
    pub fn drain(&mut self) -> io::Result<u64> {
        match self {
            RawBody::Empty => Ok(0),
            RawBody::Fixed(b) => b.drain(),
            RawBody::Chunked(b) => b.drain(),
        }
    }

    /// Mark the body closed. Idempotent; subsequent reads return empty.
    pub fn close(&mut self) {
        match self {
            RawBody::Empty => {}
            RawBody::Fixed(b) => b.close(),
            RawBody::Chunked(b) => b.close(),
        }
    }
}

impl Read for RawBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            RawBody::Empty => Ok(0),
            RawBody::Fixed(b) => b.read(buf),
            RawBody::Chunked(b) => b.read(buf),
        }
    }
}

/// A request body as seen by handlers: the raw decoder, optionally behind a
/// transparent decompressor.
pub enum Body<'c> {
    Plain(RawBody<'c>),
    Gzip(Box<GzDecoder<RawBody<'c>>>),
    Deflate(Box<ZlibDecoder<RawBody<'c>>>),
}

impl std::fmt::Debug for Body<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Body::Plain(raw) => f.debug_tuple("Body::Plain").field(raw).finish(),
            Body::Gzip(_) => f.write_str("Body::Gzip(..)"),
            Body::Deflate(_) => f.write_str("Body::Deflate(..)"),
        }
    }
}

impl<'c> Body<'c> {
    /// An empty body, used for bodyless methods.
    #[must_use]
    pub fn empty() -> Body<'static> {
        Body::Plain(RawBody::Empty)
    }

    #[must_use]
    pub fn is_empty_kind(&self) -> bool {
        matches!(self, Body::Plain(RawBody::Empty))
    }

    fn raw_mut(&mut self) -> &mut RawBody<'c> {
        match self {
            Body::Plain(raw) => raw,
            Body::Gzip(dec) => dec.get_mut(),
            Body::Deflate(dec) => dec.get_mut(),
        }
    }

    /// Discard unread *raw* bytes (the wire framing, not the decompressed
    /// view) so a kept-alive connection can never desync on a body the
    /// handler did not fully read.
    pub fn drain(&mut self) -> io::Result<u64> {
        self.raw_mut().drain()
    }

    /// Mark the body closed. Idempotent.
    pub fn close(&mut self) {
        self.raw_mut().close();
    }
}

impl Read for Body<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Body::Plain(raw) => raw.read(buf),
            Body::Gzip(dec) => dec.read(buf),
            Body::Deflate(dec) => dec.read(buf),
        }
    }
}

/// Select and attach the body decoder for a parsed request head.
///
/// `GET`/`DELETE`/`OPTIONS` must not carry a body: a nonzero
/// `Content-Length` or any `Transfer-Encoding` on those methods is a
/// protocol fault. For `POST`/`PUT` the decoder is chosen from the header
/// combination; `Content-Length` together with `Transfer-Encoding` has
/// already been rejected by the parser.
pub fn attach<'c>(
    wire: &'c mut dyn WireStream,
    head: &RequestHead,
) -> Result<Body<'c>, ConnectionError> {
    let content_length = head.headers.get("content-length");
    let transfer_encoding = head.headers.get("transfer-encoding");

    if matches!(head.method, Method::GET | Method::DELETE | Method::OPTIONS) {
        let declared = match content_length {
            None => 0,
            Some(raw) => parse_content_length(raw)?,
        };
        if declared != 0 || transfer_encoding.is_some() {
            return Err(ProtocolError::UnexpectedBody(head.method.clone()).into());
        }
        return Ok(Body::Plain(RawBody::Empty));
    }

    let expect_continue = head
        .headers
        .get("expect")
        .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));

    let raw = if let Some(encoding) = transfer_encoding {
        if !encoding.eq_ignore_ascii_case("chunked") {
            return Err(ProtocolError::BadTransferEncoding(encoding.to_string()).into());
        }
        RawBody::Chunked(ChunkedBody::new(wire, expect_continue))
    } else if let Some(raw_len) = content_length {
        let total = parse_content_length(raw_len)?;
        match multipart_boundary(head.headers.get("content-type")) {
            Some(boundary) => {
                let (payload, trailing) = strip_multipart_preamble(wire, total, &boundary)?;
                RawBody::Fixed(FixedBody::with_trailing(
                    wire,
                    payload,
                    trailing,
                    expect_continue,
                ))
            }
            None => RawBody::Fixed(FixedBody::new(wire, total, expect_continue)),
        }
    } else {
        RawBody::Empty
    };

    let body = match head
        .headers
        .get("content-encoding")
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("gzip") => Body::Gzip(Box::new(GzDecoder::new(raw))),
        Some("deflate") => Body::Deflate(Box::new(ZlibDecoder::new(raw))),
        _ => Body::Plain(raw),
    };
    Ok(body)
}

fn parse_content_length(raw: &str) -> Result<u64, ProtocolError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ProtocolError::BadContentLength(raw.to_string()))
}

/// Extract the `boundary=` marker from a Content-Type value, if present.
fn multipart_boundary(content_type: Option<&str>) -> Option<String> {
    let value = content_type?;
    for part in value.split(';').map(str::trim) {
        if let Some(b) = part.strip_prefix("boundary=") {
            return Some(b.trim_matches('"').to_string());
        }
    }
    None
}

/// Consume the multipart preamble (dash-boundary line plus part headers up
/// to the blank line) and compute the payload/footer split of the remaining
/// `Content-Length` bytes.
///
/// Returns `(payload_len, trailing_len)` where `trailing_len` is the closing
/// delimiter `\r\n--boundary--\r\n` the fixed decoder will discard after the
/// payload is exhausted.
fn strip_multipart_preamble<W: WireStream + ?Sized>(
    wire: &mut W,
    content_length: u64,
    boundary: &str,
) -> Result<(u64, u64), ConnectionError> {
    let mut consumed: u64 = 0;
    loop {
        let line = read_line(wire, "multipart preamble", 4096)?;
        consumed += line.len() as u64 + 2;
        if consumed >= content_length {
            return Err(ProtocolError::BadMultipart.into());
        }
        // Blank line ends the part headers; payload starts next.
        if !line.is_empty() {
            continue;
        }
        break;
    }
    let trailing = boundary.len() as u64 + 8; // CRLF "--" boundary "--" CRLF
    let payload = content_length
        .checked_sub(consumed + trailing)
        .ok_or(ProtocolError::BadMultipart)?;
    debug!(
        boundary,
        preamble = consumed,
        payload,
        trailing,
        "multipart framing stripped"
    );
    Ok((payload, trailing))
}

pub(crate) fn send_continue<W: WireStream + ?Sized>(wire: &mut W) -> io::Result<()> {
    wire.write_all(CONTINUE_LINE)?;
    wire.flush()
}
