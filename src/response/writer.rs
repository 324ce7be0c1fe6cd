//! Response serialization: status line, headers, and the four body paths.

use std::io::{self, Read, Write};

use http::Version;
use tracing::trace;

use super::{BodySink, Payload, Response};

/// Block size for streaming a reader payload.
const STREAM_BLOCK: usize = 2048;

/// How the written response affects the connection afterwards.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    /// Payload length for the access log; `-1` when not knowable at log
    /// time (streaming payloads).
    pub logged_len: i64,
    /// The body was close-delimited (streaming payload on HTTP/1.0), so the
    /// connection cannot be reused.
    pub close_required: bool,
}

/// Serializes one [`Response`] to the connection.
///
/// Framing invariant: exactly one of `Content-Length` or
/// `Transfer-Encoding: chunked` is set before transmission. When the
/// handler set neither, it is synthesized from the payload kind:
/// materialized payloads get a `Content-Length`, streaming payloads get
/// chunked framing on HTTP/1.1 and close-delimited framing on HTTP/1.0.
pub struct ResponseWriter<'w> {
    out: &'w mut dyn Write,
    version: Version,
}

impl<'w> ResponseWriter<'w> {
    pub fn new(out: &'w mut dyn Write, version: Version) -> Self {
        Self { out, version }
    }

    pub fn write(mut self, mut resp: Response) -> io::Result<WriteOutcome> {
        let mut close_required = false;
        let mut chunked = resp
            .headers
            .get("transfer-encoding")
            .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));

        if !chunked && !resp.headers.contains("content-length") {
            match resp.payload.known_len() {
                Some(len) => resp.headers.set("content-length", len.to_string()),
                None => {
                    if self.version == Version::HTTP_11 {
                        resp.headers.set("transfer-encoding", "chunked");
                        chunked = true;
                    } else {
                        close_required = true;
                    }
                }
            }
        }

        let logged_len = resp.payload.known_len().map_or(-1, |l| l as i64);

        self.write_head(&resp)?;
        self.write_payload(resp.payload, chunked)?;
        self.out.flush()?;

        Ok(WriteOutcome {
            logged_len,
            close_required,
        })
    }

    fn write_head(&mut self, resp: &Response) -> io::Result<()> {
        let version = match self.version {
            Version::HTTP_10 => "HTTP/1.0",
            _ => "HTTP/1.1",
        };
        let reason = resp.status.canonical_reason().unwrap_or("Unknown");
        write!(self.out, "{} {} {}\r\n", version, resp.status.as_u16(), reason)?;
        for (name, value) in resp.headers.iter() {
            write!(self.out, "{name}: {value}\r\n")?;
        }
        self.out.write_all(b"\r\n")?;
        trace!(status = resp.status.as_u16(), headers = resp.headers.len(), "head written");
        Ok(())
    }

    fn write_payload(&mut self, payload: Payload, chunked: bool) -> io::Result<()> {
        if chunked {
            let mut sink = ChunkedSink { out: &mut *self.out };
            Self::feed(&mut sink, payload)?;
            sink.finish()
        } else {
            let mut sink = PlainSink { out: &mut *self.out };
            Self::feed(&mut sink, payload)
        }
    }

    /// Drive one payload kind into a sink.
    fn feed(sink: &mut dyn BodySink, payload: Payload) -> io::Result<()> {
        match payload {
            Payload::Empty => Ok(()),
            Payload::Bytes(bytes) => sink.write_chunk(&bytes),
            Payload::Reader(mut source) => {
                let mut block = [0u8; STREAM_BLOCK];
                loop {
                    let got = source.read(&mut block)?;
                    if got == 0 {
                        return Ok(());
                    }
                    sink.write_chunk(&block[..got])?;
                }
            }
            Payload::Chunks(chunks) => {
                for chunk in chunks {
                    sink.write_chunk(&chunk)?;
                }
                Ok(())
            }
            Payload::Sink(producer) => producer(sink),
        }
    }
}

/// Convenience wrapper building a writer for one response.
pub fn write_response(
    out: &mut dyn Write,
    version: Version,
    resp: Response,
) -> io::Result<WriteOutcome> {
    ResponseWriter::new(out, version).write(resp)
}

/// Pass-through framing for bodies with a declared length.
struct PlainSink<'w> {
    out: &'w mut dyn Write,
}

impl BodySink for PlainSink<'_> {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.out.write_all(data)
    }
}

/// Chunked transfer framing: each write becomes `<hex>\r\n<data>\r\n`, and
/// `finish` emits the terminal `0\r\n\r\n`.
struct ChunkedSink<'w> {
    out: &'w mut dyn Write,
}

impl ChunkedSink<'_> {
    fn finish(self) -> io::Result<()> {
        self.out.write_all(b"0\r\n\r\n")
    }
}

impl BodySink for ChunkedSink<'_> {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        // An empty chunk would read as the terminator; skip it.
        if data.is_empty() {
            return Ok(());
        }
        write!(self.out, "{:x}\r\n", data.len())?;
        self.out.write_all(data)?;
        self.out.write_all(b"\r\n")
    }
}
