//! Bounded, incremental token and line readers.
//!
//! These are the only two primitives the protocol parser is built on:
//! [`read_token`] (delimited by a single space) and [`read_line`] (delimited
//! by LF, with one optional preceding CR stripped). Both read incrementally
//! so the caller-supplied maximum length is enforced *while* reading, never
//! after an unbounded buffer has already been filled. The per-byte loop is
//! backed by a buffered reader, so it does not translate into per-byte
//! syscalls.
//!
//! Reaching end-of-stream before a delimiter is a [`ConnectionError::Closed`]
//! fault (the peer disappeared), which is deliberately distinct from the
//! [`ProtocolError`] raised when a token exceeds its limit.

use std::io::{self, BufRead, BufReader, Read, Write};

use tracing::debug;

use crate::error::{ConnectionError, ProtocolError};

/// Byte source for request parsing: buffered reads plus access to the write
/// half of the same stream, so interim responses (`100 Continue`) can be
/// emitted while a body is being decoded.
pub trait WireStream: BufRead + Write + Send {}

impl<T: BufRead + Write + Send> WireStream for T {}

/// Pairs a `BufReader` over a duplex stream with pass-through writes.
///
/// Reads go through the buffer; writes bypass it and hit the underlying
/// stream directly (nothing is ever write-buffered here, so a read never
/// holds back an interim response).
pub struct Wire<S: Read + Write> {
    reader: BufReader<S>,
}

impl<S: Read + Write> Wire<S> {
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Access the underlying stream, skipping the read buffer.
    pub fn get_mut(&mut self) -> &mut S {
        self.reader.get_mut()
    }

    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: Read + Write> Read for Wire<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<S: Read + Write> BufRead for Wire<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl<S: Read + Write> Write for Wire<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reader.get_mut().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.reader.get_mut().flush()
    }
}

/// Pull one byte off the buffered reader, retrying on `Interrupted`.
fn read_byte<R: WireStream + ?Sized>(reader: &mut R) -> Result<Option<u8>, ConnectionError> {
    loop {
        let available = match reader.fill_buf() {
            Ok(buf) => buf,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ConnectionError::from_io(e)),
        };
        let Some(&byte) = available.first() else {
            return Ok(None);
        };
        reader.consume(1);
        return Ok(Some(byte));
    }
}

/// Read bytes until a single space delimiter.
///
/// The delimiter is consumed and not returned. Exceeding `max_len` raises a
/// [`ProtocolError`] and the accumulated prefix is logged for diagnosis;
/// end-of-stream before the delimiter raises [`ConnectionError::Closed`].
pub fn read_token<R: WireStream + ?Sized>(
    reader: &mut R,
    what: &'static str,
    max_len: usize,
) -> Result<Vec<u8>, ConnectionError> {
    let mut out = Vec::with_capacity(max_len.min(32));
    loop {
        match read_byte(reader)? {
            None => return Err(ConnectionError::Closed),
            Some(b' ') => return Ok(out),
            Some(byte) => {
                if out.len() >= max_len {
                    debug!(
                        what,
                        limit = max_len,
                        prefix = %String::from_utf8_lossy(&out),
                        "token exceeded length limit"
                    );
                    return Err(ProtocolError::TooLarge {
                        what,
                        limit: max_len,
                    }
                    .into());
                }
                out.push(byte);
            }
        }
    }
}

/// Read one line, delimited by LF with an optional preceding CR stripped.
///
/// Same length and end-of-stream contract as [`read_token`]. The delimiter
/// does not count toward `max_len` and is not returned.
pub fn read_line<R: WireStream + ?Sized>(
    reader: &mut R,
    what: &'static str,
    max_len: usize,
) -> Result<String, ConnectionError> {
    let mut out: Vec<u8> = Vec::with_capacity(max_len.min(128));
    loop {
        match read_byte(reader)? {
            None => return Err(ConnectionError::Closed),
            Some(b'\n') => {
                if out.last() == Some(&b'\r') {
                    out.pop();
                }
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            Some(byte) => {
                if out.len() >= max_len {
                    debug!(
                        what,
                        limit = max_len,
                        prefix = %String::from_utf8_lossy(&out),
                        "line exceeded length limit"
                    );
                    return Err(ProtocolError::TooLarge {
                        what,
                        limit: max_len,
                    }
                    .into());
                }
                out.push(byte);
            }
        }
    }
}
