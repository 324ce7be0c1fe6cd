//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};

use shellac::framer::Wire;
use shellac::parser::{parse_head, ParseLimits, RequestHead};

/// In-memory duplex stream: reads come from a fixed script, writes are
/// captured for inspection.
pub struct Duplex {
    input: Cursor<Vec<u8>>,
    pub output: Vec<u8>,
}

impl Duplex {
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            input: Cursor::new(input.into()),
            output: Vec::new(),
        }
    }
}

impl Read for Duplex {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for Duplex {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parse the head of a scripted request, leaving the wire positioned at the
/// body.
pub fn head_and_wire(raw: impl Into<Vec<u8>>) -> (RequestHead, Wire<Duplex>) {
    let mut wire = Wire::new(Duplex::new(raw));
    let head = parse_head(&mut wire, &ParseLimits::default(), &[]).expect("request head");
    (head, wire)
}

/// Chunked-transfer encode a payload with the given chunk size.
pub fn encode_chunked(payload: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in payload.chunks(chunk_size.max(1)) {
        out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Deterministic pseudo-random payload for round-trip tests.
pub fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
