//! Chunked transfer-encoding decoder.

use std::io::{self, Read};

use tracing::trace;

use crate::error::{ConnectionError, ProtocolError};
use crate::framer::{read_line, WireStream};

use super::send_continue;

/// Chunk framing limit: a hex size line never legitimately approaches this.
const MAX_SIZE_LINE: usize = 1024;

enum ChunkState {
    /// About to read a `<hex-size>\r\n` line.
    Size,
    /// Inside a chunk's data bytes.
    Data { remaining: u64 },
    /// Terminal zero-size chunk and its trailer section consumed.
    Done,
}

/// Decoder for `Transfer-Encoding: chunked` bodies.
///
/// Reads a hex chunk-size line, then exactly that many data bytes, then the
/// terminating CRLF, repeating until the zero-size chunk. Callers may
/// request arbitrary read sizes independent of chunk boundaries: a partially
/// consumed chunk is tracked by its remaining-byte counter and served across
/// calls.
pub struct ChunkedBody<'c> {
    wire: &'c mut dyn WireStream,
    state: ChunkState,
    continue_pending: bool,
    closed: bool,
}

impl<'c> ChunkedBody<'c> {
    pub fn new(wire: &'c mut dyn WireStream, expect_continue: bool) -> Self {
        Self {
            wire,
            state: ChunkState::Size,
            continue_pending: expect_continue,
            closed: false,
        }
    }

    /// Mark the body closed. Idempotent; subsequent reads return empty.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Consume all remaining chunks to the terminal chunk. Returns the
    /// number of data bytes discarded.
    pub fn drain(&mut self) -> io::Result<u64> {
        let mut discarded: u64 = 0;
        let mut scratch = [0u8; 2048];
        loop {
            let got = self.read(&mut scratch)?;
            if got == 0 {
                return Ok(discarded);
            }
            discarded += got as u64;
        }
    }

    fn interim(&mut self) -> io::Result<()> {
        if self.continue_pending {
            self.continue_pending = false;
            send_continue(self.wire)?;
        }
        Ok(())
    }

    /// Read the next chunk-size line and advance the state machine.
    fn next_chunk(&mut self) -> io::Result<()> {
        let line = read_line(self.wire, "chunk size", MAX_SIZE_LINE)
            .map_err(ConnectionError::into_io)?;
        // Chunk extensions after ';' are tolerated and ignored.
        let digits = line.split(';').next().unwrap_or("").trim();
        let size = u64::from_str_radix(digits, 16)
            .map_err(|_| ProtocolError::BadChunkSize(line.clone()).into_io())?;
        trace!(size, "chunk header");
        if size == 0 {
            self.read_trailers()?;
            self.state = ChunkState::Done;
        } else {
            self.state = ChunkState::Data { remaining: size };
        }
        Ok(())
    }

    /// Consume trailer lines after the terminal chunk, up to the blank line.
    fn read_trailers(&mut self) -> io::Result<()> {
        loop {
            let line = read_line(self.wire, "chunk trailer", MAX_SIZE_LINE)
                .map_err(ConnectionError::into_io)?;
            if line.is_empty() {
                return Ok(());
            }
        }
    }

    /// Consume the CRLF that terminates a chunk's data bytes.
    fn finish_chunk(&mut self) -> io::Result<()> {
        let line = read_line(self.wire, "chunk terminator", 2).map_err(ConnectionError::into_io)?;
        if !line.is_empty() {
            return Err(ProtocolError::BadChunkTerminator.into_io());
        }
        self.state = ChunkState::Size;
        Ok(())
    }
}

impl Read for ChunkedBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed || buf.is_empty() {
            return Ok(0);
        }
        self.interim()?;
        let mut filled = 0;
        while filled < buf.len() {
            match self.state {
                ChunkState::Done => break,
                ChunkState::Size => self.next_chunk()?,
                ChunkState::Data { remaining } => {
                    if remaining == 0 {
                        self.finish_chunk()?;
                        continue;
                    }
                    let want = (buf.len() - filled).min(remaining as usize);
                    let got = self.wire.read(&mut buf[filled..filled + want])?;
                    if got == 0 {
                        self.closed = true;
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                    filled += got;
                    self.state = ChunkState::Data {
                        remaining: remaining - got as u64,
                    };
                }
            }
        }
        Ok(filled)
    }
}
