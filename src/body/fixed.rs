//! Fixed-length body decoder.

use std::io::{self, Read};

use crate::framer::WireStream;

use super::send_continue;

/// Decoder for a body delimited by `Content-Length`.
///
/// Tracks a remaining-byte counter; reads return at most the remaining
/// count, and once it hits zero the stream reports EOF and is marked closed.
/// When the body came from a multipart envelope, `trailing` holds the
/// closing-delimiter byte count that is consumed and discarded after the
/// payload so callers never see boundary bytes.
pub struct FixedBody<'c> {
    wire: &'c mut dyn WireStream,
    remaining: u64,
    trailing: u64,
    continue_pending: bool,
    closed: bool,
}

impl<'c> FixedBody<'c> {
    pub fn new(wire: &'c mut dyn WireStream, len: u64, expect_continue: bool) -> Self {
        Self::with_trailing(wire, len, 0, expect_continue)
    }

    /// Decoder delivering `payload` bytes, then silently consuming
    /// `trailing` more before reporting EOF.
    pub fn with_trailing(
        wire: &'c mut dyn WireStream,
        payload: u64,
        trailing: u64,
        expect_continue: bool,
    ) -> Self {
        Self {
            wire,
            remaining: payload,
            trailing,
            continue_pending: expect_continue,
            closed: false,
        }
    }

    /// Bytes of payload not yet delivered.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Mark the body closed. Idempotent; subsequent reads return empty.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Discard all undelivered payload and trailing bytes. Returns the
    /// payload byte count discarded.
    pub fn drain(&mut self) -> io::Result<u64> {
        if self.closed {
            return Ok(0);
        }
        self.interim()?;
        let mut discarded: u64 = 0;
        let mut scratch = [0u8; 2048];
        while self.remaining > 0 {
            let want = scratch.len().min(self.remaining as usize);
            let got = self.wire.read(&mut scratch[..want])?;
            if got == 0 {
                self.closed = true;
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.remaining -= got as u64;
            discarded += got as u64;
        }
        self.finish()?;
        Ok(discarded)
    }

    fn interim(&mut self) -> io::Result<()> {
        if self.continue_pending {
            self.continue_pending = false;
            send_continue(self.wire)?;
        }
        Ok(())
    }

    /// Consume the trailing boundary bytes and mark the stream closed.
    fn finish(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; 256];
        while self.trailing > 0 {
            let want = scratch.len().min(self.trailing as usize);
            let got = self.wire.read(&mut scratch[..want])?;
            if got == 0 {
                self.closed = true;
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            self.trailing -= got as u64;
        }
        self.closed = true;
        Ok(())
    }
}

impl Read for FixedBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed {
            return Ok(0);
        }
        self.interim()?;
        if self.remaining == 0 {
            self.finish()?;
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        let mut filled = 0;
        while filled < buf.len() && self.remaining > 0 {
            let want = (buf.len() - filled).min(self.remaining as usize);
            let got = self.wire.read(&mut buf[filled..filled + want])?;
            if got == 0 {
                // Peer closed mid-body: fewer bytes arrived than declared.
                self.closed = true;
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
            filled += got;
            self.remaining -= got as u64;
        }
        if self.remaining == 0 {
            self.finish()?;
        }
        Ok(filled)
    }
}
