//! Fault taxonomy for the protocol layer.
//!
//! Two kinds of fault exist below the routing layer and they are never
//! conflated: a [`ProtocolError`] means the peer sent bytes that do not
//! conform to the HTTP grammar (fatal to the connection), while
//! [`ConnectionError::Closed`] means the peer disappeared mid-read, which is
//! an expected end-of-life event on a kept-alive connection. Everything from
//! routing onward is recoverable and is expressed as an HTTP response, not as
//! an error type.

use std::io;
use thiserror::Error;

/// The incoming byte stream does not conform to the HTTP grammar.
///
/// Fatal to the connection: once raised, no further request can be parsed
/// from the stream because its framing position is unknown.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A token or line exceeded its caller-supplied maximum length.
    #[error("{what} too large (limit {limit} bytes)")]
    TooLarge { what: &'static str, limit: usize },

    /// Method token is not one of the accepted verbs.
    #[error("unsupported method {0:?}")]
    BadMethod(String),

    /// Empty path token in the request line.
    #[error("empty request path")]
    EmptyPath,

    /// Path contained an invalid percent-escape.
    #[error("malformed path {0:?}")]
    BadPath(String),

    /// Protocol token is not `HTTP/1.0` or `HTTP/1.1`.
    #[error("unsupported protocol {0:?}")]
    BadProtocol(String),

    /// Header line with no colon separator.
    #[error("malformed header line {0:?}")]
    MalformedHeader(String),

    /// The same header key appeared twice.
    #[error("duplicate header {0:?}")]
    DuplicateHeader(String),

    /// More header lines than the configured cap.
    #[error("too many headers (limit {0})")]
    TooManyHeaders(usize),

    /// `Content-Length` and `Transfer-Encoding` are mutually exclusive.
    #[error("both Content-Length and Transfer-Encoding present")]
    ConflictingFraming,

    /// `Content-Length` is not a decimal integer.
    #[error("invalid Content-Length {0:?}")]
    BadContentLength(String),

    /// A `Transfer-Encoding` other than `chunked`.
    #[error("unsupported transfer encoding {0:?}")]
    BadTransferEncoding(String),

    /// Body headers on a method that must not carry one.
    #[error("{0} request must not carry a body")]
    UnexpectedBody(http::Method),

    /// Chunk size line is not valid hex.
    #[error("malformed chunk size line {0:?}")]
    BadChunkSize(String),

    /// Missing CRLF after a chunk's data bytes.
    #[error("missing chunk terminator")]
    BadChunkTerminator,

    /// Multipart framing does not fit inside the declared Content-Length.
    #[error("multipart framing exceeds Content-Length")]
    BadMultipart,

    /// Decoded path matched the scanner-prefix denylist.
    #[error("denied path {0:?}")]
    DeniedPath(String),
}

impl ProtocolError {
    /// Wrap as an [`io::Error`] so body decoders can surface framing faults
    /// through the `Read` trait. [`protocol_fault`] recovers the original.
    pub fn into_io(self) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, self)
    }
}

/// Recover a [`ProtocolError`] smuggled through an [`io::Error`], if any.
#[must_use]
pub fn protocol_fault(err: &io::Error) -> Option<&ProtocolError> {
    err.get_ref().and_then(|e| e.downcast_ref::<ProtocolError>())
}

/// A fault observed while reading a request from the peer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Grammar violation; the connection must close.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The peer closed the socket before a delimiter was reached. Expected
    /// between requests on a kept-alive connection.
    #[error("connection closed by peer")]
    Closed,

    /// The per-socket idle-read timeout elapsed.
    #[error("read timed out")]
    TimedOut,

    /// Any other socket-level failure.
    #[error(transparent)]
    Io(io::Error),
}

impl ConnectionError {
    /// Classify an I/O error from a socket read.
    ///
    /// Disconnect-shaped kinds collapse into [`ConnectionError::Closed`] and
    /// timeout-shaped kinds into [`ConnectionError::TimedOut`]; a protocol
    /// fault smuggled through the `Read` trait is unwrapped back into
    /// [`ConnectionError::Protocol`].
    #[must_use]
    pub fn from_io(err: io::Error) -> Self {
        use io::ErrorKind::*;
        if err.kind() == InvalidData && protocol_fault(&err).is_some() {
            // Take ownership of the boxed ProtocolError back out.
            if let Some(inner) = err.into_inner() {
                if let Ok(proto) = inner.downcast::<ProtocolError>() {
                    return ConnectionError::Protocol(*proto);
                }
            }
            return ConnectionError::Closed;
        }
        match err.kind() {
            UnexpectedEof | ConnectionReset | ConnectionAborted | BrokenPipe => {
                ConnectionError::Closed
            }
            WouldBlock | TimedOut => ConnectionError::TimedOut,
            _ => ConnectionError::Io(err),
        }
    }

    /// Flatten back into an [`io::Error`] for code constrained to the `Read`
    /// trait (the body decoders). [`from_io`](Self::from_io) is the inverse.
    #[must_use]
    pub fn into_io(self) -> io::Error {
        match self {
            ConnectionError::Protocol(p) => p.into_io(),
            ConnectionError::Closed => {
                io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer")
            }
            ConnectionError::TimedOut => {
                io::Error::new(io::ErrorKind::TimedOut, "read timed out")
            }
            ConnectionError::Io(e) => e,
        }
    }
}

/// Errors surfaced by handlers; mapped to responses by the dispatcher's
/// registered exception handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_classification() {
        let closed = ConnectionError::from_io(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(closed, ConnectionError::Closed));

        let timed = ConnectionError::from_io(io::Error::new(io::ErrorKind::WouldBlock, "idle"));
        assert!(matches!(timed, ConnectionError::TimedOut));
    }

    #[test]
    fn protocol_round_trips_through_io() {
        let io_err = ProtocolError::BadChunkSize("zz".into()).into_io();
        assert!(protocol_fault(&io_err).is_some());
        let back = ConnectionError::from_io(io_err);
        assert!(matches!(
            back,
            ConnectionError::Protocol(ProtocolError::BadChunkSize(_))
        ));
    }
}
