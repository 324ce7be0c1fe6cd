//! Per-connection request cycle.
//!
//! One OS thread owns one connection and processes its requests strictly
//! serially: parse head, attach body, route, dispatch, drain leftovers,
//! write response, then loop, or close on a protocol fault. Faults on one
//! connection never touch another.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode, Version};
use rustls::{ServerConnection, StreamOwned};
use tracing::{debug, info, warn};

use crate::body;
use crate::dispatcher::Dispatcher;
use crate::error::ConnectionError;
use crate::framer::Wire;
use crate::parser::{parse_head, RequestHead};
use crate::request::Request;
use crate::response::{write_response, Response};
use crate::router::{cors, Router};

use super::config::ServerConfig;

/// A connection stream, plain TCP or TLS-wrapped.
///
/// `StreamOwned` performs no I/O at construction: the TLS handshake runs
/// lazily on the first read, which happens on this connection's worker
/// thread, never on the accept thread.
pub(crate) enum HttpStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ServerConnection, TcpStream>>),
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.read(buf),
            HttpStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for HttpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            HttpStream::Plain(s) => s.write(buf),
            HttpStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            HttpStream::Plain(s) => s.flush(),
            HttpStream::Tls(s) => s.flush(),
        }
    }
}

pub(crate) struct Connection {
    id: u64,
    peer: SocketAddr,
    wire: Wire<HttpStream>,
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ServerConfig>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        peer: SocketAddr,
        stream: HttpStream,
        router: Arc<Router>,
        dispatcher: Arc<Dispatcher>,
        config: Arc<ServerConfig>,
    ) -> Self {
        Self {
            id,
            peer,
            wire: Wire::new(stream),
            router,
            dispatcher,
            config,
        }
    }

    /// Run the connection to completion. Never panics outward; every exit
    /// path is logged at the severity the fault deserves.
    pub(crate) fn serve(mut self) {
        debug!(conn = self.id, peer = %self.peer, "connection open");
        loop {
            match self.cycle() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(ConnectionError::Protocol(fault)) => {
                    warn!(conn = self.id, peer = %self.peer, fault = %fault, "protocol fault; closing connection");
                    break;
                }
                Err(ConnectionError::Closed) => break,
                Err(ConnectionError::TimedOut) => {
                    debug!(conn = self.id, peer = %self.peer, "idle timeout");
                    break;
                }
                Err(ConnectionError::Io(e)) => {
                    // Includes TLS handshake failures surfaced on first read.
                    warn!(conn = self.id, peer = %self.peer, error = %e, "connection error");
                    break;
                }
            }
        }
        debug!(conn = self.id, peer = %self.peer, "connection closed");
    }

    /// One request/response cycle. `Ok(true)` keeps the connection alive
    /// for the next request.
    fn cycle(&mut self) -> Result<bool, ConnectionError> {
        let Connection {
            id,
            peer,
            wire,
            router,
            dispatcher,
            config,
        } = self;

        let head = match parse_head(&mut *wire, &config.limits, &config.denied_paths) {
            Ok(head) => head,
            // Peer finished or stalled between requests: expected, silent.
            Err(ConnectionError::Closed) => return Ok(false),
            Err(ConnectionError::TimedOut) => {
                debug!(conn = *id, peer = %peer, "idle timeout between requests");
                return Ok(false);
            }
            Err(other) => return Err(other),
        };

        let started = Instant::now();
        let version = head.version;
        let method = head.method.clone();
        let path = head.path.clone();
        let keep_alive = wants_keep_alive(&head);

        let body = body::attach(&mut *wire, &head)?;
        let mut req = Request::new(head, body, Some(*peer));

        let mut response = if method == Method::OPTIONS {
            cors::options_response(router, &path, &req.headers)
        } else {
            match router.route(&method, &path) {
                Some(matched) => dispatcher.dispatch(&mut req, &matched),
                None => Response::error(StatusCode::NOT_FOUND, "endpoint not found"),
            }
        };

        // Unread body bytes would desync the next request; drain them
        // before touching the write half.
        let drained = req.body.drain();
        drop(req);
        let mut close_after = !keep_alive;
        if let Err(e) = drained {
            warn!(conn = *id, peer = %peer, error = %e, "body drain failed; connection will close");
            close_after = true;
        }

        // A streaming payload on HTTP/1.0 has no in-band terminator; the
        // close is the terminator.
        if version == Version::HTTP_10
            && response.payload.known_len().is_none()
            && !response.headers.contains("content-length")
        {
            close_after = true;
        }

        if close_after {
            response.set_header("connection", "close");
        } else if version == Version::HTTP_10 {
            response.set_header("connection", "keep-alive");
        }

        let status = response.status;
        let outcome = match write_response(&mut *wire, version, response) {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!(conn = *id, peer = %peer, error = %e, "response write failed");
                return Ok(false);
            }
        };
        close_after |= outcome.close_required;

        info!(
            target: "access",
            conn = *id,
            peer = %peer,
            version = ?version,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            method = %method,
            path = %path,
            length = outcome.logged_len,
            "request complete"
        );

        Ok(!close_after)
    }
}

/// Keep-alive policy: HTTP/1.1 unless `Connection: close`; HTTP/1.0 only
/// with an explicit `Connection: keep-alive`.
fn wants_keep_alive(head: &RequestHead) -> bool {
    match head
        .headers
        .get("connection")
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("close") => false,
        Some("keep-alive") => true,
        _ => head.version == Version::HTTP_11,
    }
}
