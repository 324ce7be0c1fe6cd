//! Accept loop and server lifecycle.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use rustls::{ServerConnection, StreamOwned};
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::router::Router;

use super::config::ServerConfig;
use super::conn::{Connection, HttpStream};
use super::tls::build_tls_config;

/// The transport listener: binds, accepts, and hands each connection to its
/// own OS thread.
///
/// Route table and dispatcher are built before `start` and shared read-only
/// with every connection thread; nothing else is shared across connections.
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, router: Router, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            router: Arc::new(router),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Bind and start accepting.
    ///
    /// TLS configuration is loaded here so missing or malformed certificate
    /// files fail fast, before any connection is accepted.
    pub fn start(self) -> anyhow::Result<ServerHandle> {
        let tls = self
            .config
            .tls
            .as_ref()
            .map(build_tls_config)
            .transpose()?;

        let listener = TcpListener::bind(&self.config.bind_addr)
            .with_context(|| format!("bind {}", self.config.bind_addr))?;
        let addr = listener.local_addr().context("resolve bound address")?;

        info!(addr = %addr, tls = tls.is_some(), routes = self.router.len(), "listener started");

        let shutdown = Arc::new(AtomicBool::new(false));
        let accept_shutdown = Arc::clone(&shutdown);
        let config = Arc::new(self.config);
        let router = self.router;
        let dispatcher = self.dispatcher;

        let accept = thread::Builder::new()
            .name("shellac-accept".to_string())
            .spawn(move || accept_loop(listener, tls, config, router, dispatcher, accept_shutdown))
            .context("spawn accept thread")?;

        Ok(ServerHandle {
            addr,
            shutdown,
            accept: Some(accept),
        })
    }
}

fn accept_loop(
    listener: TcpListener,
    tls: Option<Arc<rustls::ServerConfig>>,
    config: Arc<ServerConfig>,
    router: Arc<Router>,
    dispatcher: Arc<Dispatcher>,
    shutdown: Arc<AtomicBool>,
) {
    let conn_ids = AtomicU64::new(1);
    for stream in listener.incoming() {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "accept failed");
                continue;
            }
        };
        let peer = match stream.peer_addr() {
            Ok(p) => p,
            Err(_) => continue,
        };
        if config.denied_peers.contains(&peer.ip()) {
            info!(peer = %peer, "connection from denied peer dropped");
            continue;
        }
        if let Err(e) = stream.set_read_timeout(Some(config.read_timeout)) {
            warn!(peer = %peer, error = %e, "failed to set read timeout");
            continue;
        }

        let http_stream = match &tls {
            Some(tls_config) => match ServerConnection::new(Arc::clone(tls_config)) {
                // No I/O yet: the handshake runs lazily on the worker thread.
                Ok(conn) => HttpStream::Tls(Box::new(StreamOwned::new(conn, stream))),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "TLS session setup failed");
                    continue;
                }
            },
            None => HttpStream::Plain(stream),
        };

        let id = conn_ids.fetch_add(1, Ordering::Relaxed);
        let conn = Connection::new(
            id,
            peer,
            http_stream,
            Arc::clone(&router),
            Arc::clone(&dispatcher),
            Arc::clone(&config),
        );

        // Detached: connection threads never block process exit.
        let spawned = thread::Builder::new()
            .name(format!("shellac-conn-{id}"))
            .spawn(move || conn.serve());
        if let Err(e) = spawned {
            warn!(peer = %peer, error = %e, "failed to spawn connection thread");
        }
    }
    info!("accept loop stopped");
}

/// Handle to a running server.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accept: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// The bound address; useful with a `:0` bind.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the listener accepts connections.
    ///
    /// Polls by attempting TCP connections, for tests that must not race
    /// the accept thread.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting new connections and join the accept thread.
    ///
    /// In-flight connection threads run their current request to
    /// completion; they are detached and die with the process.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Wake the blocking accept call.
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept.take() {
            let _ = handle.join();
        }
    }
}
