//! Listener configuration.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::parser::ParseLimits;

/// Scanner paths rejected out of hand. A cheap mitigation against the
/// background noise of the public internet, not a security boundary; extend
/// per deployment with [`ServerConfig::with_denied_path`].
pub const DEFAULT_DENIED_PATHS: [&str; 7] = [
    "/.env",
    "/.git",
    "/wp-admin",
    "/wp-login.php",
    "/phpmyadmin",
    "/cgi-bin",
    "/vendor/phpunit",
];

/// TLS certificate and key locations. Missing files fail fast at listener
/// setup, not at first connection.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Everything the listener needs to know, built once before serving.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. `127.0.0.1:5600`.
    pub bind_addr: String,
    pub tls: Option<TlsSettings>,
    /// Per-socket idle-read timeout; a stalled client is closed, not
    /// retried.
    pub read_timeout: Duration,
    pub limits: ParseLimits,
    /// Decoded-path prefixes rejected as protocol faults.
    pub denied_paths: Vec<String>,
    /// Peer addresses dropped at accept time.
    pub denied_peers: HashSet<IpAddr>,
}

impl ServerConfig {
    #[must_use]
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            tls: None,
            read_timeout: Duration::from_secs(30),
            limits: ParseLimits::default(),
            denied_paths: DEFAULT_DENIED_PATHS.iter().map(|s| s.to_string()).collect(),
            denied_peers: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsSettings {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: ParseLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub fn with_denied_path(mut self, prefix: impl Into<String>) -> Self {
        self.denied_paths.push(prefix.into());
        self
    }

    /// Replace the denylist entirely (an empty list disables the check).
    #[must_use]
    pub fn with_denied_paths(mut self, prefixes: Vec<String>) -> Self {
        self.denied_paths = prefixes;
        self
    }

    #[must_use]
    pub fn with_denied_peer(mut self, peer: IpAddr) -> Self {
        self.denied_peers.insert(peer);
        self
    }
}
