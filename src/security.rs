//! # Security Module
//!
//! Pluggable authentication strategies tried in registration order by the
//! dispatcher until one yields a principal.
//!
//! Four strategies ship with the crate, mirroring the credential kinds the
//! server accepts on the wire:
//! - Basic credentials: `Authorization: Basic <base64 user:pass>`
//! - Bearer token: `Authorization: Bearer <token>`
//! - API key: a configurable header, falling back to a query parameter
//! - Ephemeral token: short-lived tokens minted at runtime and checked
//!   against an expiring in-memory store
//!
//! All strategies delegate the actual credential check to caller-supplied
//! closures, so the business side owns identity; this crate only owns
//! extraction and scope enforcement. A strategy returns `None` both for
//! "credentials absent" and "credentials wrong"; the dispatcher responds
//! `401` once every strategy has declined.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64::{engine::general_purpose, Engine as _};
use serde::Serialize;
use tracing::debug;

use crate::headers::HeaderMap;
use crate::request::QueryMap;

/// An authenticated identity attached to the request.
///
/// Serializable so handlers can echo the resolved identity in JSON
/// responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: String,
    pub scopes: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scopes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: &[&str]) -> Self {
        self.scopes = scopes.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Whether this principal carries every required scope.
    #[must_use]
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|s| self.scopes.contains(s))
    }
}

/// Credential sources a strategy may inspect.
pub struct AuthContext<'a> {
    pub headers: &'a HeaderMap,
    pub query: &'a QueryMap,
    pub cookies: &'a HashMap<String, String>,
}

/// One way of turning request credentials into a principal.
pub trait AuthStrategy: Send + Sync {
    /// Resolve a principal from the request, or decline.
    ///
    /// `scopes` is the endpoint's required scope list; implementations must
    /// decline when the resolved principal does not carry all of them.
    fn authenticate(&self, ctx: &AuthContext<'_>, scopes: &[String]) -> Option<Principal>;
}

type CredentialCheck = dyn Fn(&str, &str) -> Option<Principal> + Send + Sync;
type TokenCheck = dyn Fn(&str) -> Option<Principal> + Send + Sync;

fn scoped(principal: Principal, scopes: &[String]) -> Option<Principal> {
    if principal.has_scopes(scopes) {
        Some(principal)
    } else {
        debug!(principal = %principal.id, "principal lacks required scopes");
        None
    }
}

/// `Authorization: Basic` strategy: decodes `user:pass` and hands the pair
/// to the verifier.
pub struct BasicAuth {
    verify: Arc<CredentialCheck>,
}

impl BasicAuth {
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str, &str) -> Option<Principal> + Send + Sync + 'static,
    {
        Self {
            verify: Arc::new(verify),
        }
    }
}

impl AuthStrategy for BasicAuth {
    fn authenticate(&self, ctx: &AuthContext<'_>, scopes: &[String]) -> Option<Principal> {
        let encoded = ctx.headers.get("authorization")?.strip_prefix("Basic ")?;
        let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
        let pair = String::from_utf8(decoded).ok()?;
        let (user, pass) = pair.split_once(':')?;
        scoped((self.verify)(user, pass)?, scopes)
    }
}

/// `Authorization: Bearer` strategy: hands the opaque token to the
/// verifier.
pub struct BearerAuth {
    verify: Arc<TokenCheck>,
}

impl BearerAuth {
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str) -> Option<Principal> + Send + Sync + 'static,
    {
        Self {
            verify: Arc::new(verify),
        }
    }
}

impl AuthStrategy for BearerAuth {
    fn authenticate(&self, ctx: &AuthContext<'_>, scopes: &[String]) -> Option<Principal> {
        let token = ctx.headers.get("authorization")?.strip_prefix("Bearer ")?;
        scoped((self.verify)(token.trim())?, scopes)
    }
}

/// API-key strategy: reads a configurable header, falling back to a query
/// parameter when one is configured.
pub struct ApiKeyAuth {
    header_name: String,
    query_name: Option<String>,
    verify: Arc<TokenCheck>,
}

impl ApiKeyAuth {
    pub fn new<F>(verify: F) -> Self
    where
        F: Fn(&str) -> Option<Principal> + Send + Sync + 'static,
    {
        Self {
            header_name: "x-api-key".to_string(),
            query_name: None,
            verify: Arc::new(verify),
        }
    }

    /// Override the header carrying the key.
    #[must_use]
    pub fn header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    /// Also accept the key as a query parameter.
    #[must_use]
    pub fn query_name(mut self, name: impl Into<String>) -> Self {
        self.query_name = Some(name.into());
        self
    }

    fn extract<'a>(&self, ctx: &AuthContext<'a>) -> Option<&'a str> {
        if let Some(key) = ctx.headers.get(&self.header_name) {
            return Some(key);
        }
        let query_name = self.query_name.as_deref()?;
        ctx.query.first(query_name)
    }
}

impl AuthStrategy for ApiKeyAuth {
    fn authenticate(&self, ctx: &AuthContext<'_>, scopes: &[String]) -> Option<Principal> {
        let key = self.extract(ctx)?;
        scoped((self.verify)(key)?, scopes)
    }
}

/// Ephemeral-token strategy: tokens are minted at runtime with a deadline
/// and checked against an in-memory store. Expired entries are dropped by
/// the lookups that encounter them.
pub struct EphemeralTokenAuth {
    query_name: String,
    tokens: Mutex<HashMap<String, (Principal, Instant)>>,
}

impl Default for EphemeralTokenAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralTokenAuth {
    #[must_use]
    pub fn new() -> Self {
        Self {
            query_name: "token".to_string(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Override the query parameter carrying the token.
    #[must_use]
    pub fn query_name(mut self, name: impl Into<String>) -> Self {
        self.query_name = name.into();
        self
    }

    /// Mint a token for `principal`, valid for `ttl`. Returns the token.
    pub fn mint(&self, principal: Principal, ttl: Duration) -> String {
        self.mint_with_deadline(principal, Instant::now() + ttl)
    }

    /// Mint a token with an explicit deadline.
    pub fn mint_with_deadline(&self, principal: Principal, deadline: Instant) -> String {
        let token = ulid::Ulid::new().to_string();
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.insert(token.clone(), (principal, deadline));
        }
        token
    }

    /// Drop a token before its deadline.
    pub fn revoke(&self, token: &str) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.remove(token);
        }
    }

    fn look_up(&self, token: &str) -> Option<Principal> {
        let mut tokens = self.tokens.lock().ok()?;
        match tokens.get(token) {
            Some((principal, deadline)) if Instant::now() < *deadline => Some(principal.clone()),
            Some(_) => {
                tokens.remove(token);
                None
            }
            None => None,
        }
    }
}

impl AuthStrategy for EphemeralTokenAuth {
    fn authenticate(&self, ctx: &AuthContext<'_>, scopes: &[String]) -> Option<Principal> {
        let token = ctx.query.first(&self.query_name)?;
        scoped(self.look_up(token)?, scopes)
    }
}
