//! # shellac
//!
//! An HTTP/1.x server core built from raw sockets: no web framework
//! underneath, just bounded byte-level framing, a protocol parser, three
//! streaming body decoders, a response writer with chunked framing, a
//! pattern router compiled to regular expressions, and a dispatch pipeline
//! that turns raw bytes into typed, authenticated handler invocations.
//!
//! ## Architecture
//!
//! The crate is organized leaves-first:
//!
//! - [`framer`]: bounded-length token/line readers everything above is
//!   built on
//! - [`parser`]: request-line and header validation into a typed head
//! - [`body`]: fixed-length, chunked, and multipart-delimited decoders
//!   plus the compression unwrap
//! - [`response`]: status/header emission and the four payload kinds,
//!   with chunked framing
//! - [`router`]: registration-ordered pattern matching and CORS
//!   preflight
//! - [`endpoint`]: builder-collected registration metadata
//! - [`security`]: pluggable authentication strategies
//! - [`registry`]: ordered strategy and exception-handler registries
//! - [`dispatcher`]: the validate/authenticate/invoke pipeline
//! - [`server`]: blocking accept loop, TLS termination,
//!   thread-per-connection dispatch
//! - [`logging`]: `tracing` subscriber setup for embedders
//!
//! ## Concurrency model
//!
//! One OS thread per accepted connection; each connection processes
//! requests strictly serially. The route table and endpoint metadata are
//! immutable after startup and read lock-free from every thread. A fault in
//! one connection never reaches another.
//!
//! ## Example
//!
//! ```no_run
//! use http::Method;
//! use shellac::prelude::*;
//!
//! fn ping(_req: &mut Request<'_>) -> Result<Response, HandlerError> {
//!     Ok(Response::json(
//!         http::StatusCode::OK,
//!         &serde_json::json!({ "status": "ok" }),
//!     ))
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let router = Router::new(vec![
//!         endpoint(Method::GET, "/ping", ping).build(),
//!     ])?;
//!     let dispatcher = Dispatcher::new(Registry::new());
//!     let server = Server::new(ServerConfig::new("127.0.0.1:5600"), router, dispatcher);
//!     let handle = server.start()?;
//!     handle.wait_ready()?;
//!     Ok(())
//! }
//! ```

pub mod body;
pub mod dispatcher;
pub mod endpoint;
pub mod error;
pub mod framer;
pub mod headers;
pub mod logging;
pub mod parser;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod security;
pub mod server;

/// The names most embedders need.
pub mod prelude {
    pub use crate::dispatcher::Dispatcher;
    pub use crate::endpoint::{
        endpoint, AuthRequirement, BodyKind, BodySpec, EndpointDescriptor, Handler, ParamSpec,
        ParamType,
    };
    pub use crate::error::{ConnectionError, HandlerError, ProtocolError};
    pub use crate::headers::HeaderMap;
    pub use crate::registry::Registry;
    pub use crate::request::{QueryMap, Request};
    pub use crate::response::{BodySink, Payload, Response};
    pub use crate::router::Router;
    pub use crate::security::{
        ApiKeyAuth, AuthStrategy, BasicAuth, BearerAuth, EphemeralTokenAuth, Principal,
    };
    pub use crate::server::{Server, ServerConfig};
}
