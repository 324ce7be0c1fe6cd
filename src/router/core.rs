//! Route table construction and matching. Hot path for request routing.

use std::sync::Arc;

use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::endpoint::EndpointDescriptor;

use super::{pattern, RouteError};

/// Maximum number of path captures before heap allocation. Most patterns
/// carry far fewer.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated capture storage. Names come from the immutable route
/// table, so they are shared `Arc<str>`; values are per-request data.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One compiled route: created once at startup, immutable thereafter.
pub struct RouteEntry {
    pub method: Method,
    /// The pattern as registered, for logs and diagnostics.
    pub pattern: String,
    regex: Regex,
    param_names: Vec<Arc<str>>,
    pub endpoint: Arc<EndpointDescriptor>,
    /// Registration order; the tie-break for overlapping patterns.
    pub index: usize,
}

impl RouteEntry {
    /// Try this route's pattern against a path, extracting captures.
    fn matches(&self, path: &str) -> Option<ParamVec> {
        let caps = self.regex.captures(path)?;
        let mut params = ParamVec::new();
        for name in &self.param_names {
            // A `*` capture that matched nothing yields the empty string.
            let value = caps.name(name.as_ref()).map(|m| m.as_str()).unwrap_or("");
            params.push((Arc::clone(name), value.to_string()));
        }
        Some(params)
    }
}

/// Result of successfully matching a request path to a route.
pub struct RouteMatch {
    pub route: Arc<RouteEntry>,
    pub path_params: ParamVec,
}

/// Router matching requests against registered patterns.
///
/// Routes are tried in registration order per HTTP method and the first
/// match wins, which makes registration order meaningful for overlapping
/// patterns: a literal route must be registered before the catch-all that
/// would shadow it. The table is built once before the listener starts and
/// never mutated, so connection threads read it lock-free.
pub struct Router {
    routes: Vec<Arc<RouteEntry>>,
}

impl Router {
    /// Compile a route table from registered endpoints.
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self, RouteError> {
        let mut routes = Vec::with_capacity(endpoints.len());
        for (index, endpoint) in endpoints.into_iter().enumerate() {
            let (regex, param_names) = pattern::compile(&endpoint.path)?;
            routes.push(Arc::new(RouteEntry {
                method: endpoint.method.clone(),
                pattern: endpoint.path.clone(),
                regex,
                param_names,
                endpoint: Arc::new(endpoint),
                index,
            }));
        }

        let summary: Vec<String> = routes
            .iter()
            .take(10)
            .map(|r| format!("{} {}", r.method, r.pattern))
            .collect();
        info!(
            route_count = routes.len(),
            routes_summary = ?summary,
            "route table compiled"
        );

        Ok(Self { routes })
    }

    /// Match a request, returning the first route whose pattern fits.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        debug!(method = %method, path = %path, "route match attempt");
        for route in &self.routes {
            if route.method != *method {
                continue;
            }
            if let Some(path_params) = route.matches(path) {
                debug!(
                    method = %method,
                    path = %path,
                    pattern = %route.pattern,
                    index = route.index,
                    "route matched"
                );
                return Some(RouteMatch {
                    route: Arc::clone(route),
                    path_params,
                });
            }
        }
        warn!(method = %method, path = %path, "no route matched");
        None
    }

    /// Ordered union of methods whose pattern matches `path`, for building
    /// an `Allow` header. `OPTIONS` always leads; `*` means the whole
    /// table.
    #[must_use]
    pub fn options(&self, path: &str) -> Vec<Method> {
        let mut methods = vec![Method::OPTIONS];
        for route in &self.routes {
            if path == "*" || route.regex.is_match(path) {
                if !methods.contains(&route.method) {
                    methods.push(route.method.clone());
                }
            }
        }
        methods
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RouteEntry>> {
        self.routes.iter()
    }
}
